pub mod client;
pub mod models;

pub use client::YahooClient;
pub use models::{ChartEnvelope, ChartError, ChartMeta};
