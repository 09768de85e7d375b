//! finkit: price history downloads, rate of return and mortgage analysis.
//!
//! Every operation is a plain library call. Price data comes from any
//! [`HistoricalPriceProvider`]; [`YahooClient`] is the bundled adapter.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod provider;
pub mod services;
pub mod utils;

pub use api::YahooClient;
pub use config::FetchConfig;
pub use error::{Error, Result};
pub use models::{Interval, PriceField, PriceRecord, PriceSeries, ReturnInput};
pub use provider::{HistoricalPriceProvider, PriceQuery, ProviderError};
pub use services::chart_service::{render_curves, render_panels, render_price_chart, ChartStyle, CurvePanel};
pub use services::fetch_service::{fetch_prices, fetch_prices_with, FetchRequest};
pub use services::mortgage_service::{amount_range, House, Mortgage, MortgageSimulator, PlotKind};
pub use services::return_service::{calculate_periodic_rate, calculate_return, series_annualized_return};
