//! Data models for the toolkit
//!
//! Plain data passed between the fetcher, the calculators and the chart
//! renderer. None of them are persisted.

pub mod price;
pub mod returns;
pub mod mortgage;

// Re-export commonly used types for convenience
pub use price::{Interval, PriceField, PriceRecord, PriceSeries};
pub use returns::ReturnInput;
pub use mortgage::{AmortizationRow, Curve, HouseCostRow};
