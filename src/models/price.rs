//! Price history models

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Bar size requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interval {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Interval {
    /// Query-string value understood by the chart endpoint
    pub fn as_provider_str(&self) -> &'static str {
        match self {
            Interval::Daily => "1d",
            Interval::Weekly => "1wk",
            Interval::Monthly => "1mo",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_provider_str())
    }
}

impl FromStr for Interval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1d" | "d" | "daily" => Ok(Interval::Daily),
            "1wk" | "1w" | "w" | "weekly" => Ok(Interval::Weekly),
            "1mo" | "1m" | "m" | "monthly" => Ok(Interval::Monthly),
            other => Err(Error::invalid(format!(
                "Unknown interval: '{}'. Supported: 1d, 1wk, 1mo",
                other
            ))),
        }
    }
}

/// Column of a record used by return calculations and charts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceField {
    Open,
    High,
    Low,
    #[default]
    Close,
    /// Adjusted close, falling back to close when the provider omitted it
    AdjClose,
}

impl PriceField {
    pub fn label(&self) -> &'static str {
        match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
            PriceField::AdjClose => "adj close",
        }
    }
}

/// One OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: Option<f64>,
    pub volume: u64,
}

impl PriceRecord {
    pub fn value(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Open => self.open,
            PriceField::High => self.high,
            PriceField::Low => self.low,
            PriceField::Close => self.close,
            PriceField::AdjClose => self.adj_close.unwrap_or(self.close),
        }
    }
}

/// Chronologically ordered price history for one symbol.
///
/// Dates are unique and strictly increasing; the constructor enforces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    interval: Interval,
    records: Vec<PriceRecord>,
}

impl PriceSeries {
    /// Sorts by date and keeps the first record seen for any repeated date
    pub fn new(symbol: impl Into<String>, interval: Interval, mut records: Vec<PriceRecord>) -> Self {
        records.sort_by_key(|r| r.date);
        records.dedup_by_key(|r| r.date);
        Self {
            symbol: symbol.into(),
            interval,
            records,
        }
    }

    pub fn empty(symbol: impl Into<String>, interval: Interval) -> Self {
        Self::new(symbol, interval, Vec::new())
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn records(&self) -> &[PriceRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PriceRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first(&self) -> Option<&PriceRecord> {
        self.records.first()
    }

    pub fn last(&self) -> Option<&PriceRecord> {
        self.records.last()
    }

    /// Binary search on the sorted dates
    pub fn get(&self, date: NaiveDate) -> Option<&PriceRecord> {
        self.records
            .binary_search_by_key(&date, |r| r.date)
            .ok()
            .map(|idx| &self.records[idx])
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.records.iter().map(|r| r.date).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.values(PriceField::Close)
    }

    pub fn values(&self, field: PriceField) -> Vec<f64> {
        self.records.iter().map(|r| r.value(field)).collect()
    }

    pub fn into_records(self) -> Vec<PriceRecord> {
        self.records
    }
}

impl<'a> IntoIterator for &'a PriceSeries {
    type Item = &'a PriceRecord;
    type IntoIter = std::slice::Iter<'a, PriceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
pub(crate) fn record(date: NaiveDate, close: f64) -> PriceRecord {
    PriceRecord {
        date,
        open: close,
        high: close,
        low: close,
        close,
        adj_close: None,
        volume: 1_000,
    }
}
