//! Historical price provider boundary

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{Interval, PriceRecord};

/// What the fetcher asks a provider for. Both dates are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceQuery {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub interval: Interval,
}

/// Source of historical OHLCV bars.
///
/// Implementations return an empty vector when the symbol exists but has no
/// bars in range and `ProviderError::NotFound` when the symbol is unknown.
#[async_trait]
pub trait HistoricalPriceProvider: Send + Sync {
    async fn history(&self, query: &PriceQuery) -> Result<Vec<PriceRecord>, ProviderError>;
}

#[async_trait]
impl<P: HistoricalPriceProvider + ?Sized> HistoricalPriceProvider for &P {
    async fn history(&self, query: &PriceQuery) -> Result<Vec<PriceRecord>, ProviderError> {
        (**self).history(query).await
    }
}

#[async_trait]
impl<P: HistoricalPriceProvider + ?Sized> HistoricalPriceProvider for Box<P> {
    async fn history(&self, query: &PriceQuery) -> Result<Vec<PriceRecord>, ProviderError> {
        (**self).history(query).await
    }
}

/// Error reported by a provider, keeping the transport detail
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// 400 Bad Request
    BadRequest(String),
    /// 404 or an explicit "symbol not found" payload
    NotFound(String),
    /// 429 Too Many Requests
    RateLimited {
        retry_after_ms: Option<u64>,
    },
    /// 5xx Server Error
    ServerError(u16, String),
    /// Other HTTP errors
    HttpError(u16, String),
    /// Network/request error
    RequestError(String),
    /// Body could not be decoded
    DeserializationError(String),
    /// The call did not finish in time
    Timeout,
}

impl ProviderError {
    /// Worth another attempt with the same input
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. }
                | ProviderError::ServerError(..)
                | ProviderError::RequestError(_)
                | ProviderError::Timeout
        )
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ProviderError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ProviderError::RateLimited { retry_after_ms } => match retry_after_ms {
                Some(ms) => write!(f, "Rate Limited. Retry after {} ms", ms),
                None => write!(f, "Rate Limited"),
            },
            ProviderError::ServerError(code, msg) => write!(f, "Server Error ({}): {}", code, msg),
            ProviderError::HttpError(code, msg) => write!(f, "HTTP Error ({}): {}", code, msg),
            ProviderError::RequestError(msg) => write!(f, "Request Error: {}", msg),
            ProviderError::DeserializationError(msg) => write!(f, "Deserialization Error: {}", msg),
            ProviderError::Timeout => write!(f, "Request timed out"),
        }
    }
}

impl std::error::Error for ProviderError {}
