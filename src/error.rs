//! Crate-wide error type

use thiserror::Error;

/// Result alias used by every public operation in the toolkit
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers. Each kind stays distinguishable so callers
/// can decide whether a retry makes sense.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Caller error, e.g. empty ticker, reversed date range or zero principal
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The provider explicitly reported that the ticker does not exist
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    /// The provider could not be reached or answered with a transient failure
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Chart rendering failed inside the drawing backend
    #[error("Chart error: {0}")]
    Chart(String),
}

impl Error {
    /// Only provider outages are worth retrying without changing the input
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ProviderUnavailable(_))
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_provider_outage_is_retryable() {
        assert!(Error::ProviderUnavailable("timeout".into()).is_retryable());
        assert!(!Error::UnknownSymbol("ZZZZ".into()).is_retryable());
        assert!(!Error::InvalidInput("zero".into()).is_retryable());
        assert!(!Error::Chart("backend".into()).is_retryable());
    }

    #[test]
    fn test_display_keeps_kind_prefix() {
        let err = Error::UnknownSymbol("NOPE".to_string());
        assert_eq!(err.to_string(), "Unknown symbol: NOPE");
    }
}
