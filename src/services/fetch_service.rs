use std::time::Duration;

use chrono::NaiveDate;
use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use crate::models::{Interval, PriceRecord, PriceSeries};
use crate::provider::{HistoricalPriceProvider, PriceQuery, ProviderError};

/// Everything the fetcher needs to know about one download
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub interval: Interval,
    /// Hard stop across all attempts, on top of the per-call timeout
    pub deadline: Option<Instant>,
}

impl FetchRequest {
    pub fn new(symbol: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            start,
            end,
            interval: Interval::Daily,
            deadline: None,
        }
    }

    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Download daily bars for `symbol` over the closed range `[start_date, end_date]`
/// using the default fetch configuration.
///
/// # Returns
/// * `Ok(PriceSeries)` - possibly empty when the symbol did not trade in range
/// * `Err(Error::InvalidInput)` - empty symbol or `start_date > end_date`
/// * `Err(Error::UnknownSymbol)` - the provider does not know the ticker
/// * `Err(Error::ProviderUnavailable)` - network, timeout or server failure
pub async fn fetch_prices<P>(
    provider: &P,
    symbol: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<PriceSeries>
where
    P: HistoricalPriceProvider + ?Sized,
{
    let request = FetchRequest::new(symbol, start_date, end_date);
    fetch_prices_with(provider, &request, &FetchConfig::default()).await
}

/// Same as [`fetch_prices`] with an explicit interval, deadline and retry policy
pub async fn fetch_prices_with<P>(
    provider: &P,
    request: &FetchRequest,
    config: &FetchConfig,
) -> Result<PriceSeries>
where
    P: HistoricalPriceProvider + ?Sized,
{
    let query = validate_request(request)?;

    let records = call_with_retry(provider, &query, request.deadline, config).await?;
    let received = records.len();

    let in_range: Vec<PriceRecord> = records
        .into_iter()
        .filter(|r| r.date >= query.start && r.date <= query.end)
        .collect();
    if in_range.len() != received {
        debug!(
            "Dropped {} bars outside {}..={} for {}",
            received - in_range.len(),
            query.start,
            query.end,
            query.symbol
        );
    }

    let series = PriceSeries::new(query.symbol, query.interval, in_range);
    info!(
        "Fetched {} {} bars for {} ({}..={})",
        series.len(),
        series.interval(),
        series.symbol(),
        request.start,
        request.end
    );

    Ok(series)
}

fn validate_request(request: &FetchRequest) -> Result<PriceQuery> {
    let symbol = request.symbol.trim().to_uppercase();

    if symbol.is_empty() {
        return Err(Error::invalid("Symbol cannot be empty"));
    }
    if symbol.chars().any(char::is_whitespace) {
        return Err(Error::invalid(format!("Symbol '{}' contains whitespace", symbol)));
    }
    if let Some(bad) = symbol.chars().find(|c| !is_symbol_char(*c)) {
        return Err(Error::invalid(format!("Symbol '{}' contains invalid character {:?}", symbol, bad)));
    }
    if request.start > request.end {
        return Err(Error::invalid(format!(
            "Start date {} is after end date {}",
            request.start, request.end
        )));
    }

    Ok(PriceQuery {
        symbol,
        start: request.start,
        end: request.end,
        interval: request.interval,
    })
}

/// Tickers, indices (`^GSPC`), currency pairs (`EURUSD=X`) and class shares (`BRK-B`, `BRK.B`)
fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '^' | '=' | '-')
}

async fn call_with_retry<P>(
    provider: &P,
    query: &PriceQuery,
    deadline: Option<Instant>,
    config: &FetchConfig,
) -> Result<Vec<PriceRecord>>
where
    P: HistoricalPriceProvider + ?Sized,
{
    let mut attempt: u32 = 0;

    loop {
        let budget = match deadline {
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    return Err(Error::ProviderUnavailable(format!(
                        "Deadline exceeded before fetching {}",
                        query.symbol
                    )));
                }
                left.min(config.timeout)
            }
            None => config.timeout,
        };

        debug!("Fetching {} (attempt {})", query.symbol, attempt + 1);
        let outcome = match tokio::time::timeout(budget, provider.history(query)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProviderError::Timeout),
        };

        let err = match outcome {
            Ok(records) => return Ok(records),
            Err(err) => err,
        };

        if err.is_transient() && attempt < config.max_retries {
            let delay = backoff_delay(config.backoff_base, attempt, &err);
            let out_of_time = deadline.map_or(false, |d| Instant::now() + delay >= d);
            if !out_of_time {
                warn!(
                    "Fetching {} failed ({}), retrying in {}ms",
                    query.symbol,
                    err,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }
        }

        return Err(map_provider_error(&query.symbol, err));
    }
}

/// Exponential backoff with jitter; a server-supplied retry hint wins if longer
fn backoff_delay(base: Duration, attempt: u32, err: &ProviderError) -> Duration {
    let exponential = base.saturating_mul(2u32.saturating_pow(attempt));
    let jitter_cap = u64::try_from(base.as_millis() / 2).unwrap_or(u64::MAX);
    let jitter_ms = rand::thread_rng().gen_range(0..=jitter_cap);
    let delay = exponential.saturating_add(Duration::from_millis(jitter_ms));

    match err {
        ProviderError::RateLimited {
            retry_after_ms: Some(ms),
        } => delay.max(Duration::from_millis(*ms)),
        _ => delay,
    }
}

fn map_provider_error(symbol: &str, err: ProviderError) -> Error {
    match err {
        ProviderError::NotFound(msg) => Error::UnknownSymbol(format!("{} ({})", symbol, msg)),
        ProviderError::BadRequest(msg) => {
            Error::InvalidInput(format!("Provider rejected query for {}: {}", symbol, msg))
        }
        other => Error::ProviderUnavailable(format!("{}: {}", symbol, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::price::record;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fast_config(max_retries: u32) -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_millis(200),
            max_retries,
            backoff_base: Duration::from_millis(1),
            ..FetchConfig::default()
        }
    }

    /// Serves fixed bars for one known symbol
    struct FixtureProvider {
        symbol: &'static str,
        records: Vec<PriceRecord>,
        calls: AtomicUsize,
    }

    impl FixtureProvider {
        fn new(symbol: &'static str, records: Vec<PriceRecord>) -> Self {
            Self {
                symbol,
                records,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl HistoricalPriceProvider for FixtureProvider {
        async fn history(&self, query: &PriceQuery) -> std::result::Result<Vec<PriceRecord>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if query.symbol != self.symbol {
                return Err(ProviderError::NotFound("No data found, symbol may be delisted".into()));
            }
            // Deliberately unsorted and unfiltered
            Ok(self.records.clone())
        }
    }

    /// Fails with the given error `failures` times, then serves one bar
    struct FlakyProvider {
        failures: usize,
        error: ProviderError,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HistoricalPriceProvider for FlakyProvider {
        async fn history(&self, query: &PriceQuery) -> std::result::Result<Vec<PriceRecord>, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(self.error.clone())
            } else {
                Ok(vec![record(query.start, 10.0)])
            }
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl HistoricalPriceProvider for SlowProvider {
        async fn history(&self, _query: &PriceQuery) -> std::result::Result<Vec<PriceRecord>, ProviderError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
    }

    fn aapl_fixture() -> FixtureProvider {
        FixtureProvider::new(
            "AAPL",
            vec![
                record(date(2024, 1, 5), 181.18),
                record(date(2023, 12, 29), 192.53),
                record(date(2024, 1, 2), 185.64),
                record(date(2024, 1, 3), 184.25),
                record(date(2024, 1, 2), 185.64),
                record(date(2024, 1, 8), 185.56),
            ],
        )
    }

    #[tokio::test]
    async fn test_series_is_sorted_and_within_range() {
        let provider = aapl_fixture();
        let start = date(2024, 1, 1);
        let end = date(2024, 1, 5);

        let series = fetch_prices(&provider, "aapl", start, end).await.unwrap();

        assert_eq!(series.symbol(), "AAPL");
        assert_eq!(series.len(), 3);
        let dates = series.dates();
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
        assert!(dates.iter().all(|d| *d >= start && *d <= end));
        assert_eq!(series.last().unwrap().date, end);
    }

    #[tokio::test]
    async fn test_reversed_range_is_invalid_input() {
        let provider = aapl_fixture();
        let err = fetch_prices(&provider, "AAPL", date(2024, 2, 1), date(2024, 1, 1))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_symbol_is_invalid_input() {
        let provider = aapl_fixture();
        for symbol in ["", "   ", "BRK B"] {
            let err = fetch_prices(&provider, symbol, date(2024, 1, 1), date(2024, 1, 5))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "symbol {:?}", symbol);
        }
    }

    #[tokio::test]
    async fn test_symbol_with_url_characters_is_invalid_input() {
        let provider = aapl_fixture();
        for symbol in ["AAPL?x=1", "A#B", "AAPL/../MSFT", "AAPL&interval=1m"] {
            let err = fetch_prices(&provider, symbol, date(2024, 1, 1), date(2024, 1, 5))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "symbol {:?}", symbol);
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_index_and_currency_symbols_accepted() {
        for symbol in ["^GSPC", "EURUSD=X", "BRK-B", "BRK.B", "btc-usd"] {
            let request = FetchRequest::new(symbol, date(2024, 1, 1), date(2024, 1, 5));
            assert!(validate_request(&request).is_ok(), "symbol {:?}", symbol);
        }
    }

    #[tokio::test]
    async fn test_no_data_in_range_is_empty_series() {
        let provider = aapl_fixture();
        let series = fetch_prices(&provider, "AAPL", date(1990, 1, 1), date(1990, 12, 31))
            .await
            .unwrap();

        assert!(series.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_symbol_not_retried() {
        let provider = aapl_fixture();
        let err = fetch_prices_with(
            &provider,
            &FetchRequest::new("ZZZZZZ", date(2024, 1, 1), date(2024, 1, 5)),
            &fast_config(3),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::UnknownSymbol(_)));
        assert!(!err.is_retryable());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let provider = FlakyProvider {
            failures: 2,
            error: ProviderError::ServerError(503, "busy".into()),
            calls: AtomicUsize::new(0),
        };

        let series = fetch_prices_with(
            &provider,
            &FetchRequest::new("MSFT", date(2024, 1, 2), date(2024, 1, 2)),
            &fast_config(2),
        )
        .await
        .unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted_is_provider_unavailable() {
        let provider = FlakyProvider {
            failures: usize::MAX,
            error: ProviderError::RequestError("connection refused".into()),
            calls: AtomicUsize::new(0),
        };

        let err = fetch_prices_with(
            &provider,
            &FetchRequest::new("MSFT", date(2024, 1, 2), date(2024, 1, 3)),
            &fast_config(1),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::ProviderUnavailable(_)));
        assert!(err.is_retryable());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let err = fetch_prices_with(
            &SlowProvider,
            &FetchRequest::new("MSFT", date(2024, 1, 2), date(2024, 1, 3)),
            &fast_config(0),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn test_expired_deadline_stops_before_calling() {
        let provider = aapl_fixture();
        let request = FetchRequest::new("AAPL", date(2024, 1, 1), date(2024, 1, 5))
            .with_deadline(Instant::now());

        let err = fetch_prices_with(&provider, &request, &fast_config(2))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ProviderUnavailable(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_boxed_provider_is_accepted() {
        let provider: Box<dyn HistoricalPriceProvider> = Box::new(aapl_fixture());
        let series = fetch_prices(&provider, "AAPL", date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap();
        assert_eq!(series.len(), 4);
    }

    #[test]
    fn test_backoff_respects_retry_after() {
        let base = Duration::from_millis(10);
        let err = ProviderError::RateLimited {
            retry_after_ms: Some(2_000),
        };
        assert!(backoff_delay(base, 0, &err) >= Duration::from_secs(2));

        let delay = backoff_delay(base, 2, &ProviderError::Timeout);
        assert!(delay >= Duration::from_millis(40));
        assert!(delay <= Duration::from_millis(45));
    }

    #[test]
    fn test_backoff_saturates_for_huge_base() {
        let delay = backoff_delay(Duration::MAX, 5, &ProviderError::Timeout);
        assert_eq!(delay, Duration::MAX);

        let delay = backoff_delay(Duration::from_millis(u64::MAX), 3, &ProviderError::Timeout);
        assert!(delay >= Duration::from_millis(u64::MAX));
    }
}
