use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client as HttpClient, Url};
use tracing::{debug, warn};

use super::models::{ChartEnvelope, ChartResult};
use crate::config::FetchConfig;
use crate::error::{Error, Result};
use crate::models::PriceRecord;
use crate::provider::{HistoricalPriceProvider, PriceQuery, ProviderError};
use crate::utils::rate_limit_provider;

/// Yahoo Finance chart API client
pub struct YahooClient {
    http_client: HttpClient,
    base_url: String,
}

impl YahooClient {
    /// Create a client against the public endpoint with default settings
    pub fn new() -> Result<Self> {
        Self::from_config(&FetchConfig::default())
    }

    /// Create a new client with custom base URL (for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let config = FetchConfig {
            base_url: base_url.into(),
            ..FetchConfig::default()
        };
        Self::from_config(&config)
    }

    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        let http_client = HttpClient::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(Self::create_headers())
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::ProviderUnavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn create_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    /// Build the request URL. `period2` is exclusive upstream, so the end
    /// date is pushed forward by one day to keep the range closed.
    fn chart_url(&self, query: &PriceQuery) -> std::result::Result<Url, ProviderError> {
        let period1 = day_start_timestamp(query.start);
        let end_exclusive = query
            .end
            .checked_add_days(Days::new(1))
            .ok_or_else(|| ProviderError::BadRequest(format!("End date out of range: {}", query.end)))?;
        let period2 = day_start_timestamp(end_exclusive);

        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ProviderError::RequestError(format!("Invalid base URL '{}': {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::RequestError(format!("Base URL '{}' cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", query.symbol.as_str()]);
        url.query_pairs_mut()
            .append_pair("period1", &period1.to_string())
            .append_pair("period2", &period2.to_string())
            .append_pair("interval", query.interval.as_provider_str())
            .append_pair("includeAdjustedClose", "true")
            .append_pair("events", "div,splits");

        Ok(url)
    }

    /// Parse error response based on HTTP status code
    async fn handle_error_response(
        status: reqwest::StatusCode,
        response: reqwest::Response,
    ) -> ProviderError {
        let status_code = status.as_u16();
        let retry_after_ms = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(|secs| secs * 1000);
        let body_text = response.text().await.unwrap_or_default();

        match status_code {
            400 => ProviderError::BadRequest(embedded_message(&body_text)),
            404 => ProviderError::NotFound(embedded_message(&body_text)),
            429 => {
                warn!("Rate limited by provider, retry after {:?} ms", retry_after_ms);
                ProviderError::RateLimited { retry_after_ms }
            }
            500..=599 => {
                warn!("Server error {}: {}", status_code, body_text);
                ProviderError::ServerError(status_code, body_text)
            }
            _ => ProviderError::HttpError(status_code, body_text),
        }
    }

    /// GET /v8/finance/chart/{symbol}
    ///
    /// Retrieves the bars for the closed date range in `query`.
    ///
    /// # Returns
    /// * `Ok(Vec<PriceRecord>)` - bars in provider order, possibly empty
    /// * `Err(ProviderError)` - transport or payload failure
    pub async fn get_chart(&self, query: &PriceQuery) -> std::result::Result<Vec<PriceRecord>, ProviderError> {
        let url = self.chart_url(query)?;
        rate_limit_provider().await;
        debug!("GET {}", url);

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::RequestError(format!("Request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Self::handle_error_response(status, response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::RequestError(format!("Failed to read response: {}", e)))?;

        parse_chart_body(&body)
    }
}

#[async_trait]
impl HistoricalPriceProvider for YahooClient {
    async fn history(&self, query: &PriceQuery) -> std::result::Result<Vec<PriceRecord>, ProviderError> {
        self.get_chart(query).await
    }
}

fn day_start_timestamp(date: NaiveDate) -> i64 {
    date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp()
}

/// Pull `chart.error.description` out of an error body, else the raw text
fn embedded_message(body: &str) -> String {
    serde_json::from_str::<ChartEnvelope>(body)
        .ok()
        .and_then(|env| env.chart.error)
        .map(|err| err.message())
        .unwrap_or_else(|| body.to_string())
}

/// Decode a chart payload into records.
///
/// Bars with any missing price are skipped; a missing volume counts as 0.
pub(crate) fn parse_chart_body(body: &str) -> std::result::Result<Vec<PriceRecord>, ProviderError> {
    let envelope: ChartEnvelope = serde_json::from_str(body)
        .map_err(|e| ProviderError::DeserializationError(format!("Failed to parse response: {}", e)))?;

    if let Some(err) = envelope.chart.error {
        return Err(if err.is_not_found() {
            ProviderError::NotFound(err.message())
        } else {
            ProviderError::BadRequest(err.message())
        });
    }

    let result = match envelope.chart.result.and_then(|r| r.into_iter().next()) {
        Some(result) => result,
        None => return Ok(Vec::new()),
    };

    Ok(records_from_result(result))
}

fn column(values: &[Option<f64>], idx: usize) -> Option<f64> {
    values.get(idx).copied().flatten()
}

fn records_from_result(result: ChartResult) -> Vec<PriceRecord> {
    let offset = result.meta.gmtoffset;
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .unwrap_or_default()
        .adjclose;

    let mut records = Vec::with_capacity(result.timestamp.len());
    for (idx, ts) in result.timestamp.iter().enumerate() {
        // Bars are stamped at the exchange open; shift to local time before taking the date
        let date = match DateTime::from_timestamp(ts + offset, 0) {
            Some(dt) => dt.date_naive(),
            None => continue,
        };

        let (open, high, low, close) = match (
            column(&quote.open, idx),
            column(&quote.high, idx),
            column(&quote.low, idx),
            column(&quote.close, idx),
        ) {
            (Some(o), Some(h), Some(l), Some(c)) => (o, h, l, c),
            _ => {
                debug!("Skipping incomplete bar at {}", date);
                continue;
            }
        };

        records.push(PriceRecord {
            date,
            open,
            high,
            low,
            close,
            adj_close: column(&adjclose, idx),
            volume: column(&quote.volume, idx).map(|v| v.max(0.0) as u64).unwrap_or(0),
        });
    }

    records
}
