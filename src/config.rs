//! Runtime configuration for the price fetcher, loaded from the environment

use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};

/// Tunables for provider calls
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    pub base_url: String,
    pub user_agent: String,
    /// Upper bound for a single provider call
    pub timeout: Duration,
    /// Extra attempts after the first one for transient failures
    pub max_retries: u32,
    /// Base delay for exponential backoff between attempts
    pub backoff_base: Duration,
}

impl FetchConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://query1.finance.yahoo.com";
    pub const DEFAULT_USER_AGENT: &'static str = "Mozilla/5.0 (compatible; finkit/0.1)";
    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_MAX_RETRIES: u32 = 2;
    const DEFAULT_BACKOFF_MS: u64 = 500;

    /// Load `.env` if present, then read `FINKIT_*` variables.
    /// Missing variables fall back to defaults; malformed ones are rejected.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("FINKIT_YAHOO_BASE_URL") {
            let url = url.trim().trim_end_matches('/').to_string();
            if url.is_empty() {
                return Err(Error::invalid("FINKIT_YAHOO_BASE_URL is empty"));
            }
            config.base_url = url;
        }
        if let Some(agent) = lookup("FINKIT_USER_AGENT") {
            config.user_agent = agent;
        }
        if let Some(secs) = lookup("FINKIT_TIMEOUT_SECS") {
            let secs: u64 = parse_var("FINKIT_TIMEOUT_SECS", &secs)?;
            if secs == 0 {
                return Err(Error::invalid("FINKIT_TIMEOUT_SECS must be positive"));
            }
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = lookup("FINKIT_MAX_RETRIES") {
            config.max_retries = parse_var("FINKIT_MAX_RETRIES", &retries)?;
        }
        if let Some(ms) = lookup("FINKIT_BACKOFF_MS") {
            config.backoff_base = Duration::from_millis(parse_var("FINKIT_BACKOFF_MS", &ms)?);
        }

        debug!("Loaded fetch config: {:?}", config);
        Ok(config)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            user_agent: Self::DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            max_retries: Self::DEFAULT_MAX_RETRIES,
            backoff_base: Duration::from_millis(Self::DEFAULT_BACKOFF_MS),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::invalid(format!("{} has an invalid value: '{}'", key, value)))
}
