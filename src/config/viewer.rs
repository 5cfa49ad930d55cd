//! Viewer Configuration
//!
//! Runtime settings for the REST client, refresh cadence and session policy.

use crate::orderbook::types::DepthLimit;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "https://api.binance.com";
const DEFAULT_REFRESH_SECS: u32 = 3;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REQUESTS_PER_MINUTE: u32 = 1000;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str, reason: impl ToString) -> Self {
        ConfigError::InvalidValue {
            var,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// How concurrent fetches settle into the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchOrdering {
    /// Whichever fetch settles last replaces the snapshot
    #[default]
    LastSettled,

    /// Only the most recently issued fetch may replace the snapshot
    LatestIssued,
}

impl FromStr for FetchOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last-settled" | "last_settled" => Ok(FetchOrdering::LastSettled),
            "latest-issued" | "latest_issued" => Ok(FetchOrdering::LatestIssued),
            other => Err(format!(
                "expected 'last-settled' or 'latest-issued', got '{}'",
                other
            )),
        }
    }
}

/// Order book viewer configuration
///
/// ## Environment Variables
///
/// - `BINANCE_BASE_URL`: REST API base URL (default: https://api.binance.com)
/// - `VIEWER_REFRESH_SECS`: Countdown length in seconds (default: 3)
/// - `VIEWER_DEPTH_LIMIT`: Initial depth limit, one of 10..=100 step 10 (default: 10)
/// - `VIEWER_HTTP_TIMEOUT_SECS`: Request timeout (default: 10)
/// - `VIEWER_REQUESTS_PER_MINUTE`: Client-side rate limit (default: 1000)
/// - `VIEWER_FETCH_ORDERING`: `last-settled` or `latest-issued` (default: last-settled)
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Binance REST API base URL, without trailing slash
    pub base_url: String,

    /// Countdown duration between automatic refreshes
    pub refresh_secs: NonZeroU32,

    /// Depth limit used until the user picks another one
    pub depth_limit: DepthLimit,

    /// HTTP request timeout
    pub http_timeout: Duration,

    /// Requests per minute allowed by the client-side rate limiter
    pub requests_per_minute: NonZeroU32,

    /// Policy for concurrent fetch results
    pub fetch_ordering: FetchOrdering,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            refresh_secs: NonZeroU32::MIN.saturating_add(DEFAULT_REFRESH_SECS - 1),
            depth_limit: DepthLimit::default(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            requests_per_minute: NonZeroU32::MIN.saturating_add(DEFAULT_REQUESTS_PER_MINUTE - 1),
            fetch_ordering: FetchOrdering::default(),
        }
    }
}

impl ViewerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns error if any variable is set to an unparsable or out-of-range value
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("BINANCE_BASE_URL") {
            let url = url.trim().trim_end_matches('/');
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::invalid(
                    "BINANCE_BASE_URL",
                    url,
                    "must start with http:// or https://",
                ));
            }
            config.base_url = url.to_string();
        }

        if let Some(raw) = lookup("VIEWER_REFRESH_SECS") {
            config.refresh_secs = raw
                .trim()
                .parse::<NonZeroU32>()
                .map_err(|e| ConfigError::invalid("VIEWER_REFRESH_SECS", &raw, e))?;
        }

        if let Some(raw) = lookup("VIEWER_DEPTH_LIMIT") {
            let value: u32 = raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("VIEWER_DEPTH_LIMIT", &raw, e))?;
            config.depth_limit = DepthLimit::try_from(value)
                .map_err(|e| ConfigError::invalid("VIEWER_DEPTH_LIMIT", &raw, e))?;
        }

        if let Some(raw) = lookup("VIEWER_HTTP_TIMEOUT_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("VIEWER_HTTP_TIMEOUT_SECS", &raw, e))?;
            if secs == 0 {
                return Err(ConfigError::invalid(
                    "VIEWER_HTTP_TIMEOUT_SECS",
                    &raw,
                    "must be greater than zero",
                ));
            }
            config.http_timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup("VIEWER_REQUESTS_PER_MINUTE") {
            config.requests_per_minute = raw
                .trim()
                .parse::<NonZeroU32>()
                .map_err(|e| ConfigError::invalid("VIEWER_REQUESTS_PER_MINUTE", &raw, e))?;
        }

        if let Some(raw) = lookup("VIEWER_FETCH_ORDERING") {
            config.fetch_ordering = raw
                .parse()
                .map_err(|e: String| ConfigError::invalid("VIEWER_FETCH_ORDERING", &raw, e))?;
        }

        Ok(config)
    }
}
