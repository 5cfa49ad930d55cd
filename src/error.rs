use crate::orderbook::types::InvalidDepthLimit;
use serde::Deserialize;
use thiserror::Error;

/// Session-level error type for the order book viewer
#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] ApiError),

    #[error(transparent)]
    InvalidLimit(#[from] InvalidDepthLimit),

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),
}

/// Errors raised by the Binance REST client
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitError(String),

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Error body returned by Binance on rejected requests
///
/// ```json
/// {"code": -1121, "msg": "Invalid symbol."}
/// ```
#[derive(Debug, Deserialize)]
struct BinanceErrorBody {
    code: i64,
    msg: String,
}

impl ApiError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::ConnectionError(_) | ApiError::RateLimitError(_)
        )
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::ConnectionError(_) => "connection_error",
            ApiError::RateLimitError(_) => "rate_limit",
            ApiError::Api { .. } => "api_error",
            ApiError::ParseError(_) => "parse_error",
            ApiError::InternalError(_) => "internal_error",
        }
    }

    /// Builds an error from a non-success HTTP status and its response body
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            429 => ApiError::RateLimitError(
                "Too many requests to Binance API. Retry after 60 seconds.".to_string(),
            ),
            418 => ApiError::ConnectionError(
                "IP address banned by Binance. Please contact support.".to_string(),
            ),
            403 => ApiError::ConnectionError(
                "WAF limit violated. Please reduce request frequency.".to_string(),
            ),
            500..=599 => ApiError::ConnectionError(format!(
                "Binance server error (HTTP {}). Please try again later.",
                status
            )),
            _ => {
                let message = match serde_json::from_str::<BinanceErrorBody>(body) {
                    Ok(err) => format!("{} (code {})", err.msg, err.code),
                    Err(_) if body.trim().is_empty() => "empty response body".to_string(),
                    Err(_) => body.trim().to_string(),
                };
                ApiError::Api { status, message }
            }
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::ConnectionError(
                "Request timeout. Please check your internet connection.".to_string(),
            )
        } else if err.is_connect() {
            ApiError::ConnectionError(
                "Failed to connect to Binance API. Please check your internet connection."
                    .to_string(),
            )
        } else if err.is_decode() {
            ApiError::ParseError(format!("Failed to decode response: {}", err))
        } else if let Some(status) = err.status() {
            ApiError::from_status(status.as_u16(), "")
        } else {
            ApiError::InternalError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::ParseError(format!("JSON parsing failed: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, ViewerError>;
