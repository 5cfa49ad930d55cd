//! Binance HTTP Client
//!
//! HTTP client wrapper for the public Binance REST endpoints used by the viewer.
//! Provides timeout configuration, default headers and client-side rate limiting.

use crate::binance::types::{ExchangeInfo, ExchangeSummary, OrderBook, SymbolInfo, Timed};
use crate::config::ViewerConfig;
use crate::error::ApiError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[cfg(feature = "rate-limit")]
use crate::binance::rate_limiter::RateLimiter;
#[cfg(feature = "rate-limit")]
use std::num::NonZeroU32;
#[cfg(feature = "rate-limit")]
use std::sync::Arc;

const USER_AGENT: &str = concat!("orderbook-viewer/", env!("CARGO_PKG_VERSION"));

const NO_QUERY: &[(&str, &str)] = &[];

/// Binance REST API HTTP client
///
/// Wraps reqwest::Client with Binance defaults including
/// timeouts, base URL and an `Accept: application/json` default header.
#[derive(Clone)]
pub struct BinanceClient {
    /// HTTP client for making requests
    pub(crate) client: Client,
    /// Base URL for Binance API (default: https://api.binance.com)
    pub(crate) base_url: String,
    #[cfg(feature = "rate-limit")]
    rate_limiter: Option<Arc<RateLimiter>>,
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl BinanceClient {
    /// Creates a client for `base_url` with the given request timeout
    ///
    /// No client-side rate limiting is applied; see [`BinanceClient::from_config`].
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            #[cfg(feature = "rate-limit")]
            rate_limiter: None,
        })
    }

    /// Creates a client from the viewer configuration
    pub fn from_config(config: &ViewerConfig) -> Result<Self, ApiError> {
        let client = Self::new(config.base_url.clone(), config.http_timeout)?;

        #[cfg(feature = "rate-limit")]
        let client = client.with_rate_limit(config.requests_per_minute);

        Ok(client)
    }

    /// Applies a client-side request quota shared by all clones of this client
    #[cfg(feature = "rate-limit")]
    pub fn with_rate_limit(mut self, requests_per_minute: NonZeroU32) -> Self {
        self.rate_limiter = Some(Arc::new(RateLimiter::new(requests_per_minute)));
        self
    }

    /// Returns the configured base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Performs a GET request and decodes the JSON body
    ///
    /// `query` is URL-encoded by reqwest. Non-success statuses become
    /// [`ApiError`] values carrying the status code and the Binance error
    /// message when the body contains one.
    async fn get_json<T, Q>(&self, path: &str, query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        #[cfg(feature = "rate-limit")]
        if let Some(limiter) = &self.rate_limiter {
            limiter.wait().await?;
        }

        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET");

        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ApiError::from_status(status.as_u16(), &body);
            warn!(url = %url, status = status.as_u16(), error = %err, "Binance request failed");
            return Err(err);
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Get exchange trading rules and symbol information
    ///
    /// Calls GET /api/v3/exchangeInfo
    pub async fn get_exchange_info(&self) -> Result<ExchangeInfo, ApiError> {
        self.get_json("/api/v3/exchangeInfo", NO_QUERY).await
    }

    /// Get exchange information together with the request round-trip time
    pub async fn get_exchange_info_with_timing(&self) -> Result<Timed<ExchangeInfo>, ApiError> {
        timed(self.get_exchange_info()).await
    }

    /// Timezone, server time and symbol counts, without the symbol list
    pub async fn get_exchange_summary(&self) -> Result<ExchangeSummary, ApiError> {
        Ok(self.get_exchange_info().await?.summary())
    }

    /// Look up a single symbol by exact name
    pub async fn get_symbol_info(&self, symbol: &str) -> Result<Option<SymbolInfo>, ApiError> {
        let info = self.get_exchange_info().await?;
        Ok(info.find_symbol(symbol).cloned())
    }

    /// Get order book depth
    ///
    /// Calls GET /api/v3/depth
    ///
    /// # Arguments
    /// * `symbol` - Trading pair symbol (e.g., "BTCUSDT")
    /// * `limit` - Number of levels per side
    pub async fn get_order_book(&self, symbol: &str, limit: u32) -> Result<OrderBook, ApiError> {
        let limit = limit.to_string();
        self.get_json("/api/v3/depth", &[("symbol", symbol), ("limit", limit.as_str())])
            .await
    }

    /// Get order book depth together with the request round-trip time
    pub async fn get_order_book_with_timing(
        &self,
        symbol: &str,
        limit: u32,
    ) -> Result<Timed<OrderBook>, ApiError> {
        timed(self.get_order_book(symbol, limit)).await
    }
}

async fn timed<T, F>(request: F) -> Result<Timed<T>, ApiError>
where
    F: std::future::Future<Output = Result<T, ApiError>>,
{
    let start = Instant::now();
    let data = request.await?;
    Ok(Timed {
        data,
        response_time_ms: start.elapsed().as_millis() as u64,
    })
}
