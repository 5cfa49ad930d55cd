//! Client-side rate limiter for Binance REST requests
//!
//! Implements GCRA (Generic Cell Rate Algorithm) via governor crate.
//! Requests over quota are queued for up to 30s, then rejected.

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Maximum time to wait in queue before rejecting request
const QUEUE_TIMEOUT_SECS: u64 = 30;

/// Poll interval while waiting for a permit
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum RateLimiterError {
    #[error("Rate limit queue timeout after {0}s")]
    QueueTimeout(u64),
}

impl From<RateLimiterError> for crate::error::ApiError {
    fn from(err: RateLimiterError) -> Self {
        crate::error::ApiError::RateLimitError(err.to_string())
    }
}

/// Client-side rate limiter shared by every request a client makes
pub struct RateLimiter {
    limiter: GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    queue_timeout: Duration,
}

impl RateLimiter {
    pub fn new(requests_per_minute: NonZeroU32) -> Self {
        Self::with_timeout(requests_per_minute, Duration::from_secs(QUEUE_TIMEOUT_SECS))
    }

    pub fn with_timeout(requests_per_minute: NonZeroU32, queue_timeout: Duration) -> Self {
        Self {
            limiter: GovernorRateLimiter::direct(Quota::per_minute(requests_per_minute)),
            queue_timeout,
        }
    }

    /// Wait for rate limit permission
    ///
    /// Returns Ok(()) when the request may proceed, Err once the queue timeout expires.
    pub async fn wait(&self) -> Result<(), RateLimiterError> {
        if self.limiter.check().is_ok() {
            return Ok(());
        }

        warn!("Rate limit reached, queueing request");

        let waited = timeout(self.queue_timeout, async {
            while self.limiter.check().is_err() {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        })
        .await;

        match waited {
            Ok(()) => {
                debug!("Rate limit permission granted after queueing");
                Ok(())
            }
            Err(_) => {
                let secs = self.queue_timeout.as_secs();
                warn!(timeout_secs = secs, "Rate limit queue timeout exceeded");
                Err(RateLimiterError::QueueTimeout(secs))
            }
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("queue_timeout", &self.queue_timeout)
            .finish_non_exhaustive()
    }
}
