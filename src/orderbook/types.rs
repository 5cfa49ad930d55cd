//! Order book data structures and types
//!
//! Snapshots are immutable point-in-time captures of depth for one symbol.
//! Every fetch produces a new snapshot that fully replaces the previous one.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Depth limits the viewer lets the user choose from
pub const DEPTH_LIMITS: [u32; 10] = [10, 20, 30, 40, 50, 60, 70, 80, 90, 100];

/// Rejected depth selection (not one of [`DEPTH_LIMITS`])
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid depth limit {0}: must be one of 10, 20, 30, 40, 50, 60, 70, 80, 90, 100")]
pub struct InvalidDepthLimit(pub u32);

/// Number of price levels requested per side of the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct DepthLimit(u32);

impl DepthLimit {
    pub fn get(self) -> u32 {
        self.0
    }

    /// All selectable limits, smallest first
    pub fn all() -> impl Iterator<Item = DepthLimit> {
        DEPTH_LIMITS.iter().map(|&v| DepthLimit(v))
    }
}

impl Default for DepthLimit {
    fn default() -> Self {
        DepthLimit(DEPTH_LIMITS[0])
    }
}

impl TryFrom<u32> for DepthLimit {
    type Error = InvalidDepthLimit;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if DEPTH_LIMITS.contains(&value) {
            Ok(DepthLimit(value))
        } else {
            Err(InvalidDepthLimit(value))
        }
    }
}

impl From<DepthLimit> for u32 {
    fn from(limit: DepthLimit) -> Self {
        limit.0
    }
}

impl fmt::Display for DepthLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One price level, kept as the exchange's decimal strings
///
/// Serialized as a `[price, quantity]` pair, matching the REST payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct PriceLevel {
    pub price: String,
    pub quantity: String,
}

impl PriceLevel {
    pub fn new(price: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self {
            price: price.into(),
            quantity: quantity.into(),
        }
    }
}

impl From<(String, String)> for PriceLevel {
    fn from((price, quantity): (String, String)) -> Self {
        Self { price, quantity }
    }
}

impl From<PriceLevel> for (String, String) {
    fn from(level: PriceLevel) -> Self {
        (level.price, level.quantity)
    }
}

/// Point-in-time order book depth for a single trading symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    /// Trading pair symbol (uppercase, e.g., "BTCUSDT")
    pub symbol: String,

    /// Depth limit the snapshot was requested with
    pub limit: DepthLimit,

    /// Bid levels, best (highest) first
    pub bids: Vec<PriceLevel>,

    /// Ask levels, best (lowest) first
    pub asks: Vec<PriceLevel>,

    /// Last update ID from Binance, only meaningful for ordering
    pub last_update_id: i64,

    /// Local receive time (milliseconds since Unix epoch)
    pub received_at: i64,
}

impl OrderBookSnapshot {
    pub fn new(
        symbol: impl Into<String>,
        limit: DepthLimit,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
        last_update_id: i64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            limit,
            bids,
            asks,
            last_update_id,
            received_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// True when either side of the book has no levels
    pub fn is_one_sided(&self) -> bool {
        self.bids.is_empty() || self.asks.is_empty()
    }
}
