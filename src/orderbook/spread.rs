//! Spread indicator calculations
//!
//! Derives top-of-book figures from a snapshot:
//! - Absolute spread (best ask - best bid)
//! - Spread as a percentage of the best ask
//! - Mid price
//! - Liquidity classification from the spread percentage

use crate::orderbook::types::OrderBookSnapshot;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Spread % above which the book is considered thin
const LOW_LIQUIDITY_PERCENT: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Spread % above which (up to the low threshold) liquidity is medium
const MEDIUM_LIQUIDITY_PERCENT: Decimal = Decimal::from_parts(1, 0, 0, false, 1);

/// Liquidity class inferred from the spread percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Liquidity {
    /// Spread % <= 0.1
    High,

    /// 0.1 < spread % <= 0.5
    Medium,

    /// Spread % > 0.5
    Low,
}

impl Liquidity {
    pub fn classify(spread_percent: Decimal) -> Self {
        if spread_percent > LOW_LIQUIDITY_PERCENT {
            Liquidity::Low
        } else if spread_percent > MEDIUM_LIQUIDITY_PERCENT {
            Liquidity::Medium
        } else {
            Liquidity::High
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Liquidity::High => "high liquidity",
            Liquidity::Medium => "medium liquidity",
            Liquidity::Low => "low liquidity",
        }
    }
}

impl fmt::Display for Liquidity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Top-of-book spread figures for one snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadIndicator {
    pub best_bid: Decimal,
    pub best_ask: Decimal,

    /// best_ask - best_bid
    pub spread_absolute: Decimal,

    /// spread_absolute / best_ask * 100
    pub spread_percent: f64,

    /// (best_bid + best_ask) / 2
    pub mid_price: Decimal,

    pub liquidity: Liquidity,
}

impl SpreadIndicator {
    /// Compute the indicator, or `None` when either side of the book is empty
    ///
    /// Unparsable prices and a zero best ask also yield `None`.
    pub fn from_snapshot(snapshot: &OrderBookSnapshot) -> Option<Self> {
        let best_bid = parse_price(&snapshot.best_bid()?.price)?;
        let best_ask = parse_price(&snapshot.best_ask()?.price)?;
        Self::from_prices(best_bid, best_ask)
    }

    pub fn from_prices(best_bid: Decimal, best_ask: Decimal) -> Option<Self> {
        if best_ask.is_zero() {
            return None;
        }

        let spread_absolute = best_ask - best_bid;
        let spread_ratio = spread_absolute.checked_div(best_ask)?;
        let percent = spread_ratio * Decimal::ONE_HUNDRED;
        let mid_price = (best_bid + best_ask) / Decimal::TWO;

        Some(Self {
            best_bid,
            best_ask,
            spread_absolute,
            spread_percent: percent.to_f64()?,
            mid_price,
            liquidity: Liquidity::classify(percent),
        })
    }
}

fn parse_price(raw: &str) -> Option<Decimal> {
    match Decimal::from_str(raw.trim()) {
        Ok(price) => Some(price),
        Err(e) => {
            debug!(price = raw, error = %e, "Unparsable price level, skipping spread");
            None
        }
    }
}
