//! Binance API Client
//!
//! This module contains the HTTP client for the public Binance REST endpoints.

pub mod client;
pub mod types;

#[cfg(feature = "rate-limit")]
pub mod rate_limiter;

// Re-export commonly used types
pub use client::BinanceClient;
pub use types::{ExchangeInfo, ExchangeSummary, SymbolInfo, Timed};
