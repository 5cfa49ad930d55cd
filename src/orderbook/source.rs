//! Market data source abstraction
//!
//! The session only needs two capabilities from the exchange: a depth
//! snapshot for one symbol and the symbol catalog. [`BinanceClient`] provides
//! both over REST; tests substitute an in-memory source.

use crate::binance::types::{OrderBook, SymbolInfo, SYMBOL_STATUS_TRADING};
use crate::binance::BinanceClient;
use crate::error::ApiError;
use crate::orderbook::types::{DepthLimit, OrderBookSnapshot, PriceLevel};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Catalog entry for an exchange symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolListing {
    pub symbol: String,
    pub base_asset: String,
    pub status: String,
    pub is_spot_trading_allowed: bool,
}

impl SymbolListing {
    /// Currently trading with spot trading enabled
    pub fn is_tradable(&self) -> bool {
        self.status == SYMBOL_STATUS_TRADING && self.is_spot_trading_allowed
    }
}

impl From<&SymbolInfo> for SymbolListing {
    fn from(info: &SymbolInfo) -> Self {
        Self {
            symbol: info.symbol.clone(),
            base_asset: info.base_asset.clone(),
            status: info.status.clone(),
            is_spot_trading_allowed: info.is_spot_trading_allowed,
        }
    }
}

/// Provider of order book snapshots and the symbol catalog
#[async_trait]
pub trait MarketDataSource: Send + Sync + 'static {
    /// Fetch current depth for `symbol` with `limit` levels per side
    async fn fetch_snapshot(
        &self,
        symbol: &str,
        limit: DepthLimit,
    ) -> Result<OrderBookSnapshot, ApiError>;

    /// List every symbol the exchange reports, halted ones included
    async fn list_symbols(&self) -> Result<Vec<SymbolListing>, ApiError>;
}

impl OrderBookSnapshot {
    /// Build a snapshot from a REST depth response
    pub fn from_depth(symbol: impl Into<String>, limit: DepthLimit, book: OrderBook) -> Self {
        let levels = |side: Vec<(String, String)>| -> Vec<PriceLevel> {
            side.into_iter().map(PriceLevel::from).collect()
        };
        Self::new(
            symbol,
            limit,
            levels(book.bids),
            levels(book.asks),
            book.last_update_id,
        )
    }
}

#[async_trait]
impl MarketDataSource for BinanceClient {
    async fn fetch_snapshot(
        &self,
        symbol: &str,
        limit: DepthLimit,
    ) -> Result<OrderBookSnapshot, ApiError> {
        let book = self.get_order_book(symbol, limit.get()).await?;
        Ok(OrderBookSnapshot::from_depth(symbol, limit, book))
    }

    async fn list_symbols(&self) -> Result<Vec<SymbolListing>, ApiError> {
        let info = self.get_exchange_info().await?;
        Ok(info.symbols.iter().map(SymbolListing::from).collect())
    }
}
