//! Binance API Type Definitions
//!
//! Type definitions for the public Binance endpoints the viewer consumes.
//! Optional or newer exchange fields default when absent.

use serde::{Deserialize, Serialize};

/// Response from /api/v3/exchangeInfo endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeInfo {
    pub timezone: String,

    /// Server time in milliseconds since Unix epoch
    pub server_time: i64,

    #[serde(default)]
    pub rate_limits: Vec<RateLimit>,

    pub symbols: Vec<SymbolInfo>,
}

impl ExchangeInfo {
    pub fn find_symbol(&self, name: &str) -> Option<&SymbolInfo> {
        self.symbols.iter().find(|s| s.symbol == name)
    }

    pub fn summary(&self) -> ExchangeSummary {
        ExchangeSummary {
            timezone: self.timezone.clone(),
            server_time: self.server_time,
            total_symbols: self.symbols.len(),
            active_symbols: self
                .symbols
                .iter()
                .filter(|s| s.status == SYMBOL_STATUS_TRADING)
                .count(),
        }
    }
}

/// Status string Binance reports for tradable symbols
pub const SYMBOL_STATUS_TRADING: &str = "TRADING";

/// Exchange metadata without the symbol list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeSummary {
    pub timezone: String,
    pub server_time: i64,
    pub total_symbols: usize,
    pub active_symbols: usize,
}

/// Request weight / order rate limit advertised by the exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit {
    /// REQUEST_WEIGHT, ORDERS or RAW_REQUESTS
    pub rate_limit_type: String,
    pub interval: String,
    pub interval_num: u32,
    pub limit: u32,
}

/// Trading pair metadata from exchangeInfo
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    /// Trading pair symbol (e.g., "BTCUSDT")
    pub symbol: String,
    /// TRADING, BREAK, ...
    pub status: String,
    pub base_asset: String,
    #[serde(default)]
    pub base_asset_precision: u32,
    #[serde(default)]
    pub quote_asset: String,
    #[serde(default)]
    pub quote_precision: u32,
    #[serde(default)]
    pub quote_asset_precision: u32,
    #[serde(default)]
    pub base_commission_precision: u32,
    #[serde(default)]
    pub quote_commission_precision: u32,
    #[serde(default)]
    pub order_types: Vec<String>,
    #[serde(default)]
    pub iceberg_allowed: bool,
    #[serde(default)]
    pub oco_allowed: bool,
    #[serde(default)]
    pub oto_allowed: bool,
    #[serde(default)]
    pub quote_order_qty_market_allowed: bool,
    #[serde(default)]
    pub allow_trailing_stop: bool,
    #[serde(default)]
    pub cancel_replace_allowed: bool,
    #[serde(default)]
    pub is_spot_trading_allowed: bool,
    #[serde(default)]
    pub is_margin_trading_allowed: bool,
    #[serde(default)]
    pub filters: Vec<SymbolFilter>,
    #[serde(default)]
    pub permission_sets: Vec<Vec<String>>,
    #[serde(default)]
    pub default_self_trade_prevention_mode: Option<String>,
    #[serde(default)]
    pub allowed_self_trade_prevention_modes: Vec<String>,
}

impl SymbolInfo {
    /// Tick size from the PRICE_FILTER, if present
    pub fn tick_size(&self) -> Option<&str> {
        self.filters
            .iter()
            .find(|f| f.filter_type == "PRICE_FILTER")
            .and_then(|f| f.tick_size.as_deref())
    }
}

/// Symbol trading rule; the populated fields depend on `filter_type`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolFilter {
    pub filter_type: String,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub tick_size: Option<String>,
    pub min_qty: Option<String>,
    pub max_qty: Option<String>,
    pub step_size: Option<String>,
    pub limit: Option<u32>,
    pub min_notional: Option<String>,
    pub apply_min_to_market: Option<bool>,
    pub max_notional: Option<String>,
    pub apply_max_to_market: Option<bool>,
    pub avg_price_mins: Option<u32>,
    pub max_num_orders: Option<u32>,
    pub max_num_algo_orders: Option<u32>,
    pub max_position: Option<String>,
}

/// Response from /api/v3/depth endpoint
///
/// Returns order book depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBook {
    /// Last update ID
    pub last_update_id: i64,
    /// Bid levels [price, quantity]
    pub bids: Vec<(String, String)>,
    /// Ask levels [price, quantity]
    pub asks: Vec<(String, String)>,
}

/// Response payload paired with the measured round-trip time
#[derive(Debug, Clone)]
pub struct Timed<T> {
    pub data: T,
    pub response_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXCHANGE_INFO: &str = r#"{
        "timezone": "UTC",
        "serverTime": 1699564800000,
        "rateLimits": [
            {"rateLimitType": "REQUEST_WEIGHT", "interval": "MINUTE", "intervalNum": 1, "limit": 6000}
        ],
        "symbols": [
            {
                "symbol": "BTCUSDT", "status": "TRADING", "baseAsset": "BTC", "quoteAsset": "USDT",
                "isSpotTradingAllowed": true,
                "filters": [{"filterType": "PRICE_FILTER", "minPrice": "0.01", "maxPrice": "1000000.00", "tickSize": "0.01"}],
                "permissionSets": [["SPOT", "MARGIN"]]
            },
            {"symbol": "ETHBTC", "status": "BREAK", "baseAsset": "ETH", "isSpotTradingAllowed": true},
            {"symbol": "XYZUSDT", "status": "TRADING", "baseAsset": "XYZ", "isSpotTradingAllowed": false}
        ]
    }"#;

    #[test]
    fn test_exchange_info_deserialization() {
        let info: ExchangeInfo = serde_json::from_str(EXCHANGE_INFO).unwrap();
        assert_eq!(info.timezone, "UTC");
        assert_eq!(info.rate_limits[0].limit, 6000);
        assert_eq!(info.symbols.len(), 3);
        assert_eq!(info.symbols[0].tick_size(), Some("0.01"));
        assert!(info.symbols[1].filters.is_empty());
    }

    #[test]
    fn test_summary_counts_trading_symbols() {
        let info: ExchangeInfo = serde_json::from_str(EXCHANGE_INFO).unwrap();
        let summary = info.summary();
        assert_eq!(summary.total_symbols, 3);
        assert_eq!(summary.active_symbols, 2);
        assert_eq!(summary.server_time, 1699564800000);
    }

    #[test]
    fn test_find_symbol() {
        let info: ExchangeInfo = serde_json::from_str(EXCHANGE_INFO).unwrap();
        assert_eq!(info.find_symbol("ETHBTC").map(|s| s.base_asset.as_str()), Some("ETH"));
        assert!(info.find_symbol("DOGEUSDT").is_none());
    }

    #[test]
    fn test_depth_deserialization() {
        let json = r#"{"lastUpdateId": 1027024, "bids": [["4.00000000", "431.00000000"]], "asks": []}"#;
        let book: OrderBook = serde_json::from_str(json).unwrap();
        assert_eq!(book.last_update_id, 1027024);
        assert_eq!(book.bids[0].0, "4.00000000");
        assert!(book.asks.is_empty());
    }
}
