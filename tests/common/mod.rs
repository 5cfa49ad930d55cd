// Shared fixtures for session integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use orderbook_viewer::error::ApiError;
use orderbook_viewer::orderbook::{
    DepthLimit, MarketDataSource, OrderBookSnapshot, PriceLevel, SymbolListing,
};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// One scripted depth response
pub struct Step {
    pub delay: Duration,
    pub result: Result<Book, ApiError>,
}

#[derive(Clone)]
pub struct Book {
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub last_update_id: i64,
}

pub fn book(last_update_id: i64, bid: &str, ask: &str) -> Book {
    Book {
        bids: vec![PriceLevel::new(bid, "1.00000000")],
        asks: vec![PriceLevel::new(ask, "2.00000000")],
        last_update_id,
    }
}

pub fn listing(symbol: &str, base_asset: &str) -> SymbolListing {
    SymbolListing {
        symbol: symbol.to_string(),
        base_asset: base_asset.to_string(),
        status: "TRADING".to_string(),
        is_spot_trading_allowed: true,
    }
}

/// In-memory market data source replaying scripted responses in call order
///
/// Once the script runs out every fetch returns `fallback`.
pub struct FakeSource {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<(String, DepthLimit)>>,
    symbols: Vec<SymbolListing>,
    fallback: Book,
}

impl Default for FakeSource {
    fn default() -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            symbols: vec![listing("BTCUSDT", "BTC"), listing("ETHUSDT", "ETH")],
            fallback: book(0, "100.00", "100.50"),
        }
    }
}

impl FakeSource {
    pub fn with_symbols(symbols: Vec<SymbolListing>) -> Self {
        Self {
            symbols,
            ..Self::default()
        }
    }

    pub fn ok(&self, book: Book) {
        self.delayed(Duration::ZERO, book);
    }

    pub fn delayed(&self, delay: Duration, book: Book) {
        self.steps.lock().unwrap().push_back(Step {
            delay,
            result: Ok(book),
        });
    }

    pub fn fail(&self, message: &str) {
        self.steps.lock().unwrap().push_back(Step {
            delay: Duration::ZERO,
            result: Err(ApiError::ConnectionError(message.to_string())),
        });
    }

    pub fn calls(&self) -> Vec<(String, DepthLimit)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl MarketDataSource for FakeSource {
    async fn fetch_snapshot(
        &self,
        symbol: &str,
        limit: DepthLimit,
    ) -> Result<OrderBookSnapshot, ApiError> {
        self.calls.lock().unwrap().push((symbol.to_string(), limit));
        let step = self.steps.lock().unwrap().pop_front();

        let (delay, result) = match step {
            Some(step) => (step.delay, step.result),
            None => (Duration::ZERO, Ok(self.fallback.clone())),
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let book = result?;
        Ok(OrderBookSnapshot::new(
            symbol,
            limit,
            book.bids,
            book.asks,
            book.last_update_id,
        ))
    }

    async fn list_symbols(&self) -> Result<Vec<SymbolListing>, ApiError> {
        Ok(self.symbols.clone())
    }
}
