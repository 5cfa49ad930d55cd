//! Order book viewing session
//!
//! Owns the selected symbol, depth limit and latest snapshot, and drives
//! automatic refreshes through a [`CountdownController`] created on the first
//! symbol selection.
//!
//! Fetch rules:
//! - a failed fetch never clears the previous snapshot, even across a
//!   symbol switch
//! - `is_refetching` is only raised for refreshes after the first successful
//!   load, and is always cleared when the fetch settles
//! - with [`FetchOrdering::LastSettled`], the last fetch to settle wins, even
//!   when it was issued for a previously selected symbol
//! - with [`FetchOrdering::LatestIssued`], results from anything but the most
//!   recently issued fetch are discarded

use crate::config::{FetchOrdering, ViewerConfig};
use crate::countdown::{refresh_callback, CountdownController, CountdownState, RefreshCallback};
use crate::error::ViewerError;
use crate::orderbook::source::{MarketDataSource, SymbolListing};
use crate::orderbook::spread::SpreadIndicator;
use crate::orderbook::types::{DepthLimit, OrderBookSnapshot};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, info, warn};

/// Capacity of the session event channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Session settings taken from [`ViewerConfig`]
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub refresh_secs: NonZeroU32,
    pub depth_limit: DepthLimit,
    pub fetch_ordering: FetchOrdering,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&ViewerConfig::default())
    }
}

impl From<&ViewerConfig> for SessionConfig {
    fn from(config: &ViewerConfig) -> Self {
        Self {
            refresh_secs: config.refresh_secs,
            depth_limit: config.depth_limit,
            fetch_ordering: config.fetch_ordering,
        }
    }
}

/// Notifications for the display layer
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A new snapshot replaced the previous one
    SnapshotUpdated {
        symbol: String,
        response_time_ms: u64,
    },

    /// A fetch failed; the previous snapshot is still shown
    FetchFailed { symbol: String, message: String },

    /// The symbol catalog was (re)loaded
    SymbolsLoaded { count: usize, response_time_ms: u64 },
}

/// Read-only view of the session state
#[derive(Debug, Clone, Default)]
pub struct FetchSession {
    pub selected_symbol: Option<String>,
    pub depth_limit: DepthLimit,

    /// Last successfully fetched book; may belong to a previously selected symbol
    pub latest_snapshot: Option<Arc<OrderBookSnapshot>>,

    /// True from symbol selection until the first successful fetch for it
    pub is_initial_load: bool,

    /// True while a refresh of an already-loaded symbol is in flight
    pub is_refetching: bool,

    /// Wall-clock latency of the fetch that produced `latest_snapshot`
    pub response_time_ms: Option<u64>,

    /// Derived from `latest_snapshot`; `None` when either side is empty
    pub spread: Option<SpreadIndicator>,
}

struct SessionState {
    view: FetchSession,
    symbols: Vec<SymbolListing>,

    /// Token of the most recently issued fetch
    issued: u64,
}

/// Interactive order book session over a [`MarketDataSource`]
pub struct OrderBookSession<S: MarketDataSource> {
    me: Weak<Self>,
    source: Arc<S>,
    config: SessionConfig,
    state: RwLock<SessionState>,
    countdown: Mutex<Option<CountdownController>>,
    events: broadcast::Sender<SessionEvent>,
    closed: AtomicBool,
}

impl<S: MarketDataSource> OrderBookSession<S> {
    pub fn new(source: Arc<S>, config: SessionConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            source,
            config,
            state: RwLock::new(SessionState {
                view: FetchSession {
                    depth_limit: config.depth_limit,
                    ..FetchSession::default()
                },
                symbols: Vec::new(),
                issued: 0,
            }),
            countdown: Mutex::new(None),
            events,
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Receive snapshot, failure and catalog notifications
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Current session state
    pub async fn view(&self) -> FetchSession {
        self.state.read().await.view.clone()
    }

    /// Load the symbol catalog used to validate selections
    ///
    /// Returns the number of symbols available.
    pub async fn load_symbols(&self) -> Result<usize, ViewerError> {
        let started = Instant::now();
        let symbols = self.source.list_symbols().await?;
        let response_time_ms = started.elapsed().as_millis() as u64;
        let count = symbols.len();

        self.state.write().await.symbols = symbols;

        info!(count, response_time_ms, "Symbol catalog loaded");
        let _ = self.events.send(SessionEvent::SymbolsLoaded {
            count,
            response_time_ms,
        });
        Ok(count)
    }

    pub async fn symbols(&self) -> Vec<SymbolListing> {
        self.state.read().await.symbols.clone()
    }

    /// Case-insensitive match on symbol or base asset, catalog order, at most `max` results
    pub async fn search_symbols(&self, query: &str, max: usize) -> Vec<SymbolListing> {
        let query = query.trim().to_uppercase();
        let state = self.state.read().await;
        state
            .symbols
            .iter()
            .filter(|s| {
                query.is_empty()
                    || s.symbol.contains(&query)
                    || s.base_asset.to_uppercase().contains(&query)
            })
            .take(max)
            .cloned()
            .collect()
    }

    /// Select a symbol, load its book and (re)start the refresh countdown
    ///
    /// The countdown is reset even when the initial fetch fails, so the
    /// session keeps retrying on its normal cadence.
    pub async fn select_symbol(&self, symbol: &str) -> Result<(), ViewerError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(ViewerError::UnknownSymbol(symbol));
        }

        let limit = {
            let mut state = self.state.write().await;
            if !state.symbols.is_empty() && !state.symbols.iter().any(|s| s.symbol == symbol) {
                return Err(ViewerError::UnknownSymbol(symbol));
            }

            state.view.selected_symbol = Some(symbol.clone());
            state.view.is_initial_load = true;
            state.view.is_refetching = false;
            state.view.depth_limit
        };

        info!(symbol = %symbol, limit = %limit, "Symbol selected");
        let result = self.fetch(&symbol, limit, false).await;
        self.reset_countdown();
        result
    }

    /// Change the depth limit, refetching and resetting the countdown if a symbol is selected
    pub async fn change_limit(&self, limit: DepthLimit) -> Result<(), ViewerError> {
        let selected = {
            let mut state = self.state.write().await;
            state.view.depth_limit = limit;
            state.view.selected_symbol.clone()
        };

        let Some(symbol) = selected else {
            debug!(limit = %limit, "Depth limit changed with no symbol selected");
            return Ok(());
        };

        info!(symbol = %symbol, limit = %limit, "Depth limit changed");
        let result = self.fetch(&symbol, limit, true).await;
        self.reset_countdown();
        result
    }

    /// Refetch the selected symbol at the current limit; no-op without a selection
    ///
    /// This is the callback the countdown invokes.
    pub async fn refresh(&self) -> Result<(), ViewerError> {
        let target = {
            let state = self.state.read().await;
            state
                .view
                .selected_symbol
                .clone()
                .map(|symbol| (symbol, state.view.depth_limit))
        };

        match target {
            Some((symbol, limit)) => self.fetch(&symbol, limit, true).await,
            None => {
                debug!("Refresh requested with no symbol selected");
                Ok(())
            }
        }
    }

    async fn fetch(
        &self,
        symbol: &str,
        limit: DepthLimit,
        is_refresh: bool,
    ) -> Result<(), ViewerError> {
        let token = {
            let mut state = self.state.write().await;
            if is_refresh && !state.view.is_initial_load {
                state.view.is_refetching = true;
            }
            state.issued += 1;
            state.issued
        };

        let started = Instant::now();
        let result = self.source.fetch_snapshot(symbol, limit).await;
        let response_time_ms = started.elapsed().as_millis() as u64;

        let mut state = self.state.write().await;
        state.view.is_refetching = false;

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                drop(state);
                warn!(
                    symbol = %symbol,
                    limit = %limit,
                    error = %e,
                    "Order book fetch failed, keeping previous snapshot"
                );
                let _ = self.events.send(SessionEvent::FetchFailed {
                    symbol: symbol.to_string(),
                    message: e.to_string(),
                });
                return Err(e.into());
            }
        };

        if self.config.fetch_ordering == FetchOrdering::LatestIssued && token != state.issued {
            debug!(symbol = %symbol, token, latest = state.issued, "Discarding superseded snapshot");
            return Ok(());
        }

        state.view.spread = SpreadIndicator::from_snapshot(&snapshot);
        state.view.latest_snapshot = Some(Arc::new(snapshot));
        state.view.is_initial_load = false;
        state.view.response_time_ms = Some(response_time_ms);
        drop(state);

        debug!(symbol = %symbol, limit = %limit, response_time_ms, "Order book updated");
        let _ = self.events.send(SessionEvent::SnapshotUpdated {
            symbol: symbol.to_string(),
            response_time_ms,
        });
        Ok(())
    }

    /// Suspend automatic refreshes, e.g. while the user is choosing a symbol
    pub fn pause_countdown(&self) {
        if let Some(countdown) = self.countdown_slot().as_ref() {
            countdown.pause();
        }
    }

    pub fn resume_countdown(&self) {
        if let Some(countdown) = self.countdown_slot().as_ref() {
            countdown.resume();
        }
    }

    /// Countdown state, `None` until a symbol has been selected
    pub fn countdown_state(&self) -> Option<CountdownState> {
        self.countdown_slot().as_ref().map(CountdownController::state)
    }

    pub fn subscribe_countdown(&self) -> Option<watch::Receiver<CountdownState>> {
        self.countdown_slot()
            .as_ref()
            .map(CountdownController::subscribe)
    }

    /// Stop automatic refreshes; in-flight fetches still settle
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(countdown) = self.countdown_slot().take() {
            countdown.shutdown();
        }
        info!("Order book session stopped");
    }

    fn countdown_slot(&self) -> MutexGuard<'_, Option<CountdownController>> {
        self.countdown.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reset_countdown(&self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }

        let mut slot = self.countdown_slot();
        match slot.as_ref() {
            Some(countdown) => countdown.reset(),
            None => {
                *slot = Some(CountdownController::new(
                    self.config.refresh_secs,
                    self.countdown_callback(),
                ));
            }
        }
    }

    fn countdown_callback(&self) -> RefreshCallback {
        let me = self.me.clone();
        refresh_callback(move || {
            let me = me.clone();
            async move {
                match me.upgrade() {
                    Some(session) => session.refresh().await.map_err(anyhow::Error::from),
                    None => Ok(()),
                }
            }
        })
    }
}

impl<S: MarketDataSource> Drop for OrderBookSession<S> {
    fn drop(&mut self) {
        if let Some(countdown) = self.countdown_slot().take() {
            countdown.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::orderbook::types::PriceLevel;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    /// Replays scripted depth responses in order
    #[derive(Default)]
    struct Scripted {
        responses: Mutex<VecDeque<Result<(Vec<PriceLevel>, Vec<PriceLevel>), ApiError>>>,
    }

    impl Scripted {
        fn push(&self, response: Result<(Vec<PriceLevel>, Vec<PriceLevel>), ApiError>) {
            self.responses.lock().unwrap().push_back(response);
        }
    }

    #[async_trait]
    impl MarketDataSource for Scripted {
        async fn fetch_snapshot(
            &self,
            symbol: &str,
            limit: DepthLimit,
        ) -> Result<OrderBookSnapshot, ApiError> {
            let next = self.responses.lock().unwrap().pop_front();
            let (bids, asks) = next.unwrap_or_else(|| Ok((Vec::new(), Vec::new())))?;
            Ok(OrderBookSnapshot::new(symbol, limit, bids, asks, 1))
        }

        async fn list_symbols(&self) -> Result<Vec<SymbolListing>, ApiError> {
            Ok(vec![SymbolListing {
                symbol: "BTCUSDT".to_string(),
                base_asset: "BTC".to_string(),
                status: "TRADING".to_string(),
                is_spot_trading_allowed: true,
            }])
        }
    }

    fn book(bid: &str, ask: &str) -> (Vec<PriceLevel>, Vec<PriceLevel>) {
        (
            vec![PriceLevel::new(bid, "1.0")],
            vec![PriceLevel::new(ask, "1.0")],
        )
    }

    #[tokio::test]
    async fn test_refresh_without_symbol_is_noop() {
        let session = OrderBookSession::new(Arc::new(Scripted::default()), SessionConfig::default());
        session.refresh().await.unwrap();
        assert!(session.view().await.latest_snapshot.is_none());
        assert!(session.countdown_state().is_none());
    }

    #[tokio::test]
    async fn test_select_symbol_loads_snapshot_and_spread() {
        let source = Arc::new(Scripted::default());
        source.push(Ok(book("100.00", "100.50")));
        let session = OrderBookSession::new(source, SessionConfig::default());

        session.select_symbol("btcusdt").await.unwrap();

        let view = session.view().await;
        assert_eq!(view.selected_symbol.as_deref(), Some("BTCUSDT"));
        assert!(!view.is_initial_load);
        assert!(!view.is_refetching);
        assert!(view.response_time_ms.is_some());
        let spread = view.spread.expect("spread");
        assert_eq!(spread.mid_price, rust_decimal::Decimal::new(10025, 2));
        assert!(session.countdown_state().is_some());
        session.shutdown();
    }

    #[tokio::test]
    async fn test_unknown_symbol_rejected_once_catalog_loaded() {
        let session = OrderBookSession::new(Arc::new(Scripted::default()), SessionConfig::default());
        assert_eq!(session.load_symbols().await.unwrap(), 1);

        let err = session.select_symbol("DOGEUSDT").await.unwrap_err();
        assert!(matches!(err, ViewerError::UnknownSymbol(s) if s == "DOGEUSDT"));
        assert!(session.view().await.selected_symbol.is_none());
    }

    #[tokio::test]
    async fn test_search_matches_symbol_and_base_asset() {
        let session = OrderBookSession::new(Arc::new(Scripted::default()), SessionConfig::default());
        session.load_symbols().await.unwrap();

        assert_eq!(session.search_symbols("usdt", 10).await.len(), 1);
        assert_eq!(session.search_symbols("btc", 10).await.len(), 1);
        assert!(session.search_symbols("eth", 10).await.is_empty());
        assert!(session.search_symbols("", 0).await.is_empty());
    }
}
