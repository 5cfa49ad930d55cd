// Integration tests for the order book session
//
// Drives OrderBookSession against an in-memory source with paused Tokio time:
// - snapshot replacement and stale-on-failure behavior
// - loading flags around initial loads and refreshes
// - countdown-driven refreshes, pause/resume and teardown
// - concurrent fetch ordering policies

mod common;

use common::{book, listing, FakeSource};
use orderbook_viewer::config::FetchOrdering;
use orderbook_viewer::countdown::CountdownPhase;
use orderbook_viewer::error::{ApiError, ViewerError};
use orderbook_viewer::orderbook::{
    DepthLimit, Liquidity, OrderBookSession, PriceLevel, SessionConfig, SessionEvent,
    SymbolListing,
};
use rust_decimal::Decimal;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn config(refresh_secs: u32, fetch_ordering: FetchOrdering) -> SessionConfig {
    SessionConfig {
        refresh_secs: NonZeroU32::new(refresh_secs).unwrap(),
        depth_limit: DepthLimit::default(),
        fetch_ordering,
    }
}

async fn advance_ms(ms: u64) {
    sleep(Duration::from_millis(ms)).await;
}

async fn snapshot_id(session: &OrderBookSession<FakeSource>) -> Option<i64> {
    session
        .view()
        .await
        .latest_snapshot
        .map(|snapshot| snapshot.last_update_id)
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_keeps_previous_snapshot() {
    let source = Arc::new(FakeSource::default());
    source.ok(book(1, "100.00", "100.50"));
    source.fail("exchange unavailable");

    let session = OrderBookSession::new(source.clone(), config(60, FetchOrdering::LastSettled));
    let mut events = session.subscribe();

    session.select_symbol("BTCUSDT").await.unwrap();
    let err = session.refresh().await.unwrap_err();
    assert!(matches!(err, ViewerError::Fetch(ApiError::ConnectionError(_))));

    let view = session.view().await;
    assert_eq!(view.latest_snapshot.map(|s| s.last_update_id), Some(1));
    assert!(!view.is_refetching);
    assert!(!view.is_initial_load);
    assert!(view.spread.is_some());

    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::SnapshotUpdated { symbol, .. } if symbol == "BTCUSDT"
    ));
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::FetchFailed {
            symbol: "BTCUSDT".to_string(),
            message: "Connection error: exchange unavailable".to_string(),
        }
    );
    session.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_refetching_flag_tracks_refresh_in_flight() {
    let source = Arc::new(FakeSource::default());
    source.ok(book(1, "100.00", "100.50"));
    source.delayed(Duration::from_secs(2), book(2, "101.00", "101.50"));

    let session = OrderBookSession::new(source.clone(), config(60, FetchOrdering::LastSettled));
    session.select_symbol("BTCUSDT").await.unwrap();

    let refresh = tokio::spawn({
        let session = session.clone();
        async move { session.refresh().await }
    });

    advance_ms(500).await;
    let view = session.view().await;
    assert!(view.is_refetching);
    assert_eq!(view.latest_snapshot.map(|s| s.last_update_id), Some(1));

    refresh.await.unwrap().unwrap();
    let view = session.view().await;
    assert!(!view.is_refetching);
    assert_eq!(view.latest_snapshot.map(|s| s.last_update_id), Some(2));
    session.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_initial_load_is_not_a_refetch() {
    let source = Arc::new(FakeSource::default());
    source.fail("timeout");
    source.delayed(Duration::from_secs(2), book(1, "100.00", "100.50"));

    let session = OrderBookSession::new(source.clone(), config(60, FetchOrdering::LastSettled));
    assert!(session.select_symbol("BTCUSDT").await.is_err());

    // Still the initial load: a refresh must not raise the refetching flag
    let refresh = tokio::spawn({
        let session = session.clone();
        async move { session.refresh().await }
    });

    advance_ms(500).await;
    let view = session.view().await;
    assert!(view.is_initial_load);
    assert!(!view.is_refetching);
    assert!(view.latest_snapshot.is_none());

    refresh.await.unwrap().unwrap();
    let view = session.view().await;
    assert!(!view.is_initial_load);
    assert_eq!(view.latest_snapshot.map(|s| s.last_update_id), Some(1));
    session.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_countdown_drives_refreshes() {
    let source = Arc::new(FakeSource::default());
    let session = OrderBookSession::new(source.clone(), config(2, FetchOrdering::LastSettled));

    session.select_symbol("BTCUSDT").await.unwrap();
    assert_eq!(source.call_count(), 1);

    // Two ticks, then the one-second hold at zero
    advance_ms(2500).await;
    assert_eq!(source.call_count(), 1);
    assert_eq!(session.countdown_state().map(|s| s.remaining_ticks), Some(0));

    advance_ms(1000).await;
    assert_eq!(source.call_count(), 2);
    assert_eq!(session.countdown_state().map(|s| s.remaining_ticks), Some(2));

    advance_ms(3000).await;
    assert_eq!(source.call_count(), 3);
    assert!(source.calls().iter().all(|(symbol, _)| symbol == "BTCUSDT"));
    session.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_paused_countdown_stops_refreshes() {
    let source = Arc::new(FakeSource::default());
    let session = OrderBookSession::new(source.clone(), config(2, FetchOrdering::LastSettled));
    session.select_symbol("BTCUSDT").await.unwrap();

    advance_ms(1500).await;
    session.pause_countdown();
    let paused = session.countdown_state().unwrap();
    assert_eq!(paused.phase, CountdownPhase::Paused);
    assert_eq!(paused.remaining_ticks, 1);

    advance_ms(20_000).await;
    assert_eq!(source.call_count(), 1);
    assert_eq!(session.countdown_state().unwrap().remaining_ticks, 1);

    session.resume_countdown();
    // One more tick, then the hold
    advance_ms(2500).await;
    assert_eq!(source.call_count(), 2);
    session.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_change_limit_refetches_and_resets_countdown() {
    let source = Arc::new(FakeSource::default());
    let session = OrderBookSession::new(source.clone(), config(5, FetchOrdering::LastSettled));
    session.select_symbol("BTCUSDT").await.unwrap();

    advance_ms(1500).await;
    assert_eq!(session.countdown_state().unwrap().remaining_ticks, 4);

    let limit = DepthLimit::try_from(50).unwrap();
    session.change_limit(limit).await.unwrap();

    assert_eq!(source.calls().last(), Some(&("BTCUSDT".to_string(), limit)));
    let view = session.view().await;
    assert_eq!(view.depth_limit, limit);
    assert_eq!(view.latest_snapshot.unwrap().limit, limit);
    assert_eq!(session.countdown_state().unwrap().remaining_ticks, 5);

    // Refreshes keep the new limit
    advance_ms(6500).await;
    assert_eq!(source.calls().last().map(|(_, l)| *l), Some(limit));
    session.shutdown();
}

#[tokio::test]
async fn test_change_limit_without_symbol_only_stores_limit() {
    let source = Arc::new(FakeSource::default());
    let session = OrderBookSession::new(source.clone(), config(3, FetchOrdering::LastSettled));

    let limit = DepthLimit::try_from(100).unwrap();
    session.change_limit(limit).await.unwrap();

    assert_eq!(session.view().await.depth_limit, limit);
    assert_eq!(source.call_count(), 0);
    assert!(session.countdown_state().is_none());
}

#[tokio::test]
async fn test_invalid_limit_is_rejected() {
    let err = ViewerError::from(DepthLimit::try_from(25).unwrap_err());
    assert!(matches!(err, ViewerError::InvalidLimit(_)));
    assert!(err.to_string().contains("25"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_switch_keeps_previous_book() {
    let source = Arc::new(FakeSource::default());
    source.ok(book(1, "100.00", "100.50"));
    source.fail("Invalid symbol.");

    let session = OrderBookSession::new(source.clone(), config(3, FetchOrdering::LastSettled));
    session.load_symbols().await.unwrap();
    session.select_symbol("BTCUSDT").await.unwrap();

    advance_ms(1500).await;
    assert!(session.select_symbol("ethusdt").await.is_err());

    let view = session.view().await;
    assert_eq!(view.selected_symbol.as_deref(), Some("ETHUSDT"));
    assert!(view.is_initial_load);
    let snapshot = view.latest_snapshot.unwrap();
    assert_eq!(snapshot.last_update_id, 1);
    assert_eq!(snapshot.symbol, "BTCUSDT");
    assert!(view.spread.is_some());
    assert!(view.response_time_ms.is_some());

    // Countdown restarted even though the load failed
    let countdown = session.countdown_state().unwrap();
    assert_eq!(countdown.remaining_ticks, 3);
    assert_eq!(countdown.phase, CountdownPhase::Running);
    session.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_switch_during_slow_refresh_last_settled_wins() {
    let source = Arc::new(FakeSource::default());
    source.ok(book(1, "100.00", "100.50"));
    source.delayed(Duration::from_secs(5), book(2, "100.00", "100.50"));
    source.delayed(Duration::from_secs(1), book(3, "2000.00", "2000.50"));

    let session = OrderBookSession::new(source.clone(), config(60, FetchOrdering::LastSettled));
    session.select_symbol("BTCUSDT").await.unwrap();

    let slow = tokio::spawn({
        let session = session.clone();
        async move { session.refresh().await }
    });
    advance_ms(10).await;
    session.select_symbol("ETHUSDT").await.unwrap();
    assert_eq!(snapshot_id(&session).await, Some(3));

    slow.await.unwrap().unwrap();
    let view = session.view().await;
    assert_eq!(view.selected_symbol.as_deref(), Some("ETHUSDT"));
    let snapshot = view.latest_snapshot.unwrap();
    assert_eq!(snapshot.last_update_id, 2);
    assert_eq!(snapshot.symbol, "BTCUSDT");
    assert!(!view.is_refetching);
    session.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_switch_during_slow_refresh_latest_issued_wins() {
    let source = Arc::new(FakeSource::default());
    source.ok(book(1, "100.00", "100.50"));
    source.delayed(Duration::from_secs(5), book(2, "100.00", "100.50"));
    source.delayed(Duration::from_secs(1), book(3, "2000.00", "2000.50"));

    let session = OrderBookSession::new(source.clone(), config(60, FetchOrdering::LatestIssued));
    session.select_symbol("BTCUSDT").await.unwrap();

    let slow = tokio::spawn({
        let session = session.clone();
        async move { session.refresh().await }
    });
    advance_ms(10).await;
    session.select_symbol("ETHUSDT").await.unwrap();

    slow.await.unwrap().unwrap();
    let snapshot = session.view().await.latest_snapshot.unwrap();
    assert_eq!(snapshot.last_update_id, 3);
    assert_eq!(snapshot.symbol, "ETHUSDT");
    session.shutdown();
}

#[tokio::test]
async fn test_halted_symbol_is_selectable() {
    let source = Arc::new(FakeSource::with_symbols(vec![
        listing("BTCUSDT", "BTC"),
        SymbolListing {
            status: "BREAK".to_string(),
            ..listing("LUNAUSDT", "LUNA")
        },
    ]));
    let session = OrderBookSession::new(source.clone(), config(60, FetchOrdering::LastSettled));
    assert_eq!(session.load_symbols().await.unwrap(), 2);

    session.select_symbol("LUNAUSDT").await.unwrap();
    assert_eq!(source.calls().last().map(|(s, _)| s.as_str()), Some("LUNAUSDT"));
    session.shutdown();
}

#[tokio::test]
async fn test_unknown_symbol_is_rejected() {
    let source = Arc::new(FakeSource::default());
    let session = OrderBookSession::new(source.clone(), config(3, FetchOrdering::LastSettled));
    assert_eq!(session.load_symbols().await.unwrap(), 2);

    let err = session.select_symbol("XRPUSDT").await.unwrap_err();
    assert!(matches!(err, ViewerError::UnknownSymbol(ref s) if s == "XRPUSDT"));
    assert_eq!(source.call_count(), 0);
    assert!(session.countdown_state().is_none());
}

#[tokio::test]
async fn test_spread_follows_latest_snapshot() {
    let source = Arc::new(FakeSource::default());
    source.ok(book(1, "100.00", "100.50"));
    source.ok(common::Book {
        bids: vec![PriceLevel::new("100.00", "1.0")],
        asks: vec![],
        last_update_id: 2,
    });

    let session = OrderBookSession::new(source.clone(), config(60, FetchOrdering::LastSettled));
    session.select_symbol("BTCUSDT").await.unwrap();

    let spread = session.view().await.spread.unwrap();
    assert_eq!(spread.spread_absolute, Decimal::new(5, 1));
    assert_eq!(spread.mid_price, Decimal::new(10025, 2));
    assert!((spread.spread_percent - 0.4975).abs() < 0.0001);
    assert_eq!(spread.liquidity, Liquidity::Medium);

    session.refresh().await.unwrap();
    let view = session.view().await;
    assert_eq!(view.latest_snapshot.map(|s| s.last_update_id), Some(2));
    assert!(view.spread.is_none());
    session.shutdown();
}

/// Slow fetch issued first, fast fetch issued second; returns the surviving snapshot
async fn race(ordering: FetchOrdering) -> Option<i64> {
    let source = Arc::new(FakeSource::default());
    source.ok(book(1, "100.00", "100.50"));
    source.delayed(Duration::from_secs(5), book(2, "100.00", "100.50"));
    source.delayed(Duration::from_secs(1), book(3, "100.00", "100.50"));

    let session = OrderBookSession::new(source.clone(), config(60, ordering));
    session.select_symbol("BTCUSDT").await.unwrap();

    let slow = tokio::spawn({
        let session = session.clone();
        async move { session.refresh().await }
    });
    advance_ms(10).await;
    let fast = tokio::spawn({
        let session = session.clone();
        async move { session.refresh().await }
    });

    fast.await.unwrap().unwrap();
    assert_eq!(snapshot_id(&session).await, Some(3));
    slow.await.unwrap().unwrap();

    let id = snapshot_id(&session).await;
    assert!(!session.view().await.is_refetching);
    session.shutdown();
    id
}

#[tokio::test(start_paused = true)]
async fn test_last_settled_fetch_wins_by_default() {
    assert_eq!(race(FetchOrdering::LastSettled).await, Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_latest_issued_discards_superseded_fetch() {
    assert_eq!(race(FetchOrdering::LatestIssued).await, Some(3));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_refreshes() {
    let source = Arc::new(FakeSource::default());
    let session = OrderBookSession::new(source.clone(), config(1, FetchOrdering::LastSettled));
    session.select_symbol("BTCUSDT").await.unwrap();

    session.shutdown();
    advance_ms(10_000).await;
    assert_eq!(source.call_count(), 1);

    // Selections still fetch, but no countdown is started again
    session.select_symbol("ETHUSDT").await.unwrap();
    assert!(session.countdown_state().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_dropped_session_stops_refreshing() {
    let source = Arc::new(FakeSource::default());
    let session = OrderBookSession::new(source.clone(), config(1, FetchOrdering::LastSettled));
    session.select_symbol("BTCUSDT").await.unwrap();

    drop(session);
    advance_ms(10_000).await;
    assert_eq!(source.call_count(), 1);
}
