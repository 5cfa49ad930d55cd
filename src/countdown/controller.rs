//! Self-driving refresh countdown
//!
//! A countdown ticks once per second from the configured duration down to
//! zero, holds at zero for one second so observers can show the completed
//! state, then runs the registered refresh callback. When the callback
//! settles (success, error or panic) the cycle starts over.
//!
//! Timer ownership rules:
//! - the only timer task lives in `Inner::timer`, and it is `Some` iff the
//!   phase is `Running`
//! - every transition calls `cancel_all()` before arming a new timer
//! - each timer task carries the epoch it was armed with and stops touching
//!   state as soon as the epoch moves on
//!
//! The same task that counted down goes on to run the callback, but it
//! detaches itself from `Inner::timer` first so `pause`/`reset` can never
//! abort a refresh that has already started.

use crate::countdown::types::{CountdownPhase, CountdownState};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::num::NonZeroU32;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Countdown resolution
const TICK: Duration = Duration::from_secs(1);

/// How long the countdown stays at 0s/100% before the refresh fires
const DISPLAY_DELAY: Duration = Duration::from_secs(1);

/// Future returned by a refresh callback
pub type RefreshFuture = BoxFuture<'static, anyhow::Result<()>>;

/// Callback invoked each time the countdown reaches zero
pub type RefreshCallback = Arc<dyn Fn() -> RefreshFuture + Send + Sync>;

/// Wrap an async closure as a [`RefreshCallback`]
pub fn refresh_callback<F, Fut>(f: F) -> RefreshCallback
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

struct Inner {
    state: CountdownState,
    duration: NonZeroU32,

    /// Current callback slot; read when the countdown fires, not when armed
    callback: RefreshCallback,

    timer: Option<JoinHandle<()>>,
    epoch: u64,
    closed: bool,
    state_tx: watch::Sender<CountdownState>,
    live_timers: Arc<AtomicUsize>,
    completed_cycles: Arc<AtomicU64>,
}

impl Inner {
    fn publish(&self) {
        self.state_tx.send_replace(self.state);
    }

    fn cancel_all(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }
}

fn lock(shared: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counts live timer tasks; dropped with the task's future, aborted or not
struct TimerGuard(Arc<AtomicUsize>);

impl TimerGuard {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Repeating refresh countdown with pause/resume/reset controls
///
/// All methods must be called from within a Tokio runtime. Dropping the
/// controller cancels its timer; a refresh already in flight still runs to
/// completion but no further cycle is started.
pub struct CountdownController {
    shared: Arc<Mutex<Inner>>,
}

impl CountdownController {
    /// Create the countdown and start the first cycle immediately
    pub fn new(duration: NonZeroU32, on_finish: RefreshCallback) -> Self {
        let state = CountdownState::new(duration.get());
        let (state_tx, _) = watch::channel(state);

        let shared = Arc::new(Mutex::new(Inner {
            state,
            duration,
            callback: on_finish,
            timer: None,
            epoch: 0,
            closed: false,
            state_tx,
            live_timers: Arc::new(AtomicUsize::new(0)),
            completed_cycles: Arc::new(AtomicU64::new(0)),
        }));

        {
            let mut inner = lock(&shared);
            restart(&shared, &mut inner);
        }

        info!(duration_secs = duration.get(), "Countdown started");
        Self { shared }
    }

    /// Re-initialize with a new duration and callback and start counting
    ///
    /// While a refresh is in flight the new configuration is stored and
    /// takes effect when that refresh settles.
    pub fn start(&self, duration: NonZeroU32, on_finish: RefreshCallback) {
        let mut inner = lock(&self.shared);
        inner.duration = duration;
        inner.callback = on_finish;
        self.restart_unless_executing(&mut inner, "start");
    }

    /// Start over from the full duration with the current callback
    pub fn reset(&self) {
        let mut inner = lock(&self.shared);
        self.restart_unless_executing(&mut inner, "reset");
    }

    /// Change the countdown length and start over
    pub fn reconfigure(&self, duration: NonZeroU32) {
        let mut inner = lock(&self.shared);
        inner.duration = duration;
        self.restart_unless_executing(&mut inner, "reconfigure");
    }

    /// Replace the callback invoked on the next refresh
    pub fn set_callback(&self, on_finish: RefreshCallback) {
        lock(&self.shared).callback = on_finish;
    }

    /// Suspend the countdown, freezing the remaining ticks
    ///
    /// No-op unless the countdown is running. An in-flight refresh is never
    /// affected.
    pub fn pause(&self) {
        let mut inner = lock(&self.shared);
        if inner.closed || inner.state.phase != CountdownPhase::Running {
            debug!(phase = ?inner.state.phase, "Pause ignored");
            return;
        }

        inner.cancel_all();
        inner.state.phase = CountdownPhase::Paused;
        inner.publish();
        debug!(remaining = inner.state.remaining_ticks, "Countdown paused");
    }

    /// Continue counting down from the frozen remaining ticks
    ///
    /// No-op unless the countdown is paused.
    pub fn resume(&self) {
        let mut inner = lock(&self.shared);
        if inner.closed || inner.state.phase != CountdownPhase::Paused {
            debug!(phase = ?inner.state.phase, "Resume ignored");
            return;
        }

        inner.state.phase = CountdownPhase::Running;
        arm(&self.shared, &mut inner);
        inner.publish();
        debug!(remaining = inner.state.remaining_ticks, "Countdown resumed");
    }

    /// Stop the countdown for good
    pub fn shutdown(&self) {
        let mut inner = lock(&self.shared);
        if inner.closed {
            return;
        }

        inner.closed = true;
        inner.cancel_all();
        if inner.state.phase == CountdownPhase::Running {
            inner.state.phase = CountdownPhase::Paused;
        }
        inner.publish();
        info!("Countdown stopped");
    }

    pub fn state(&self) -> CountdownState {
        lock(&self.shared).state
    }

    /// Watch every tick and phase transition
    pub fn subscribe(&self) -> watch::Receiver<CountdownState> {
        lock(&self.shared).state_tx.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.shared).closed
    }

    /// Whether a timer handle is currently held (iff running)
    pub fn has_timer(&self) -> bool {
        lock(&self.shared).timer.is_some()
    }

    /// Number of timer tasks still alive, including ones being torn down
    pub fn live_timers(&self) -> usize {
        lock(&self.shared).live_timers.load(Ordering::SeqCst)
    }

    /// Number of refresh callbacks that have settled
    pub fn completed_cycles(&self) -> u64 {
        lock(&self.shared).completed_cycles.load(Ordering::SeqCst)
    }

    fn restart_unless_executing(&self, inner: &mut Inner, op: &'static str) {
        if inner.closed {
            debug!(op, "Countdown closed, ignoring");
            return;
        }
        if inner.state.phase == CountdownPhase::Executing {
            debug!(op, "Refresh in flight, countdown restarts when it settles");
            return;
        }
        restart(&self.shared, inner);
    }
}

impl Drop for CountdownController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for CountdownController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountdownController")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Begin a fresh cycle from the configured duration
fn restart(shared: &Arc<Mutex<Inner>>, inner: &mut Inner) {
    inner.state = CountdownState::new(inner.duration.get());
    arm(shared, inner);
    inner.publish();
}

/// Replace whatever timer exists with a new one for the current epoch
fn arm(shared: &Arc<Mutex<Inner>>, inner: &mut Inner) {
    inner.cancel_all();
    let guard = TimerGuard::new(&inner.live_timers);
    let task = run_timer(Arc::downgrade(shared), inner.epoch, guard);
    inner.timer = Some(tokio::spawn(task));
}

/// Run `f` against the state if the controller is alive and `epoch` is current
fn with_current<R>(
    shared: &Weak<Mutex<Inner>>,
    epoch: u64,
    f: impl FnOnce(&mut Inner) -> R,
) -> Option<R> {
    let shared = shared.upgrade()?;
    let mut inner = lock(&shared);
    if inner.epoch != epoch {
        return None;
    }
    Some(f(&mut inner))
}

async fn run_timer(shared: Weak<Mutex<Inner>>, epoch: u64, guard: TimerGuard) {
    let mut ticker = interval_at(Instant::now() + TICK, TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let Some(mut remaining) = with_current(&shared, epoch, |inner| inner.state.remaining_ticks)
    else {
        return;
    };

    while remaining > 0 {
        ticker.tick().await;
        let Some(next) = with_current(&shared, epoch, |inner| {
            inner.state.remaining_ticks = inner.state.remaining_ticks.saturating_sub(1);
            inner.publish();
            inner.state.remaining_ticks
        }) else {
            return;
        };
        debug!(remaining = next, "Countdown tick");
        remaining = next;
    }

    sleep(DISPLAY_DELAY).await;

    let Some(callback) = with_current(&shared, epoch, |inner| {
        // Detach: from here on cancel_all must not abort this task.
        drop(inner.timer.take());
        inner.state.phase = CountdownPhase::Executing;
        inner.publish();
        Arc::clone(&inner.callback)
    }) else {
        return;
    };
    drop(guard);

    execute(shared, callback).await;
}

async fn execute(shared: Weak<Mutex<Inner>>, callback: RefreshCallback) {
    let started = Instant::now();
    let outcome = AssertUnwindSafe(async move { callback().await })
        .catch_unwind()
        .await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(Ok(())) => debug!(elapsed_ms, "Refresh callback settled"),
        Ok(Err(e)) => warn!(elapsed_ms, error = %e, "Refresh callback failed"),
        Err(panic) => error!(
            elapsed_ms,
            panic = panic_message(panic.as_ref()),
            "Refresh callback panicked"
        ),
    }

    let Some(shared) = shared.upgrade() else {
        return;
    };
    let mut inner = lock(&shared);
    inner.completed_cycles.fetch_add(1, Ordering::SeqCst);

    if inner.closed {
        inner.state.phase = CountdownPhase::Paused;
        inner.publish();
        return;
    }
    restart(&shared, &mut inner);
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
