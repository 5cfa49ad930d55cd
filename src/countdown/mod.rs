//! Refresh Countdown
//!
//! Repeating countdown that drives periodic order book refreshes.

pub mod controller;
pub mod types;

pub use controller::{refresh_callback, CountdownController, RefreshCallback, RefreshFuture};
pub use types::{CountdownPhase, CountdownState, DEFAULT_LOADING_LABEL};
