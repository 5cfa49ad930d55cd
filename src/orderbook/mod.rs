//! Order book viewing
//!
//! Depth snapshots, the derived spread indicator, and the session that keeps
//! a selected symbol's book fresh:
//! - [`MarketDataSource`] abstracts where snapshots and symbols come from
//! - [`OrderBookSession`] owns selection, depth limit and the latest snapshot
//! - [`SpreadIndicator`] summarizes the top of the book

pub mod session;
pub mod source;
pub mod spread;
pub mod types;

pub use session::{FetchSession, OrderBookSession, SessionConfig, SessionEvent};
pub use source::{MarketDataSource, SymbolListing};
pub use spread::{Liquidity, SpreadIndicator};
pub use types::{DepthLimit, InvalidDepthLimit, OrderBookSnapshot, PriceLevel, DEPTH_LIMITS};
