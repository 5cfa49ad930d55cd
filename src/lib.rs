// Library exports for orderbook-viewer

pub mod error;

// Binance REST integration
pub mod binance; // Binance API client
pub mod config; // Configuration management

pub mod countdown; // Refresh countdown controller
pub mod orderbook; // Snapshots, spread and viewing session
pub mod render; // Terminal rendering helpers
