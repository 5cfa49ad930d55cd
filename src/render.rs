//! Text rendering for the terminal viewer
//!
//! Builds markdown-style tables for both sides of the book plus the spread,
//! countdown and response-time labels.

use crate::countdown::{CountdownState, DEFAULT_LOADING_LABEL};
use crate::orderbook::{FetchSession, PriceLevel, SpreadIndicator};

/// Decimals shown for prices in the book tables
const PRICE_DECIMALS: usize = 2;

/// Decimals shown for quantities in the book tables
const QUANTITY_DECIMALS: usize = 6;

/// Build a markdown table from headers and rows
pub fn build_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut table = String::new();

    table.push_str("| ");
    table.push_str(&headers.join(" | "));
    table.push_str(" |\n");

    table.push('|');
    for _ in headers {
        table.push_str("--------|");
    }
    table.push('\n');

    for row in rows {
        table.push_str("| ");
        table.push_str(&row.join(" | "));
        table.push_str(" |\n");
    }

    table
}

/// Format a decimal string with fixed precision; unparsable input is returned as-is
pub fn format_fixed(value: &str, decimals: usize) -> String {
    match value.parse::<f64>() {
        Ok(v) => format!("{:.prec$}", v, prec = decimals),
        Err(_) => value.to_string(),
    }
}

pub fn format_price(price: &str) -> String {
    format_fixed(price, PRICE_DECIMALS)
}

pub fn format_quantity(quantity: &str) -> String {
    format_fixed(quantity, QUANTITY_DECIMALS)
}

pub fn response_time_label(response_time_ms: u64) -> String {
    format!("{}ms", response_time_ms)
}

/// `"2s [33%]"` while counting, the loading label while refreshing
pub fn countdown_label(state: &CountdownState, loading_label: &str) -> String {
    format!("{} [{:.0}%]", state.label(loading_label), state.progress())
}

/// Price/quantity table for one side of the book
pub fn render_side(title: &str, levels: &[PriceLevel]) -> String {
    let rows: Vec<Vec<String>> = levels
        .iter()
        .map(|level| vec![format_price(&level.price), format_quantity(&level.quantity)])
        .collect();

    let mut out = format!("{} ({} levels)\n", title, levels.len());
    if rows.is_empty() {
        out.push_str("(empty)\n");
    } else {
        out.push_str(&build_table(&["Price", "Quantity"], &rows));
    }
    out
}

pub fn render_spread(spread: &SpreadIndicator) -> String {
    let rows = vec![
        vec!["Spread".to_string(), spread.spread_absolute.to_string()],
        vec!["Spread %".to_string(), format!("{:.4}%", spread.spread_percent)],
        vec!["Mid price".to_string(), spread.mid_price.to_string()],
        vec!["Best bid".to_string(), spread.best_bid.to_string()],
        vec!["Best ask".to_string(), spread.best_ask.to_string()],
    ];

    format!(
        "Spread indicator: {}\n{}",
        spread.liquidity,
        build_table(&["Metric", "Value"], &rows)
    )
}

/// Full screen for the current session state
pub fn render_session(view: &FetchSession, countdown: Option<&CountdownState>) -> String {
    let Some(symbol) = view.selected_symbol.as_deref() else {
        return "No symbol selected. Use `s <SYMBOL>` to pick one.\n".to_string();
    };

    let mut out = format!("== {} | depth {} ==\n", symbol, view.depth_limit);

    let mut status = Vec::new();
    if let Some(state) = countdown {
        status.push(format!("next refresh {}", countdown_label(state, DEFAULT_LOADING_LABEL)));
    }
    if let Some(ms) = view.response_time_ms {
        status.push(format!("response {}", response_time_label(ms)));
    }
    if view.is_refetching {
        status.push("updating".to_string());
    }
    if !status.is_empty() {
        out.push_str(&status.join(" | "));
        out.push('\n');
    }
    out.push('\n');

    let Some(snapshot) = view.latest_snapshot.as_deref() else {
        out.push_str(if view.is_initial_load {
            "Loading order book...\n"
        } else {
            "No order book data.\n"
        });
        return out;
    };

    if snapshot.symbol != symbol {
        out.push_str(&format!("Showing last {} book until {} loads\n\n", snapshot.symbol, symbol));
    }
    if let Some(spread) = &view.spread {
        out.push_str(&render_spread(spread));
        out.push('\n');
    }
    out.push_str(&render_side("Bids", &snapshot.bids));
    out.push('\n');
    out.push_str(&render_side("Asks", &snapshot.asks));
    out
}
