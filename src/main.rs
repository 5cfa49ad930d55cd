use anyhow::Context;
use orderbook_viewer::binance::BinanceClient;
use orderbook_viewer::config::ViewerConfig;
use orderbook_viewer::orderbook::{DepthLimit, OrderBookSession, SessionConfig, SessionEvent};
use orderbook_viewer::render;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};

/// Maximum symbols listed by the `?` search command
const SEARCH_RESULTS: usize = 20;

type Session = OrderBookSession<BinanceClient>;

/// Command-line overrides on top of the environment configuration
#[derive(Debug, Default)]
struct CliArgs {
    symbol: Option<String>,
    limit: Option<u32>,
    refresh: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let cli = parse_args(&args);

    // stdout is reserved for the book display
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut config = ViewerConfig::from_env().context("Failed to load configuration")?;
    if let Some(limit) = cli.limit {
        config.depth_limit = DepthLimit::try_from(limit)?;
    }
    if let Some(refresh) = cli.refresh {
        config.refresh_secs =
            NonZeroU32::new(refresh).context("--refresh must be greater than zero")?;
    }

    tracing::info!(
        base_url = %config.base_url,
        refresh_secs = config.refresh_secs.get(),
        limit = %config.depth_limit,
        "Starting order book viewer"
    );

    let client = Arc::new(BinanceClient::from_config(&config)?);
    let session = OrderBookSession::new(client, SessionConfig::from(&config));

    // Subscribe first so the catalog and initial load are reported
    let events = session.subscribe();

    if let Err(e) = session.load_symbols().await {
        tracing::warn!("Symbol catalog unavailable, selections are not validated: {}", e);
    }

    if let Some(symbol) = cli.symbol {
        if let Err(e) = session.select_symbol(&symbol).await {
            tracing::error!("Failed to load {}: {}", symbol, e);
        }
    }
    if session.view().await.selected_symbol.is_none() {
        redraw(&session).await;
    }

    let result = run(session.clone(), events).await;
    session.shutdown();
    tracing::info!("Viewer stopped");
    result
}

/// Process session events and stdin commands until quit or Ctrl+C
async fn run(
    session: Arc<Session>,
    mut events: broadcast::Receiver<SessionEvent>,
) -> anyhow::Result<()> {
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let mut shutdown_rx = shutdown_tx.subscribe();

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received shutdown signal (Ctrl+C)");
                let _ = signal_tx.send(());
            }
            Err(err) => {
                tracing::error!("Failed to listen for shutdown signal: {}", err);
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SessionEvent::SnapshotUpdated { .. }) => redraw(&session).await,
                Ok(SessionEvent::FetchFailed { symbol, message }) => {
                    println!("! Failed to update {}: {}", symbol, message);
                }
                Ok(SessionEvent::SymbolsLoaded { count, response_time_ms }) => {
                    println!(
                        "{} symbols available ({})",
                        count,
                        render::response_time_label(response_time_ms)
                    );
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Display lagging behind session events");
                }
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if !handle_command(&session, line.trim()).await {
                        let _ = shutdown_tx.send(());
                    }
                }
                Ok(None) => {
                    tracing::debug!("stdin closed, commands disabled");
                    stdin_open = false;
                }
                Err(e) => {
                    tracing::warn!("Failed to read command: {}", e);
                    stdin_open = false;
                }
            },
            _ = shutdown_rx.recv() => {
                tracing::info!("Shutting down viewer...");
                break;
            }
        }
    }

    Ok(())
}

/// Run one stdin command; returns false when the user asked to quit
///
/// Fetching commands run on their own task so events keep flowing.
async fn handle_command(session: &Arc<Session>, line: &str) -> bool {
    let (command, arg) = match line.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, arg.trim()),
        None => (line, ""),
    };

    match command {
        "" => {}
        "q" | "quit" => return false,
        "s" if !arg.is_empty() => {
            let session = session.clone();
            let symbol = arg.to_string();
            tokio::spawn(async move {
                if let Err(e) = session.select_symbol(&symbol).await {
                    println!("! {}", e);
                }
            });
        }
        "l" => match arg.parse::<u32>().map(DepthLimit::try_from) {
            Ok(Ok(limit)) => {
                let session = session.clone();
                tokio::spawn(async move {
                    if let Err(e) = session.change_limit(limit).await {
                        println!("! {}", e);
                    }
                });
            }
            Ok(Err(e)) => println!("! {}", e),
            Err(_) => println!("! Usage: l <10|20|...|100>"),
        },
        "?" => {
            // Browsing the catalog counts as selector interaction
            session.pause_countdown();
            let matches = session.search_symbols(arg, SEARCH_RESULTS).await;
            if matches.is_empty() {
                println!("No symbols match '{}'", arg);
            }
            for listing in matches {
                if listing.is_tradable() {
                    println!("  {:<14} {}", listing.symbol, listing.base_asset);
                } else {
                    println!("  {:<14} {:<8} ({})", listing.symbol, listing.base_asset, listing.status);
                }
            }
            println!("Countdown paused; `s <SYMBOL>` to select, `r` to resume");
        }
        "p" => {
            session.pause_countdown();
            redraw(session).await;
        }
        "r" => {
            session.resume_countdown();
            redraw(session).await;
        }
        "f" => {
            let session = session.clone();
            tokio::spawn(async move {
                if let Err(e) = session.refresh().await {
                    println!("! {}", e);
                }
            });
        }
        "h" | "help" => print_commands(),
        _ => {
            println!("Unknown command: {}", line);
            print_commands();
        }
    }
    true
}

async fn redraw(session: &Session) {
    let view = session.view().await;
    let countdown = session.countdown_state();
    println!("{}", render::render_session(&view, countdown.as_ref()));
}

/// Parse command-line arguments
fn parse_args(args: &[String]) -> CliArgs {
    let mut cli = CliArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--symbol" => {
                if i + 1 < args.len() {
                    cli.symbol = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--limit" => {
                if i + 1 < args.len() {
                    cli.limit = Some(parse_number("--limit", &args[i + 1]));
                    i += 1;
                }
            }
            "--refresh" => {
                if i + 1 < args.len() {
                    cli.refresh = Some(parse_number("--refresh", &args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn parse_number(flag: &str, value: &str) -> u32 {
    match value.parse() {
        Ok(n) => n,
        Err(_) => {
            eprintln!("Invalid value for {}: {}", flag, value);
            print_usage();
            std::process::exit(1);
        }
    }
}

/// Print usage information
fn print_usage() {
    println!("Order Book Viewer - live Binance order book depth in the terminal");
    println!();
    println!("USAGE:");
    println!("    orderbook-viewer [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --symbol <SYMBOL>   Symbol to show on start (e.g. BTCUSDT)");
    println!("    --limit <N>         Depth per side: 10, 20, ..., 100 (default: 10)");
    println!("    --refresh <SECS>    Seconds between automatic refreshes (default: 3)");
    println!("    --help, -h          Print this help message");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("    BINANCE_BASE_URL            Binance API base URL (default: https://api.binance.com)");
    println!("    VIEWER_REFRESH_SECS         Refresh countdown length (default: 3)");
    println!("    VIEWER_DEPTH_LIMIT          Initial depth limit (default: 10)");
    println!("    VIEWER_HTTP_TIMEOUT_SECS    Request timeout (default: 10)");
    println!("    VIEWER_REQUESTS_PER_MINUTE  Client-side rate limit (default: 1000)");
    println!("    VIEWER_FETCH_ORDERING       last-settled or latest-issued (default: last-settled)");
    println!("    RUST_LOG                    Logging level (default: info)");
    println!();
    print_commands();
}

fn print_commands() {
    println!("COMMANDS:");
    println!("    s <SYMBOL>   Select a symbol");
    println!("    ? <QUERY>    Search symbols (pauses the countdown)");
    println!("    l <N>        Change depth limit");
    println!("    p / r        Pause / resume the refresh countdown");
    println!("    f            Refresh now");
    println!("    q            Quit");
}
