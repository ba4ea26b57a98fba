//! Trust gateway server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request-id ─▶ trace ─▶ cors ─▶ body limit ─▶ timeout
//!                                                                     │
//!                                                                     ▼
//!                      ┌──────────────── SecurityGateway ────────────────┐
//!                      │ block list ─▶ burst ─▶ window limiter ─▶ bot    │
//!                      └───────────────────────┬─────────────────────────┘
//!                                              │ allowed
//!                                              ▼
//!                      public handlers │ admin handlers (session token)
//!                                              │
//!     Client Response                          ▼
//!     ◀────────────── audit record ─▶ ring buffer + append-only log
//!
//!     analytics events ─▶ AnalyticsStore (JSON document, daily buckets)
//!     sweeper ─▶ expiry of blocks, windows, challenges; daily retention
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use trust_gateway::clock::SystemClock;
use trust_gateway::config::load_config;
use trust_gateway::http::HttpServer;
use trust_gateway::lifecycle::{build_state, run_sweeper, signals, Shutdown, StartupError};
use trust_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "trust-gateway", version, about = "Request-trust gateway")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "CONFIG_FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref()).map_err(StartupError::from)?;

    logging::init_logging(config.observability.log_format);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "trust-gateway starting");
    tracing::info!(
        bind_address = %config.server.bind_address,
        data_dir = ?config.data_dir,
        window_ms = config.rate_limit.window_ms,
        max_requests = config.rate_limit.max_requests,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.server.bind_address.clone();
    let sweep_interval = std::time::Duration::from_secs(config.sweep_interval_secs);
    let state = build_state(config, Arc::new(SystemClock)).await?;

    let listener = TcpListener::bind(&bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: bind_address.clone(),
            source,
        })?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let sweeper = tokio::spawn(run_sweeper(
        state.clone(),
        sweep_interval,
        shutdown.subscribe(),
    ));
    let server = tokio::spawn(HttpServer::new(state).run(listener, shutdown.subscribe()));

    signals::wait_for_signal().await;
    shutdown.trigger();

    server.await??;
    let _ = sweeper.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
