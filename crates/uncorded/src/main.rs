//! # Uncorded node
//!
//! Serves local collections over HTTP, streams snapshots to subscribed
//! peers and merges what discovered peers stream back.
//!
//! ## Architecture
//! ```text
//! Discovery ──► Coordinator ──► peer streams ──► merge
//!                                                  │
//! HTTP clients ──► /sets/{name}/items ──► SetRegistry ──► /sets/{a,b} subscribers
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use uncorded::config::AppConfig;
use uncorded::discovery::{self, ClusterDiscovery};
use uncorded::replication::gc_worker;
use uncorded::routes;
use uncorded::state::AppState;

/// Uncorded - coordination-free replicated document sets
#[derive(Parser, Debug)]
#[command(name = "uncorded")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/uncorded.toml", env = "UNCORDED_CONFIG")]
    config: String,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level, args.json_logs)?;

    info!("Starting Uncorded v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(&args.config, args.listen.as_deref())?;
    info!(path = %args.config, "Configuration loaded");

    let client = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;

    // Misconfigured discovery aborts before anything serves
    let discovery = ClusterDiscovery::from_config(&config, client.clone())
        .context("Invalid discovery configuration")?;

    let state = AppState::new(config.clone(), client)?;
    info!(collections = ?state.registry.names(), "Collections ready");

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    tokio::spawn(gc_worker(
        state.registry.clone(),
        config.gc_interval(),
        shutdown_tx.subscribe(),
    ));

    let discovery_task = tokio::spawn(discovery::drive(
        discovery,
        state.coordinator.clone(),
        shutdown_tx.subscribe(),
    ));

    let coordinator = state.coordinator.clone();
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "Uncorded listening");

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    if let Err(e) = discovery_task.await {
        tracing::warn!(error = %e, "Discovery task ended abnormally");
    }
    coordinator.stop().await;

    info!("Uncorded shutdown complete");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
            .context("Failed to initialize logging")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init()
            .context("Failed to initialize logging")?;
    }

    Ok(())
}
