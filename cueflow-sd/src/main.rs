//! Schedule Daemon (cueflow-sd) - Main entry point
//!
//! Runs the schedule HTTP API and the background pre-playback scanner.
//! Multiple instances may point at the same database; the per-entry
//! claim update keeps notifications at-most-once across all of them.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cueflow_common::config::Config;
use cueflow_common::db::init_database;
use cueflow_common::events::EventBus;
use cueflow_sd::scanner::{ScanConfig, ScanService};
use cueflow_sd::sink::{HttpNotificationSink, NotificationSink, NullNotificationSink};
use cueflow_sd::{build_router, AppContext};

/// Command-line arguments for cueflow-sd
#[derive(Parser, Debug)]
#[command(name = "cueflow-sd")]
#[command(about = "Schedule daemon for cueflow")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database path (overrides config file)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// TOML config file path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cueflow_sd=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting cueflow Schedule Daemon (cueflow-sd) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    // Parse command-line arguments and resolve configuration
    let args = Args::parse();
    let config = Config::resolve(args.port, args.database, args.config)
        .context("Failed to resolve configuration")?;

    info!("Database path: {}", config.database_path.display());
    let db_pool = init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let event_bus = EventBus::new(1000);

    // Notification sink: HTTP when an endpoint is configured, otherwise
    // a null sink (claims still advance, payloads are dropped)
    let sink: Arc<dyn NotificationSink> = match &config.sink_endpoint {
        Some(endpoint) => {
            info!(
                "Publishing pre-playback events to {} (exchange={}, routing_key={})",
                endpoint, config.sink_exchange, config.sink_routing_key
            );
            Arc::new(
                HttpNotificationSink::new(
                    endpoint.clone(),
                    config.sink_exchange.clone(),
                    config.sink_routing_key.clone(),
                )
                .context("Failed to build notification sink")?,
            )
        }
        None => {
            info!("No sink endpoint configured; pre-playback events will not leave the process");
            Arc::new(NullNotificationSink)
        }
    };

    // Start the background scanner
    let scan_service = Arc::new(ScanService::new(
        ScanConfig::from(&config),
        db_pool.clone(),
        Arc::clone(&sink),
        event_bus.clone(),
    ));
    let scan_status = scan_service.status();
    scan_service.run();

    // Build the application router
    let ctx = AppContext {
        db_pool,
        event_bus,
        sink,
        scan_status,
        poll_rate_ms: config.poll_rate_ms,
    };
    let app = build_router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
