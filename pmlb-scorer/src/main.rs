//! pmlb-scorer - photo scoring and leaderboard service
//!
//! **Module Identity:**
//! - Name: pmlb-scorer
//! - Default port: 5730
//!
//! Annotates submitted photos with a vision model, scores the annotation
//! against a fixed keyword lexicon and serves the resulting leaderboard.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pmlb_common::config;
use pmlb_scorer::services::UpstreamAnnotationClient;
use pmlb_scorer::AppState;

/// Command-line arguments for pmlb-scorer
#[derive(Parser, Debug)]
#[command(name = "pmlb-scorer")]
#[command(about = "Photo annotation, scoring and leaderboard service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5730", env = "PMLB_PORT")]
    port: u16,

    /// Address to bind
    #[arg(short, long, default_value = "127.0.0.1", env = "PMLB_BIND")]
    bind: IpAddr,

    /// Root folder holding pmlb.db (overrides PMLB_ROOT_FOLDER and the config file)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// TOML config file (default: ~/.config/pmlb/config.toml)
    #[arg(short, long, env = "PMLB_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = config::load_toml_config(args.config.as_deref())
        .context("Failed to load configuration")?;

    // Initialize tracing; RUST_LOG overrides the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting pmlb-scorer on port {}", args.port);
    info!(
        "Version: {} ({}, {} build, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );

    // Root folder and database
    let root_folder = config::resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    let db_path = config::prepare_root_folder(&root_folder)
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;
    info!("Database: {}", db_path.display());

    let db_pool = pmlb_scorer::db::init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;
    info!("Database connection established");

    // Vision model client; a missing key leaves the service up but degraded
    let annotator = match UpstreamAnnotationClient::from_settings(
        &toml_config.upstream,
        config::resolve_api_key(&toml_config),
    ) {
        Ok(client) => Some(client),
        Err(e) => {
            warn!("Annotation disabled: {}", e);
            None
        }
    };

    let state = AppState::new(db_pool, annotator);
    let shutdown = state.shutdown.clone();
    let app = pmlb_scorer::build_router(state);

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Abort in-flight upstream calls and backoff sleeps
            shutdown.cancel();
        })
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
