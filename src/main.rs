//! # CPE Monitor Main Application Entry Point
//!
//! This is the main executable for the CPE monitor. It handles command-line
//! argument parsing, tracing initialization, configuration loading, server
//! startup and shutdown on Ctrl-C.
//!
//! The application can be launched with optional command-line arguments:
//!
//! - First argument: Path to configuration file (defaults to "config.json5")
//! - Second argument: Port number, overriding `listen_port` from the file
//!
//! ## Example Usage
//!
//! ```bash
//! # Run with the default configuration file
//! cargo run
//!
//! # Run with a specific configuration file
//! cargo run router.json5
//!
//! # Run with a specific configuration file on port 8080
//! cargo run router.json5 8080
//! ```
//!
//! Log levels can be controlled through the `RUST_LOG` environment variable.

use cpe_monitor::config::{Config, CONFIG_FILE};
use cpe_monitor::error::MonitorError;
use cpe_monitor::server;
use std::env;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Main entry point for the CPE monitor
///
/// # Errors
///
/// The function returns an error if:
/// - Configuration cannot be loaded or is invalid
/// - The server fails to start
/// - Any unrecoverable error occurs during execution
#[tokio::main]
async fn main() -> Result<(), MonitorError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_file_path = env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from);

    let mut config = Config::load(&config_file_path)?;

    if let Some(port) = env::args().nth(2) {
        config.listen_port = port
            .parse()
            .map_err(|_| MonitorError::Generic(format!("Invalid port: {port}")))?;
    }

    tracing::info!("Starting CPE monitor");
    tracing::debug!("Application initialized with tracing enabled");

    let cancel_token = CancellationToken::new();
    tokio::spawn({
        let cancel_token = cancel_token.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {e}");
                return;
            }
            tracing::info!("Shutdown signal received");
            cancel_token.cancel();
        }
    });

    server::run(config, cancel_token).await?;

    tracing::info!("CPE monitor shutting down");
    Ok(())
}
