//! Director Server - standalone headless binary for the live auto-director.
//!
//! Wires a camera room, the director-core pipeline, and the control API
//! into one process, then runs until asked to shut down.

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use director_core::ingress::MockMediaRoom;
use director_core::services::SilentToneBackend;
use director_core::{bootstrap, start_server, AppState};
use tokio::signal;

use crate::config::ServerConfig;

/// Director Server - headless multi-camera auto-director.
#[derive(Parser, Debug)]
#[command(name = "director-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "DIRECTOR_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind host (overrides config file).
    #[arg(long, env = "DIRECTOR_BIND_HOST")]
    bind_host: Option<std::net::IpAddr>,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long, env = "DIRECTOR_BIND_PORT")]
    port: Option<u16>,

    /// Narration keywords, comma-separated (overrides config file).
    #[arg(short = 'k', long, value_delimiter = ',', env = "DIRECTOR_KEYWORDS")]
    keywords: Option<Vec<String>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("director-server v{}", env!("CARGO_PKG_VERSION"));

    let mut config =
        ServerConfig::load(args.config.as_deref()).context("failed to load configuration")?;

    if let Some(host) = args.bind_host {
        config.bind_host = host;
    }
    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if let Some(keywords) = args.keywords {
        config.keywords = keywords;
    }

    log::info!(
        "configuration: bind={}, analysis_rate_hz={}, decision_rate_hz={}",
        config.bind_addr(),
        config.core.analysis_rate_hz,
        config.core.decision_rate_hz,
    );

    // No concrete SFU/room transport exists in this codebase yet; the
    // reference room generates synthetic observations so the pipeline and
    // control API can run end to end without external media infrastructure.
    let room = MockMediaRoom::new();

    let services = bootstrap(
        room,
        config.core.clone(),
        Arc::new(SilentToneBackend),
        config.keywords.clone(),
    )
    .await
    .context("failed to bootstrap director services")?;

    let services = Arc::new(services);
    services.start();
    log::info!("director pipeline started");

    let app_state = AppState::builder().services(Arc::clone(&services)).build();
    let bind_addr = config.bind_addr();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(app_state, bind_addr).await {
            log::error!("control API error: {e}");
        }
    });

    log::info!("control API started on {bind_addr}");

    shutdown_signal().await;
    log::info!("shutdown signal received, draining...");

    services.shutdown().await;

    let grace = Duration::from_secs(config.shutdown_grace_sec);
    let abort_handle = server_handle.abort_handle();
    if tokio::time::timeout(grace, server_handle).await.is_err() {
        log::warn!("control API did not stop within {grace:?}, forcing termination");
        abort_handle.abort();
    }

    log::info!("shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
