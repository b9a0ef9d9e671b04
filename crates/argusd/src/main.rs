//! # argusd - Argus status-exchange daemon
//!
//! Broadcasts this host's load and login sessions to every directly
//! reachable neighbor on a fixed cadence, and spools the latest status
//! heard from every other host on the same port.
//!
//! ## Architecture
//! ```text
//! timer → Broadcaster → UDP broadcast → neighbors
//! neighbors → UDP :who → Receiver → spool (argus.<host>)
//! ```

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::System;
use tokio::net::UdpSocket;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod broadcast;
mod collector;
mod config;
mod neighbors;
mod receiver;
mod services;
mod state;
mod store;

use argus_common::constants::STATUS_PROTO;
use argus_common::hostname_is_valid;
use argus_common::wire::HostStatus;

use collector::SessionCollector;
use config::AppConfig;
use state::DaemonState;
use store::PeerStore;

/// Argus status-exchange daemon
#[derive(Parser, Debug)]
#[command(name = "argusd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/argusd.toml")]
    config: String,

    /// Status port (overrides config and service lookup)
    #[arg(short, long, env = "ARGUS_PORT")]
    port: Option<u16>,

    /// Spool directory (overrides config)
    #[arg(long, env = "ARGUS_SPOOL_DIR")]
    spool_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;

    info!("🛰️ Starting argusd v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::load(&args.config, &args)?;
    info!("📋 Configuration loaded from {}", args.config);

    // The port everyone sends from and listens on.
    let port = match config.port {
        Some(port) => port,
        None => services::lookup(&config.service, STATUS_PROTO)
            .context("Status service lookup failed")?,
    };

    // Identity: short hostname, held to the same rules as inbound ones.
    let hostname = gethostname::gethostname();
    let hostname = hostname.to_string_lossy();
    let hostname = hostname.split('.').next().unwrap_or_default().to_string();
    if !hostname_is_valid(&hostname) {
        bail!("local hostname {hostname:?} cannot name a status record");
    }

    let boot_time = match u32::try_from(System::boot_time()) {
        Ok(t) if t > 0 => t,
        _ => bail!("cannot establish system boot time"),
    };

    let store = PeerStore::new(&config.spool_dir);
    store
        .ensure_dir()
        .with_context(|| format!("Failed to create spool directory {}", config.spool_dir))?;

    let socket = UdpSocket::bind(format!("{}:{}", config.bind_addr, port))
        .await
        .with_context(|| format!("Failed to bind status socket on port {port}"))?;
    socket
        .set_broadcast(true)
        .context("Failed to enable broadcast on status socket")?;
    let socket = Arc::new(socket);
    info!(host = %hostname, port, "🛰️ Status socket bound");

    let neighbors = neighbors::discover(Vec::new(), port).context("Link discovery failed")?;
    if neighbors.is_empty() {
        warn!("No usable links found; nothing to broadcast to until a refresh");
    }

    let collector = SessionCollector::new(&config.session_source, &config.device_dir);
    let state = DaemonState::new(HostStatus::new(hostname, boot_time), collector, neighbors);

    // Create shutdown broadcast channel
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    // SIGHUP asks the broadcaster to re-verify the boot time and pick up
    // links that appeared since startup.
    let (refresh_tx, refresh_rx) = tokio::sync::mpsc::channel::<()>(1);
    let mut hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            // A full queue means a refresh is already pending.
            let _ = refresh_tx.try_send(());
        }
    });

    // Handle graceful shutdown
    let shutdown_ctrl = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("🛑 Shutdown signal received");
        let _ = shutdown_ctrl.send(());
    });

    let mut receiver_task = tokio::spawn(receiver::run(
        socket.clone(),
        store,
        port,
        shutdown_tx.subscribe(),
    ));
    let mut broadcaster_task = tokio::spawn(broadcast::run(
        state,
        socket,
        PathBuf::from(&config.spool_dir),
        Duration::from_secs(config.broadcast_interval_secs),
        port,
        refresh_rx,
        shutdown_tx.subscribe(),
    ));

    // Run until shutdown or until either half stops, then bring the other
    // half down before surfacing the result.
    tokio::select! {
        res = &mut broadcaster_task => {
            let _ = shutdown_tx.send(());
            let receiver_res = receiver_task.await;
            res??;
            receiver_res??;
        }
        res = &mut receiver_task => {
            let _ = shutdown_tx.send(());
            let broadcaster_res = broadcaster_task.await;
            res??;
            broadcaster_res??;
        }
    }

    info!("👋 argusd shutdown complete");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}
