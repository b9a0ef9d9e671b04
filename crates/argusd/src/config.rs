//! Configuration management for argusd.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use argus_common::constants::{
    BROADCAST_INTERVAL_SECS, DEFAULT_DEVICE_DIR, DEFAULT_SESSION_SOURCE, DEFAULT_SPOOL_DIR,
    STATUS_SERVICE,
};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Spool directory receiving one status file per remote host
    #[serde(default = "default_spool_dir")]
    pub spool_dir: String,

    /// Login session database scanned each broadcast tick (utmp format)
    #[serde(default = "default_session_source")]
    pub session_source: String,

    /// Directory holding terminal device nodes, for idle measurement
    #[serde(default = "default_device_dir")]
    pub device_dir: String,

    /// Service name resolved against /etc/services at startup
    #[serde(default = "default_service")]
    pub service: String,

    /// Explicit status port, bypassing service resolution
    #[serde(default)]
    pub port: Option<u16>,

    /// Address the UDP socket binds to (port appended at bind time)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Seconds between status broadcasts
    #[serde(default = "default_broadcast_interval")]
    pub broadcast_interval_secs: u64,
}

// Default value functions
fn default_spool_dir() -> String { DEFAULT_SPOOL_DIR.to_string() }
fn default_session_source() -> String { DEFAULT_SESSION_SOURCE.to_string() }
fn default_device_dir() -> String { DEFAULT_DEVICE_DIR.to_string() }
fn default_service() -> String { STATUS_SERVICE.to_string() }
fn default_bind_addr() -> String { "0.0.0.0".to_string() }
fn default_broadcast_interval() -> u64 { BROADCAST_INTERVAL_SECS }

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(config_path))
                .build()
                .context("Failed to load config file")?;

            settings
                .try_deserialize()
                .context("Failed to parse config")?
        } else {
            // Use defaults if config file doesn't exist
            tracing::warn!("Config file not found, using defaults");
            Self::default()
        };

        // Apply CLI overrides
        if let Some(port) = args.port {
            config.port = Some(port);
        }
        if let Some(ref spool_dir) = args.spool_dir {
            config.spool_dir = spool_dir.clone();
        }

        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            spool_dir: default_spool_dir(),
            session_source: default_session_source(),
            device_dir: default_device_dir(),
            service: default_service(),
            port: None,
            bind_addr: default_bind_addr(),
            broadcast_interval_secs: default_broadcast_interval(),
        }
    }
}
