//! Configuration management for procpeek
//!
//! This module defines the main `Config` struct and its sub-structs. It uses
//! the `figment` crate to layer built-in defaults, an optional TOML file,
//! `PROCPEEK_`-prefixed environment variables and command-line arguments.

use crate::cli::Cli;
use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Sampling interval in seconds. Also the CPU measurement window.
    pub interval_seconds: f64,
    /// Names of the processes to track.
    #[serde(default)]
    pub processes: Vec<String>,
    /// Path of the append-only sample log.
    pub log_path: PathBuf,
    #[serde(default)]
    pub persister: PersisterConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Configuration for the log persister.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PersisterConfig {
    /// Upper bound on how long the persister waits on an empty queue before
    /// re-checking the shutdown flag.
    pub poll_interval_ms: u64,
}

impl Default for PersisterConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
        }
    }
}

/// Configuration for the Prometheus metrics endpoint.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_address: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_address: SocketAddr::from(([127, 0, 0, 1], 9184)),
        }
    }
}

impl Config {
    /// Loads the configuration by layering defaults, the TOML file named by
    /// `--config` (if any), environment variables and CLI arguments.
    ///
    /// Process names are not required here; call [`Config::validate`] once
    /// the final list is known.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = &cli.config {
            if !path.exists() {
                bail!("configuration file not found: {}", path.display());
            }
            figment = figment.merge(Toml::file(path));
        }
        let config: Config = figment
            // e.g. PROCPEEK_INTERVAL_SECONDS=2 or PROCPEEK_METRICS__ENABLED=true
            .merge(Env::prefixed("PROCPEEK_").split("__"))
            .merge(cli)
            .extract()?;
        Ok(config)
    }

    /// Normalizes the tracked names and checks every setting.
    ///
    /// Names are trimmed and lowercased; blanks and duplicates are dropped.
    pub fn validate(&mut self) -> Result<()> {
        self.processes = normalize_process_names(self.processes.iter().map(String::as_str));
        if self.processes.is_empty() {
            bail!("no process names to track were given");
        }
        if self.interval_seconds <= 0.0
            || Duration::try_from_secs_f64(self.interval_seconds).is_err()
        {
            bail!(
                "interval_seconds must be a positive number of seconds, got {}",
                self.interval_seconds
            );
        }
        if self.persister.poll_interval_ms == 0 {
            bail!("persister.poll_interval_ms must be greater than zero");
        }
        Ok(())
    }

    /// The sampling interval as a `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.persister.poll_interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            interval_seconds: 5.0,
            processes: Vec::new(),
            log_path: PathBuf::from("process_info.csv"),
            persister: PersisterConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Trims, lowercases and de-duplicates process names, keeping first-seen order.
pub fn normalize_process_names<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for name in names {
        let name = name.trim().to_lowercase();
        if !name.is_empty() && !normalized.contains(&name) {
            normalized.push(name);
        }
    }
    normalized
}
