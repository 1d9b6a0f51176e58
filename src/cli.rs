//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are merged on top of the configuration file
//! and environment variables as the highest-priority `figment` provider.

use crate::config::normalize_process_names;
use clap::Parser;
use figment::{
    value::{Dict, Map, Tag, Value},
    Error, Metadata, Profile, Provider,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Samples CPU, memory and disk I/O of named processes into an append-only CSV log.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Interval between each survey in seconds.
    #[arg(short, long, value_name = "SECONDS")]
    pub interval: Option<f64>,

    /// Name of a process to track; repeat or separate with commas.
    #[arg(short, long = "process", value_name = "NAME", value_delimiter = ',')]
    pub processes: Vec<String>,

    /// Path of the CSV log to append samples to.
    #[arg(short = 'o', long, value_name = "FILE")]
    pub log_path: Option<PathBuf>,

    /// Logging level (e.g. info, debug).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Serve Prometheus metrics on this address.
    #[arg(long, value_name = "ADDR")]
    pub metrics_listen: Option<String>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(interval) = self.interval {
            dict.insert("interval_seconds".into(), Value::from(interval));
        }

        if !self.processes.is_empty() {
            dict.insert("processes".into(), Value::from(self.processes.clone()));
        }

        if let Some(path) = &self.log_path {
            dict.insert(
                "log_path".into(),
                Value::from(path.to_string_lossy().into_owned()),
            );
        }

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        // Giving an address implies turning the endpoint on.
        if let Some(addr) = &self.metrics_listen {
            let mut metrics = Dict::new();
            metrics.insert("enabled".into(), Value::from(true));
            metrics.insert("listen_address".into(), Value::from(addr.clone()));
            dict.insert("metrics".into(), Value::Dict(Tag::Default, metrics));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}

/// Asks for the process names on `output` and reads one comma-separated line
/// from `input`.
pub fn prompt_process_names<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
) -> std::io::Result<Vec<String>> {
    write!(
        output,
        "Enter the names of the processes to track (comma separated, e.g: duckduckgo,chrome): "
    )?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(normalize_process_names(line.split(',')))
}
