//! # Internal Metrics Module
//!
//! Counters and gauges describing the sampling pipeline itself.
//!
//! ## Components:
//!
//! - **`MetricsBuilder`**: installs the Prometheus recorder and prepares the
//!   metrics server when metrics are enabled.
//!
//! - **`Metrics`**: a cloneable handle with high-level methods used by the
//!   samplers and the persister.
//!
//! - **`MetricsServer`**: (Defined in `server.rs`) an `axum` server exposing
//!   `/metrics` for Prometheus to scrape.

use crate::config::MetricsConfig;
use crate::internal_metrics::server::MetricsServer;
use metrics::{Counter, Histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::error;

pub mod server;

/// The public API for the metrics system.
#[derive(Clone)]
pub struct Metrics {
    pub log_rows_written_total: Counter,
    pub log_flush_duration_seconds: Histogram,
    /// Gates the per-process series, which are registered on first use.
    enabled: bool,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Creates a new `Metrics` instance and registers descriptions for all
    /// supported metrics with the global recorder.
    pub fn new() -> Self {
        metrics::describe_counter!("samples_enqueued_total", Unit::Count, "Total number of samples pushed to the sample queue, labeled by tracked process.");
        metrics::describe_counter!("process_not_found_total", Unit::Count, "Number of lookups that found no process matching a tracked name.");
        metrics::describe_counter!("process_gone_total", Unit::Count, "Number of times a bound process disappeared between samples.");
        metrics::describe_counter!("log_rows_written_total", Unit::Count, "Total number of sample rows appended to the log.");
        metrics::describe_histogram!("log_flush_duration_seconds", Unit::Seconds, "Time taken to write and durably flush one batch of rows.");
        metrics::describe_gauge!("sample_queue_depth", Unit::Count, "Samples waiting in the queue after the persister's last drain.");

        Self {
            log_rows_written_total: metrics::counter!("log_rows_written_total"),
            log_flush_duration_seconds: metrics::histogram!("log_flush_duration_seconds"),
            enabled: true,
        }
    }

    /// Creates a `Metrics` instance that performs no operations.
    pub fn disabled() -> Self {
        Self {
            log_rows_written_total: Counter::noop(),
            log_flush_duration_seconds: Histogram::noop(),
            enabled: false,
        }
    }

    pub fn increment_samples_enqueued(&self, process: &str) {
        self.increment_for_process("samples_enqueued_total", process);
    }

    pub fn increment_process_not_found(&self, process: &str) {
        self.increment_for_process("process_not_found_total", process);
    }

    pub fn increment_process_gone(&self, process: &str) {
        self.increment_for_process("process_gone_total", process);
    }

    pub fn set_sample_queue_depth(&self, depth: usize) {
        if self.enabled {
            metrics::gauge!("sample_queue_depth").set(depth as f64);
        }
    }

    fn increment_for_process(&self, name: &'static str, process: &str) {
        if self.enabled {
            metrics::counter!(name, "process" => process.to_string()).increment(1);
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for the metrics system.
pub struct MetricsBuilder {
    config: MetricsConfig,
}

impl MetricsBuilder {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Installs the Prometheus recorder and binds the metrics listener.
    ///
    /// Metrics are an observability aid, so any setup failure is logged and a
    /// disabled handle is returned instead of aborting the run.
    pub fn build(
        self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Metrics, Option<(MetricsServer, SocketAddr)>) {
        if !self.config.enabled {
            return (Metrics::disabled(), None);
        }

        let builder = match PrometheusBuilder::new().set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0],
        ) {
            Ok(builder) => builder,
            Err(e) => {
                error!("Invalid histogram buckets for metrics: {}", e);
                return (Metrics::disabled(), None);
            }
        };
        let recorder = builder.build_recorder();
        let handle = recorder.handle();

        let listener = match std::net::TcpListener::bind(self.config.listen_address) {
            Ok(listener) => listener,
            Err(e) => {
                error!(
                    "Failed to bind metrics server to {}: {}",
                    self.config.listen_address, e
                );
                return (Metrics::disabled(), None);
            }
        };
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                error!("Failed to get local address for metrics server: {}", e);
                return (Metrics::disabled(), None);
            }
        };
        let listener = match listener
            .set_nonblocking(true)
            .and_then(|_| TcpListener::from_std(listener))
        {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to prepare metrics listener: {}", e);
                return (Metrics::disabled(), None);
            }
        };

        if let Err(e) = metrics::set_global_recorder(recorder) {
            error!("Failed to install Prometheus recorder: {}", e);
            return (Metrics::disabled(), None);
        }

        let metrics = Metrics::new();
        let server = MetricsServer::new(listener, handle, shutdown_rx);
        (metrics, Some((server, addr)))
    }
}
