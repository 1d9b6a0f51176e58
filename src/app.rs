//! The main application logic, decoupled from the entry point.

use crate::{
    config::Config,
    core::ProcessInspector,
    inspector::SysinfoInspector,
    internal_metrics::MetricsBuilder,
    listener::{spawn_stdin_reader, CommandListener},
    persister::{LogSink, Persister},
    queue::sample_queue,
    sampler::Sampler,
    sequence::next_run_id,
    shutdown::ShutdownSignal,
    task_manager::TaskManager,
};
use anyhow::{Context, Result};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::mpsc;
use tracing::{error, info, instrument};

/// A handle to the running application.
pub struct App {
    task_manager: TaskManager,
    run_id: u64,
    metrics_addr: Option<SocketAddr>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The run identifier stamped on every sample of this execution.
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_addr
    }

    /// Waits until every sampler has stopped and the persister has drained
    /// the queue.
    ///
    /// Returns an error if the persister failed.
    pub async fn run(self) -> Result<()> {
        self.task_manager.wait().await?;
        info!(run_id = self.run_id, "All samples persisted.");
        Ok(())
    }
}

/// Builder for the main application.
///
/// Separates constructing the pipeline from running it, and lets tests swap
/// the process inspector and the command input.
pub struct AppBuilder {
    config: Config,
    inspector_override: Option<Arc<dyn ProcessInspector>>,
    commands_override: Option<mpsc::UnboundedReceiver<String>>,
    log_sink_override: Option<Box<dyn LogSink>>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            inspector_override: None,
            commands_override: None,
            log_sink_override: None,
        }
    }

    /// Overrides the process inspector for testing.
    pub fn inspector_override(mut self, inspector: Arc<dyn ProcessInspector>) -> Self {
        self.inspector_override = Some(inspector);
        self
    }

    /// Reads commands from `lines` instead of stdin.
    pub fn commands_override(mut self, lines: mpsc::UnboundedReceiver<String>) -> Self {
        self.commands_override = Some(lines);
        self
    }

    /// Writes rows to `sink` instead of the file at `log_path`.
    ///
    /// The sink is treated as a new log and gets the header row. The run id
    /// is still derived from `log_path`.
    pub fn log_sink_override(mut self, sink: Box<dyn LogSink>) -> Self {
        self.log_sink_override = Some(sink);
        self
    }

    /// Derives the run id, opens the log and spawns every pipeline task.
    ///
    /// `config` must already have been validated.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown: ShutdownSignal) -> Result<App> {
        let config = self.config;
        let task_manager = TaskManager::new();

        // =========================================================================
        // 1. Run Identifier
        // =========================================================================
        let run_id = next_run_id(&config.log_path)
            .context("cannot derive the run id from the existing log")?;

        // =========================================================================
        // 2. Metrics
        // =========================================================================
        let (metrics, metrics_server) =
            MetricsBuilder::new(config.metrics.clone()).build(shutdown.subscribe());
        let metrics = Arc::new(metrics);
        let metrics_addr = match metrics_server {
            Some((server, addr)) => {
                info!("Serving metrics on http://{}/metrics", addr);
                task_manager.spawn("MetricsServer", server.run());
                Some(addr)
            }
            None => None,
        };

        // =========================================================================
        // 3. Persister
        // =========================================================================
        let opened = match self.log_sink_override {
            Some(sink) => Persister::with_sink(
                &config.log_path,
                sink,
                true,
                config.poll_interval(),
                metrics.clone(),
            ),
            None => Persister::open(&config.log_path, config.poll_interval(), metrics.clone()),
        };
        let persister = match opened {
            Ok(persister) => persister,
            Err(e) => {
                // Stops the metrics server if it was already started.
                shutdown.trigger();
                return Err(e.into());
            }
        };
        let (producer, consumer) = sample_queue();
        {
            let shutdown = shutdown.clone();
            task_manager.spawn("Persister", async move {
                match persister.run(consumer, shutdown.subscribe()).await {
                    Ok(_) => Ok(()),
                    Err(e) => {
                        error!("Persister failed, stopping all samplers: {}", e);
                        shutdown.trigger();
                        Err(e.into())
                    }
                }
            });
        }

        // =========================================================================
        // 4. Samplers
        // =========================================================================
        let inspector = self
            .inspector_override
            .unwrap_or_else(|| Arc::new(SysinfoInspector::new()) as Arc<dyn ProcessInspector>);
        let interval = config.interval();
        info!(
            "Spawning {} samplers with a {:?} interval...",
            config.processes.len(),
            interval
        );
        for name in &config.processes {
            let sampler = Sampler::new(
                name.clone(),
                run_id,
                interval,
                inspector.clone(),
                producer.clone(),
                metrics.clone(),
            );
            let shutdown_rx = shutdown.subscribe();
            task_manager.spawn(format!("Sampler[{}]", name), async move {
                sampler.run(shutdown_rx).await;
                Ok(())
            });
        }
        // Only the samplers may hold producers, so the persister sees the
        // queue close once they have all stopped.
        drop(producer);

        // =========================================================================
        // 5. Command Listener
        // =========================================================================
        let lines = match self.commands_override {
            Some(lines) => lines,
            None => spawn_stdin_reader()?,
        };
        let listener = CommandListener::new(lines);
        task_manager.spawn("CommandListener", async move {
            listener.run(shutdown).await;
            Ok(())
        });

        Ok(App {
            task_manager,
            run_id,
            metrics_addr,
        })
    }
}

