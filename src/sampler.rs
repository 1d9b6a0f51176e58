//! One sampling task per tracked process name.

use crate::{
    core::{InspectError, ProcessEntry, ProcessInspector, Sample},
    internal_metrics::Metrics,
    locator::ProcessLocator,
    queue::SampleProducer,
    shutdown::wait_for_shutdown,
};
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

/// Whether the sampler currently holds a live process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Unbound,
    Bound(ProcessEntry),
}

/// Periodically measures one named process and enqueues the results.
pub struct Sampler {
    name: String,
    run_id: u64,
    interval: Duration,
    locator: ProcessLocator,
    inspector: Arc<dyn ProcessInspector>,
    queue: SampleProducer,
    metrics: Arc<Metrics>,
}

impl Sampler {
    pub fn new(
        name: String,
        run_id: u64,
        interval: Duration,
        inspector: Arc<dyn ProcessInspector>,
        queue: SampleProducer,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            name,
            run_id,
            interval,
            locator: ProcessLocator::new(inspector.clone()),
            inspector,
            queue,
            metrics,
        }
    }

    /// Runs until shutdown is requested. Returns the number of samples pushed.
    ///
    /// The flag is checked before every cycle. A measurement already in
    /// progress is completed and its sample still enqueued.
    #[instrument(skip_all, fields(process = %self.name))]
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) -> u64 {
        let mut binding = Binding::Unbound;
        let mut pushed = 0u64;
        info!(run_id = self.run_id, "Sampler started.");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            match &binding {
                Binding::Unbound => match self.locator.resolve(&self.name).await {
                    Some(entry) => binding = Binding::Bound(entry),
                    None => {
                        warn!("Process ID not found, retrying in {:?}.", self.interval);
                        self.metrics.increment_process_not_found(&self.name);
                        tokio::select! {
                            biased;
                            _ = wait_for_shutdown(&mut shutdown_rx) => {}
                            _ = tokio::time::sleep(self.interval) => {}
                        }
                    }
                },
                Binding::Bound(entry) => {
                    // The measurement window is this cycle's delay.
                    match self.inspector.measure(entry.pid, self.interval).await {
                        Ok(metrics) => {
                            let sample = Sample::new(self.run_id, Local::now(), metrics);
                            info!(
                                pid = entry.pid,
                                cpu = sample.cpu_usage,
                                memory = sample.memory_usage,
                                disk_read_bytes = sample.disk_read_bytes,
                                disk_write_bytes = sample.disk_write_bytes,
                                "Sampled {}",
                                sample.process
                            );
                            if let Err(e) = self.queue.push(sample) {
                                error!("Dropping sample and stopping: {}", e);
                                break;
                            }
                            pushed += 1;
                            self.metrics.increment_samples_enqueued(&self.name);
                        }
                        Err(InspectError::ProcessGone { pid }) => {
                            warn!(pid, "Process with PID {} not found. Trying to find new PID.", pid);
                            self.metrics.increment_process_gone(&self.name);
                            binding = Binding::Unbound;
                        }
                    }
                }
            }
        }

        info!(samples = pushed, "Sampler stopped.");
        pushed
    }
}
