//! The single consumer that appends queued samples to the CSV log.

use crate::{
    core::Sample,
    internal_metrics::Metrics,
    queue::{Pop, SampleConsumer},
};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Header row written once when the log is created.
pub const LOG_HEADER: [&str; 9] = [
    "Iter",
    "Time",
    "Process",
    "CPU Usage",
    "Memory Usage",
    "Disk Read Count",
    "Disk Write Count",
    "Disk Read Bytes",
    "Disk Write Bytes",
];

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("failed to open log {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write to log {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to flush log {}: {source}", path.display())]
    Flush {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Destination of the log rows.
pub trait LogSink: Write + Send {
    /// Pushes written bytes to stable storage.
    fn sync(&self) -> io::Result<()>;
}

impl LogSink for File {
    fn sync(&self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Appends samples to the log, one row per sample.
pub struct Persister {
    path: PathBuf,
    writer: csv::Writer<Box<dyn LogSink>>,
    poll_interval: Duration,
    metrics: Arc<Metrics>,
    rows_written: u64,
}

impl std::fmt::Debug for Persister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persister")
            .field("path", &self.path)
            .field("rows_written", &self.rows_written)
            .finish_non_exhaustive()
    }
}

impl Persister {
    /// Opens `path` for appending, writing the header if the log is new.
    ///
    /// A log that exists but is empty is treated as new.
    pub fn open(
        path: &Path,
        poll_interval: Duration,
        metrics: Arc<Metrics>,
    ) -> Result<Self, PersistError> {
        let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| PersistError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Self::with_sink(path, Box::new(file), is_new, poll_interval, metrics)
    }

    /// Builds a persister over an already opened sink. `path` only names the
    /// log in errors and traces.
    pub fn with_sink(
        path: &Path,
        sink: Box<dyn LogSink>,
        write_header: bool,
        poll_interval: Duration,
        metrics: Arc<Metrics>,
    ) -> Result<Self, PersistError> {
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(sink);

        let mut persister = Self {
            path: path.to_path_buf(),
            writer,
            poll_interval,
            metrics,
            rows_written: 0,
        };

        if write_header {
            info!(path = %path.display(), "Creating new log with header row");
            persister
                .writer
                .write_record(LOG_HEADER)
                .map_err(|source| persister.write_error(source))?;
            persister.flush()?;
        }

        Ok(persister)
    }

    /// Drains the queue into the log until shutdown has been requested and
    /// nothing more can arrive. Returns the number of rows written.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub async fn run(
        mut self,
        queue: SampleConsumer,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<u64, PersistError> {
        info!("Persister started.");
        loop {
            // Read the flag before looking at the queue: a sample pushed just
            // before shutdown must still be seen as pending.
            let stopping = *shutdown_rx.borrow();
            if stopping && queue.is_drained() {
                break;
            }

            match queue.pop_timeout(self.poll_interval).await {
                Pop::Sample(first) => {
                    let mut batch = vec![first];
                    batch.extend(queue.drain_ready());
                    self.write_batch(&batch)?;
                    self.metrics.set_sample_queue_depth(queue.len());
                }
                Pop::TimedOut => {}
                Pop::Closed => {
                    if !stopping {
                        warn!("All samplers have stopped before shutdown was requested.");
                    }
                    break;
                }
            }
        }
        info!(rows = self.rows_written, "Persister drained the queue and finished.");
        Ok(self.rows_written)
    }

    /// Appends `batch` and flushes it to stable storage.
    pub fn write_batch(&mut self, batch: &[Sample]) -> Result<(), PersistError> {
        let start = Instant::now();
        for sample in batch {
            if let Err(source) = self.writer.serialize(sample) {
                return Err(self.write_error(source));
            }
        }
        self.flush()?;

        self.rows_written += batch.len() as u64;
        self.metrics
            .log_rows_written_total
            .increment(batch.len() as u64);
        self.metrics
            .log_flush_duration_seconds
            .record(start.elapsed().as_secs_f64());
        debug!(rows = batch.len(), "Appended batch to log");
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PersistError> {
        self.writer
            .flush()
            .and_then(|_| self.writer.get_ref().sync())
            .map_err(|source| PersistError::Flush {
                path: self.path.clone(),
                source,
            })
    }

    fn write_error(&self, source: csv::Error) -> PersistError {
        PersistError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::LogSink;
    use std::io::{self, Write};

    /// A sink that accepts a fixed number of writes and then fails like a
    /// full disk.
    #[derive(Debug)]
    pub struct FailingSink {
        remaining_writes: usize,
    }

    impl FailingSink {
        pub fn after_writes(writes: usize) -> Self {
            Self {
                remaining_writes: writes,
            }
        }

        fn full() -> io::Error {
            io::Error::new(io::ErrorKind::Other, "no space left on device")
        }
    }

    impl Write for FailingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.remaining_writes == 0 {
                return Err(Self::full());
            }
            self.remaining_writes -= 1;
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogSink for FailingSink {
        fn sync(&self) -> io::Result<()> {
            Ok(())
        }
    }
}
