use crate::core::{DiskCounters, InspectError, ProcessEntry, ProcessInspector, ProcessMetrics};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// A scripted process that is alive during `[alive_from, alive_until)`,
/// measured from the moment the inspector was created.
#[derive(Debug, Clone)]
struct ScriptedProcess {
    entry: ProcessEntry,
    alive_from: Duration,
    alive_until: Option<Duration>,
}

/// Fake process inspector for testing.
///
/// Liveness is driven by `tokio::time`, so tests running with a paused clock
/// get deterministic process lifetimes. Each measurement of a pid bumps its
/// `disk.read_count`, which gives every sample a per-process sequence number.
#[derive(Clone)]
pub struct FakeInspector {
    start: Instant,
    processes: Arc<Mutex<Vec<ScriptedProcess>>>,
    measured: Arc<Mutex<HashMap<u32, u64>>>,
    lookups: Arc<AtomicUsize>,
}

impl FakeInspector {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            processes: Arc::new(Mutex::new(Vec::new())),
            measured: Arc::new(Mutex::new(HashMap::new())),
            lookups: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Adds a process that is alive for the whole test.
    pub fn with_process(self, pid: u32, name: &str) -> Self {
        self.with_lifetime(pid, name, Duration::ZERO, None)
    }

    /// Adds a process alive from `alive_from` until `alive_until` (exclusive).
    pub fn with_lifetime(
        self,
        pid: u32,
        name: &str,
        alive_from: Duration,
        alive_until: Option<Duration>,
    ) -> Self {
        self.processes.lock().unwrap().push(ScriptedProcess {
            entry: ProcessEntry::new(pid, name),
            alive_from,
            alive_until,
        });
        self
    }

    /// Number of times the process table was enumerated.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Number of completed measurements of `pid`.
    pub fn measurements(&self, pid: u32) -> u64 {
        self.measured.lock().unwrap().get(&pid).copied().unwrap_or(0)
    }

    fn alive(&self, pid: u32) -> Option<ProcessEntry> {
        let elapsed = self.start.elapsed();
        self.processes
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.entry.pid == pid && Self::is_alive(p, elapsed))
            .map(|p| p.entry.clone())
    }

    fn is_alive(process: &ScriptedProcess, elapsed: Duration) -> bool {
        elapsed >= process.alive_from && process.alive_until.map_or(true, |until| elapsed < until)
    }
}

impl Default for FakeInspector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessInspector for FakeInspector {
    async fn processes(&self) -> Vec<ProcessEntry> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let elapsed = self.start.elapsed();
        self.processes
            .lock()
            .unwrap()
            .iter()
            .filter(|p| Self::is_alive(p, elapsed))
            .map(|p| p.entry.clone())
            .collect()
    }

    async fn measure(&self, pid: u32, window: Duration) -> Result<ProcessMetrics, InspectError> {
        if self.alive(pid).is_none() {
            return Err(InspectError::ProcessGone { pid });
        }
        tokio::time::sleep(window).await;
        let entry = self.alive(pid).ok_or(InspectError::ProcessGone { pid })?;

        let sequence = {
            let mut measured = self.measured.lock().unwrap();
            let count = measured.entry(pid).or_insert(0);
            *count += 1;
            *count
        };

        Ok(ProcessMetrics {
            name: entry.name,
            cpu_usage: 10.0,
            memory_percent: 1.5,
            disk: DiskCounters {
                read_count: sequence,
                write_count: sequence,
                read_bytes: sequence * 4096,
                write_bytes: sequence * 512,
            },
        })
    }
}
