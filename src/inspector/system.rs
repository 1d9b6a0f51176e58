//! # Sysinfo Process Inspector
//!
//! The production [`ProcessInspector`], backed by the `sysinfo` crate.
//!
//! CPU utilization is measured by refreshing the process twice, `window`
//! apart, on a private `System` instance, so concurrent samplers never reset
//! each other's CPU baseline. On Linux the read/write syscall counts are taken
//! from `/proc/<pid>/io`; elsewhere they are reported as zero.

use crate::core::{DiskCounters, InspectError, ProcessEntry, ProcessInspector, ProcessMetrics};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use sysinfo::{Pid, System};
use tracing::{error, trace};

pub struct SysinfoInspector {
    table: Mutex<System>,
}

impl SysinfoInspector {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoInspector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessInspector for SysinfoInspector {
    async fn processes(&self) -> Vec<ProcessEntry> {
        let mut system = match self.table.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("Process table lock was poisoned, recovering.");
                poisoned.into_inner()
            }
        };
        system.refresh_processes();

        let mut entries: Vec<ProcessEntry> = system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessEntry::new(pid.as_u32(), process.name()))
            .collect();
        entries.sort_by_key(|entry| entry.pid);
        entries
    }

    async fn measure(&self, pid: u32, window: Duration) -> Result<ProcessMetrics, InspectError> {
        let sys_pid = Pid::from_u32(pid);
        let mut system = System::new();

        // The first refresh sets the CPU baseline for this window.
        if !system.refresh_process(sys_pid) {
            return Err(InspectError::ProcessGone { pid });
        }
        tokio::time::sleep(window).await;
        if !system.refresh_process(sys_pid) {
            return Err(InspectError::ProcessGone { pid });
        }
        system.refresh_memory();

        let process = system
            .process(sys_pid)
            .ok_or(InspectError::ProcessGone { pid })?;

        let total_memory = system.total_memory();
        let memory_percent = if total_memory > 0 {
            (process.memory() as f64 / total_memory as f64 * 100.0) as f32
        } else {
            0.0
        };

        let usage = process.disk_usage();
        let (read_count, write_count) = syscall_counts(pid);

        Ok(ProcessMetrics {
            name: process.name().to_string(),
            cpu_usage: process.cpu_usage(),
            memory_percent,
            disk: DiskCounters {
                read_count,
                write_count,
                read_bytes: usage.total_read_bytes,
                write_bytes: usage.total_written_bytes,
            },
        })
    }
}

#[cfg(target_os = "linux")]
fn syscall_counts(pid: u32) -> (u64, u64) {
    match std::fs::read_to_string(format!("/proc/{}/io", pid)) {
        Ok(contents) => parse_proc_io(&contents),
        Err(e) => {
            // Usually EACCES for processes owned by another user.
            trace!(pid, error = %e, "Cannot read /proc io counters");
            (0, 0)
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn syscall_counts(pid: u32) -> (u64, u64) {
    trace!(pid, "Syscall counters are not available on this platform");
    (0, 0)
}

/// Extracts `(syscr, syscw)` from the contents of `/proc/<pid>/io`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_proc_io(contents: &str) -> (u64, u64) {
    let mut syscr = 0;
    let mut syscw = 0;
    for line in contents.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().parse().unwrap_or(0);
        match key.trim() {
            "syscr" => syscr = value,
            "syscw" => syscw = value,
            _ => {}
        }
    }
    (syscr, syscw)
}
