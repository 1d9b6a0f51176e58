//! Core domain types and service traits for procpeek
//!
//! This module defines the records that flow through the sampling pipeline and
//! the trait contract for the OS process-inspection capability.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use std::time::Duration;
use thiserror::Error;

/// Timestamp layout used in the log's `Time` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A live process as reported by the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    /// The display name shown in the process table.
    pub name: String,
}

impl ProcessEntry {
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
        }
    }
}

/// Cumulative disk I/O counters for a process, as reported by the OS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskCounters {
    pub read_count: u64,
    pub write_count: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// The result of one measurement window for a single process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessMetrics {
    /// Process name as observed at the end of the window.
    pub name: String,
    /// CPU utilization over the window, in percent of one core.
    pub cpu_usage: f32,
    /// Resident set size as a percentage of total system memory.
    pub memory_percent: f32,
    pub disk: DiskCounters,
}

/// Failures reported by a [`ProcessInspector`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InspectError {
    #[error("process {pid} no longer exists")]
    ProcessGone { pid: u32 },
}

/// The OS process-inspection capability consumed by the sampling pipeline.
#[async_trait]
pub trait ProcessInspector: Send + Sync {
    /// Enumerates the live process table.
    ///
    /// The order of the returned entries is the order in which the locator
    /// tries them.
    async fn processes(&self) -> Vec<ProcessEntry>;

    /// Measures a process over `window`.
    ///
    /// CPU utilization is computed over exactly this window, so the call
    /// blocks for its full duration. Memory and disk counters are read once the
    /// window has elapsed.
    async fn measure(&self, pid: u32, window: Duration) -> Result<ProcessMetrics, InspectError>;
}

/// One measurement record for one tracked process at one point in time.
///
/// Field order matches the log's column order.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Sample {
    pub run_id: u64,
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Local>,
    pub process: String,
    pub cpu_usage: f32,
    pub memory_usage: f32,
    pub disk_read_count: u64,
    pub disk_write_count: u64,
    pub disk_read_bytes: u64,
    pub disk_write_bytes: u64,
}

impl Sample {
    /// Builds a sample from a completed measurement.
    pub fn new(run_id: u64, timestamp: DateTime<Local>, metrics: ProcessMetrics) -> Self {
        Self {
            run_id,
            timestamp,
            process: metrics.name,
            cpu_usage: metrics.cpu_usage,
            memory_usage: metrics.memory_percent,
            disk_read_count: metrics.disk.read_count,
            disk_write_count: metrics.disk.write_count,
            disk_read_bytes: metrics.disk.read_bytes,
            disk_write_bytes: metrics.disk.write_bytes,
        }
    }
}

fn serialize_timestamp<S>(timestamp: &DateTime<Local>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&timestamp.format(TIMESTAMP_FORMAT))
}
