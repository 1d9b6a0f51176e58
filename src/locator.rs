//! Resolves tracked process names to live processes.

use crate::core::{ProcessEntry, ProcessInspector};
use std::sync::Arc;
use tracing::{debug, info};

/// Looks up processes by name in the live process table.
#[derive(Clone)]
pub struct ProcessLocator {
    inspector: Arc<dyn ProcessInspector>,
}

impl ProcessLocator {
    pub fn new(inspector: Arc<dyn ProcessInspector>) -> Self {
        Self { inspector }
    }

    /// Returns the first live process whose display name contains `name`,
    /// ignoring case, or `None` if nothing matches.
    pub async fn resolve(&self, name: &str) -> Option<ProcessEntry> {
        let table = self.inspector.processes().await;
        match find_match(&table, name) {
            Some(entry) => {
                info!(pid = entry.pid, name = %entry.name, "Resolved process '{}'", name);
                Some(entry.clone())
            }
            None => {
                debug!(candidates = table.len(), "No process matches '{}'", name);
                None
            }
        }
    }
}

/// Case-insensitive substring match over `table`; the first hit wins.
pub fn find_match<'a>(table: &'a [ProcessEntry], name: &str) -> Option<&'a ProcessEntry> {
    let needle = name.to_lowercase();
    table
        .iter()
        .find(|entry| entry.name.to_lowercase().contains(&needle))
}
