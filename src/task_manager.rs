//! Manages the lifecycle of all spawned tasks in the application.
use anyhow::{anyhow, Result};
use futures::future::join_all;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

type NamedHandle = (String, JoinHandle<Result<()>>);

/// A centralized manager for all spawned tasks.
///
/// This struct is responsible for:
/// - Spawning tasks and keeping track of their `JoinHandle`s.
/// - Awaiting every task and reporting the first failure.
#[derive(Clone, Debug, Default)]
pub struct TaskManager {
    handles: Arc<Mutex<Vec<NamedHandle>>>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a new task and adds its handle to the manager.
    pub fn spawn<F>(&self, name: impl Into<String>, future: F)
    where
        F: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let name = name.into();
        debug!(task_name = %name, "Spawning task");
        let handle = tokio::spawn(future);
        self.lock_handles().push((name, handle));
    }

    /// Waits for all managed tasks to complete.
    ///
    /// Returns the first error (or panic) reported by a task, after every
    /// task has finished.
    pub async fn wait(self) -> Result<()> {
        let handles = self.lock_handles().drain(..).collect::<Vec<_>>();
        info!("Waiting for {} tasks to complete...", handles.len());

        let (task_names, handles): (Vec<String>, Vec<_>) = handles.into_iter().unzip();
        let results = join_all(handles).await;

        let mut first_failure = None;
        for (task_name, result) in task_names.iter().zip(results) {
            match result {
                Ok(Ok(())) => debug!(task_name = %task_name, "Task finished."),
                Ok(Err(e)) => {
                    error!(task_name = %task_name, "Task failed: {:#}", e);
                    if first_failure.is_none() {
                        first_failure = Some(e.context(format!("task '{}' failed", task_name)));
                    }
                }
                Err(e) => {
                    error!(task_name = %task_name, "Task panicked: {}", e);
                    if first_failure.is_none() {
                        first_failure = Some(anyhow!("task '{}' panicked: {}", task_name, e));
                    }
                }
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => {
                info!("All tasks finished.");
                Ok(())
            }
        }
    }

    fn lock_handles(&self) -> std::sync::MutexGuard<'_, Vec<NamedHandle>> {
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
