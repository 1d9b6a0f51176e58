//! The shared shutdown flag observed by every pipeline task.

use std::sync::Arc;
use tokio::sync::watch;

/// A cloneable, idempotent shutdown flag backed by a `watch` channel.
///
/// Every task receives a handle (or a receiver from [`ShutdownSignal::subscribe`])
/// when it is spawned. Once triggered the flag stays set for the rest of the run.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Sets the flag. Returns `true` only for the call that actually set it.
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        })
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Returns a receiver that observes the flag.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves once the flag behind `shutdown_rx` is set.
///
/// Also resolves if the sender side is gone, since nothing can clear the flag
/// or set it afterwards.
pub async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stopped| *stopped).await;
}
