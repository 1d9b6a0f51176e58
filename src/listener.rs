//! The interactive command listener.

use crate::shutdown::{wait_for_shutdown, ShutdownSignal};
use anyhow::{Context, Result};
use std::io::BufRead;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Returns `true` for the commands that request shutdown (`exit` or `e`).
pub fn is_exit_command(line: &str) -> bool {
    let command = line.trim();
    command.eq_ignore_ascii_case("exit") || command.eq_ignore_ascii_case("e")
}

/// Reads command lines and triggers shutdown on `exit`.
pub struct CommandListener {
    lines: mpsc::UnboundedReceiver<String>,
}

impl CommandListener {
    pub fn new(lines: mpsc::UnboundedReceiver<String>) -> Self {
        Self { lines }
    }

    /// Listens until an exit command arrives, shutdown is requested
    /// elsewhere, or the input ends.
    pub async fn run(mut self, shutdown: ShutdownSignal) {
        let mut shutdown_rx = shutdown.subscribe();
        loop {
            let line = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown_rx) => {
                    debug!("Command listener observed shutdown.");
                    break;
                }
                line = self.lines.recv() => line,
            };

            match line {
                Some(line) if is_exit_command(&line) => {
                    shutdown.trigger();
                    info!("Input heard. Waiting for all samplers to finish and the log to be flushed.");
                    break;
                }
                Some(line) => {
                    debug!(input = %line.trim(), "Ignoring unrecognised command.");
                }
                None => {
                    info!("Command input closed; stop with Ctrl-C.");
                    break;
                }
            }
        }
    }
}

/// Forwards lines from stdin over a channel.
///
/// Blocking stdin reads run on a dedicated OS thread; the thread is not joined,
/// so a pending read never holds up process exit.
pub fn spawn_stdin_reader() -> Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to read from stdin: {}", e);
                        break;
                    }
                }
            }
        })
        .context("failed to spawn stdin reader thread")?;
    Ok(rx)
}
