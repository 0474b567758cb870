//! Signal handling for graceful shutdown.
//!
//! SIGINT and SIGTERM flip a process-wide flag. The control loop checks the
//! flag once per cycle, so shutdown latency is bounded by one poll interval.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

/// Global flag indicating whether a shutdown has been requested.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Check if shutdown has been requested.
#[inline]
pub fn is_shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::Relaxed)
}

/// Request a shutdown (can be called from signal handlers or tests).
pub fn request_shutdown() {
    SHUTDOWN_REQUESTED.store(true, Ordering::Relaxed);
}

/// Reset shutdown flag (mainly for testing).
#[cfg(test)]
pub fn reset_shutdown() {
    SHUTDOWN_REQUESTED.store(false, Ordering::Relaxed);
}

/// A guard that manages signal handlers for graceful shutdown.
/// When created, it spawns a task that listens for SIGINT and SIGTERM.
pub struct ShutdownGuard {
    _marker: (),
}

impl ShutdownGuard {
    /// Create a new shutdown guard and start listening for signals.
    ///
    /// If signal handlers cannot be registered (e.g., in restricted
    /// environments), the guard is still created but signal handling will
    /// be disabled.
    pub fn new() -> Self {
        tokio::spawn(async move {
            let sigint = match signal(SignalKind::interrupt()) {
                Ok(s) => Some(s),
                Err(e) => {
                    tracing::warn!("Failed to register SIGINT handler: {}", e);
                    None
                }
            };

            let sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => Some(s),
                Err(e) => {
                    tracing::warn!("Failed to register SIGTERM handler: {}", e);
                    None
                }
            };

            match (sigint, sigterm) {
                (Some(mut int), Some(mut term)) => {
                    tokio::select! {
                        _ = int.recv() => {
                            info!("Received SIGINT, initiating graceful shutdown...");
                            request_shutdown();
                        }
                        _ = term.recv() => {
                            info!("Received SIGTERM, initiating graceful shutdown...");
                            request_shutdown();
                        }
                    }
                }
                (Some(mut int), None) => {
                    int.recv().await;
                    info!("Received SIGINT, initiating graceful shutdown...");
                    request_shutdown();
                }
                (None, Some(mut term)) => {
                    term.recv().await;
                    info!("Received SIGTERM, initiating graceful shutdown...");
                    request_shutdown();
                }
                (None, None) => {
                    tracing::warn!("No signal handlers registered - graceful shutdown disabled");
                }
            }
        });

        Self { _marker: () }
    }
}

impl Default for ShutdownGuard {
    fn default() -> Self {
        Self::new()
    }
}
