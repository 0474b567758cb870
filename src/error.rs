//! Error types for the monitor daemon.

use thiserror::Error;

/// Errors the monitor can encounter in steady-state operation.
///
/// None of these are fatal once the control loop is running: they are logged
/// and the loop continues. Only channel setup at startup aborts the process.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("malformed heartbeat message: {0:?}")]
    MalformedMessage(String),

    #[error("heartbeat channel read failed: {0}")]
    ChannelRead(#[from] std::io::Error),

    #[error("firewall command failed: {0}")]
    Firewall(String),

    #[error("lifecycle error: {0}")]
    Lifecycle(String),
}
