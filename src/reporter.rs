//! The reporter loop: touch a marker file, write one heartbeat, sleep.
//!
//! Reporter-side bookkeeping only; the monitor never reads the marker file.
//! Touching it exercises the monitored directory, so a hung filesystem stops
//! the heartbeats too, which is the whole point.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use anyhow::Result;
use tracing::{debug, warn};

use crate::heartbeat::Heartbeat;
use crate::signal::is_shutdown_requested;

/// Periodic liveness reporter for one monitored directory.
pub struct Reporter {
    fifo: PathBuf,
    touch_path: PathBuf,
    message: String,
    interval: Duration,
}

impl Reporter {
    pub fn new(
        fifo: PathBuf,
        directory: PathBuf,
        touchfile: &str,
        ports: &[u16],
        interval: Duration,
    ) -> Self {
        let heartbeat = Heartbeat::new(
            directory.display().to_string(),
            ports.iter().copied(),
        );
        let touch_path = directory.join(touchfile);
        Self {
            fifo,
            touch_path,
            message: format!("{}\n", heartbeat),
            interval,
        }
    }

    /// Run until shutdown. A missing fifo or an unreachable directory is
    /// logged and retried on the next interval; the reporter never gives up
    /// on transient failures.
    pub async fn run(&self) -> Result<()> {
        while !is_shutdown_requested() {
            if let Err(err) = self.beat() {
                warn!("report failed: {}", err);
            }
            tokio::time::sleep(self.interval).await;
        }
        Ok(())
    }

    /// One report: touch the marker file, then append one heartbeat line to
    /// the fifo.
    pub fn beat(&self) -> std::io::Result<()> {
        let marker = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.touch_path)?;
        marker.set_modified(SystemTime::now())?;

        let mut fifo = OpenOptions::new().write(true).open(&self.fifo)?;
        fifo.write_all(self.message.as_bytes())?;
        debug!("sent heartbeat to {}", self.fifo.display());
        Ok(())
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
