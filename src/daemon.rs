//! The monitor control loop: wait, listen, evaluate, reconcile.

use std::time::Instant;

use anyhow::Result;
use tracing::{debug, warn};

use crate::channel::HeartbeatChannel;
use crate::config::Config;
use crate::error::MonitorError;
use crate::heartbeat::Heartbeat;
use crate::reconcile::Reconciler;
use crate::signal::is_shutdown_requested;
use crate::state::ResourceTable;

/// The monitor daemon: one control loop over one FIFO, one resource table,
/// one reconciler. Everything runs on a single task; the only suspension
/// point is the bounded wait on the channel.
pub struct Monitor {
    config: Config,
    channel: HeartbeatChannel,
    table: ResourceTable,
    reconciler: Reconciler,
}

impl Monitor {
    pub fn new(config: Config, channel: HeartbeatChannel, reconciler: Reconciler) -> Self {
        Self {
            config,
            channel,
            table: ResourceTable::new(),
            reconciler,
        }
    }

    /// Run until shutdown is requested. Nothing in the steady-state loop is
    /// fatal: malformed messages, transient read errors, and failed rule
    /// commands are all logged and the loop keeps going, so one misbehaving
    /// reporter cannot take down monitoring for the others.
    pub async fn run(&mut self) -> Result<()> {
        debug!("entering control loop");
        while !is_shutdown_requested() {
            self.cycle().await;
        }
        debug!("control loop stopped");
        Ok(())
    }

    /// One cycle: bounded wait for a message, then listener, evaluator, and
    /// the reconciler when due.
    async fn cycle(&mut self) {
        match self.channel.recv(self.config.poll_interval()).await {
            Ok(Some(line)) => self.handle_line(&line),
            Ok(None) => {}
            Err(err) => warn!("{}", MonitorError::ChannelRead(err)),
        }

        // The evaluator runs every cycle, message or not. checked_sub only
        // fails while process uptime is shorter than the timeout, when no
        // record can be stale anyway.
        if let Some(cutoff) = Instant::now().checked_sub(self.config.heartbeat_timeout()) {
            self.table.evaluate(cutoff);
        }

        if self.reconciler.due(self.table.take_update_pending()) {
            match self.reconciler.converge(&self.table).await {
                Ok(outcome) if !outcome.is_noop() => {
                    debug!(
                        "rule sync: {} removed, {} inserted",
                        outcome.removed, outcome.inserted
                    );
                }
                Ok(_) => {}
                Err(err) => warn!("{}", MonitorError::Firewall(err.to_string())),
            }
        }
    }

    fn handle_line(&mut self, line: &str) {
        match line.parse::<Heartbeat>() {
            Ok(heartbeat) => self.table.observe(heartbeat, Instant::now()),
            Err(err) => warn!("{}", err),
        }
    }

    pub fn table(&self) -> &ResourceTable {
        &self.table
    }
}
