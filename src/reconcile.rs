//! Diff-based reconciliation of live firewall rules against the down set.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::firewall::{FirewallController, RuleSpec};
use crate::state::ResourceTable;

/// Counts of rule changes applied by one reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    pub removed: usize,
    pub inserted: usize,
}

impl SyncOutcome {
    pub fn is_noop(&self) -> bool {
        self.removed == 0 && self.inserted == 0
    }
}

/// Converges live packet-filter state to the resource table's down set.
pub struct Reconciler {
    firewall: Box<dyn FirewallController>,
    grace_until: Instant,
    refresh_interval: Duration,
    last_sync: Option<Instant>,
}

impl Reconciler {
    pub fn new(
        firewall: Box<dyn FirewallController>,
        startup_grace: Duration,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            firewall,
            grace_until: Instant::now() + startup_grace,
            refresh_interval,
            last_sync: None,
        }
    }

    /// Trigger policy: run when the table has pending updates, or when the
    /// coalescing interval has elapsed since the last pass. The interval
    /// bounds staleness against rule changes made behind our back.
    pub fn due(&self, update_pending: bool) -> bool {
        update_pending
            || self
                .last_sync
                .map_or(true, |at| at.elapsed() > self.refresh_interval)
    }

    /// One reconciliation pass: build the desired set from down resources,
    /// diff against the live tagged rules, apply removals before insertions.
    ///
    /// Removals go first so that a port moving between resources within one
    /// cycle cannot leave two rules with the same body.
    ///
    /// During the startup grace period no commands are issued: a monitor
    /// restart must not fence off resources whose reporters have not
    /// reconnected yet. Individual command failures are logged and dropped;
    /// the diff reappears next pass and the command is retried.
    pub async fn converge(&mut self, table: &ResourceTable) -> Result<SyncOutcome> {
        self.last_sync = Some(Instant::now());

        if Instant::now() < self.grace_until {
            debug!("within startup grace period, not syncing rules");
            return Ok(SyncOutcome::default());
        }

        let mut desired = BTreeSet::new();
        for (resource, ports) in table.down_resources() {
            for &port in ports {
                desired.insert(RuleSpec::new(resource, port).body());
            }
        }

        let live = self.firewall.list_rules().await?;
        let live_bodies: BTreeSet<&str> = live.iter().map(|rule| rule.body.as_str()).collect();

        let to_remove: Vec<&str> = live
            .iter()
            .map(|rule| rule.body.as_str())
            .filter(|body| !desired.contains(*body))
            .collect();
        let to_add: Vec<&str> = desired
            .iter()
            .map(String::as_str)
            .filter(|body| !live_bodies.contains(*body))
            .collect();

        let mut outcome = SyncOutcome::default();

        for body in to_remove {
            match self.firewall.remove_rule(body).await {
                Ok(()) => {
                    info!("removed rule: {}", body);
                    outcome.removed += 1;
                }
                Err(err) => warn!("failed to remove rule ({}), will retry: {}", body, err),
            }
        }
        for body in to_add {
            match self.firewall.insert_rule(body).await {
                Ok(()) => {
                    info!("inserted rule: {}", body);
                    outcome.inserted += 1;
                }
                Err(err) => warn!("failed to insert rule ({}), will retry: {}", body, err),
            }
        }

        Ok(outcome)
    }
}
