//! The in-memory resource table: liveness records keyed by resource id.
//!
//! Two pieces of the control loop mutate it: the heartbeat listener
//! ([`ResourceTable::observe`]) and the liveness evaluator
//! ([`ResourceTable::evaluate`]). Both run on the single daemon thread, so
//! the table needs no locking.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use tracing::info;

use crate::heartbeat::Heartbeat;

/// Liveness record for one monitored resource.
#[derive(Debug, Clone)]
pub struct ResourceRecord {
    /// Ports to fence while the resource is down; always reflects the most
    /// recently received valid message.
    pub ports: BTreeSet<u16>,
    pub last_heartbeat: Instant,
    pub up: bool,
}

/// Map of resource id to liveness record.
///
/// Entries are created on first heartbeat and never removed: a resource that
/// stops reporting stays down forever, so its ports stay fenced. Removing the
/// entry would silently drop that protection.
#[derive(Debug, Default)]
pub struct ResourceTable {
    entries: BTreeMap<String, ResourceRecord>,
    update_pending: bool,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Heartbeat listener: fold one received message into the table.
    ///
    /// Registration sets `last_heartbeat = now` together with `up = true` in
    /// one step. An epoch-zero sentinel plus a short cycle could mark a
    /// brand-new resource down before its first evaluation.
    pub fn observe(&mut self, heartbeat: Heartbeat, now: Instant) {
        match self.entries.entry(heartbeat.resource) {
            Entry::Vacant(slot) => {
                info!("Register {} with ports {}", slot.key(), join_ports(&heartbeat.ports));
                slot.insert(ResourceRecord {
                    ports: heartbeat.ports,
                    last_heartbeat: now,
                    up: true,
                });
                self.update_pending = true;
            }
            Entry::Occupied(mut slot) => {
                if slot.get().ports != heartbeat.ports {
                    info!("New ports for {}: {}", slot.key(), join_ports(&heartbeat.ports));
                    slot.get_mut().ports = heartbeat.ports;
                    self.update_pending = true;
                }
                slot.get_mut().last_heartbeat = now;
            }
        }
    }

    /// Liveness evaluator: flip up/down state against the cutoff.
    ///
    /// Runs once per control-loop cycle whether or not a message arrived.
    /// `cutoff` is `now - heartbeat_timeout`.
    pub fn evaluate(&mut self, cutoff: Instant) {
        for (id, record) in &mut self.entries {
            let up = record.last_heartbeat > cutoff;
            if up != record.up {
                info!("{} - {}", id, if up { "UP" } else { "DOWN" });
                record.up = up;
                self.update_pending = true;
            }
        }
    }

    /// Consume the pending-update flag set by `observe` and `evaluate`.
    pub fn take_update_pending(&mut self) -> bool {
        std::mem::take(&mut self.update_pending)
    }

    /// Resources currently considered down, with the ports to fence.
    pub fn down_resources(&self) -> impl Iterator<Item = (&str, &BTreeSet<u16>)> {
        self.entries
            .iter()
            .filter(|(_, record)| !record.up)
            .map(|(id, record)| (id.as_str(), &record.ports))
    }

    pub fn get(&self, id: &str) -> Option<&ResourceRecord> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn join_ports(ports: &BTreeSet<u16>) -> String {
    ports
        .iter()
        .map(|port| port.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
