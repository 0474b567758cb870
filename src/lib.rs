//! # disk-monitor - heartbeat-driven port fencing
//!
//! A host-local liveness monitor that turns periodic heartbeats into
//! firewall admission-control decisions. Reporter processes write one
//! heartbeat line per interval to a shared FIFO; when a resource stops
//! reporting for longer than the heartbeat timeout, the monitor inserts
//! iptables rules rejecting inbound TCP to the resource's ports, and lifts
//! them again when the heartbeats resume.
//!
//! ## Architecture
//!
//! ```text
//! disk-reporter ──┐
//! disk-reporter ──┼─> fifo ─> listener ─> resource table
//! disk-reporter ──┘                            │
//!                              evaluator  <────┤  (timeout-based up/down)
//!                              reconciler <────┘  (diff against iptables)
//! ```
//!
//! The daemon is a single control loop: a bounded wait on the FIFO, then the
//! listener, the liveness evaluator, and, when state changed or the
//! coalescing interval elapsed, a reconciliation pass. The reconciler only
//! ever touches rules carrying the `disk-monitor <resource>` ownership
//! comment, so it coexists with any other firewall management on the host.
//!
//! ## Modules
//!
//! - [`channel`] - heartbeat FIFO creation, keep-alive open, bounded reads
//! - [`cli`] - command-line interfaces for both binaries
//! - [`cmd`] - command execution abstraction (mockable in tests)
//! - [`config`] - configuration defaults, YAML loading, validation
//! - [`daemon`] - the monitor control loop
//! - [`error`] - error taxonomy
//! - [`firewall`] - rule model and the iptables controller seam
//! - [`heartbeat`] - wire format parsing
//! - [`pidfile`] - pid file with single-instance locking
//! - [`reconcile`] - the rule diff/apply algorithm
//! - [`reporter`] - the reporter loop
//! - [`signal`] - graceful shutdown signal handling
//! - [`state`] - the in-memory resource table

pub mod channel;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod daemon;
pub mod error;
pub mod firewall;
pub mod heartbeat;
pub mod pidfile;
pub mod reconcile;
pub mod reporter;
pub mod signal;
pub mod state;

pub use config::Config;
pub use error::MonitorError;
