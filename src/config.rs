//! Daemon configuration: defaults, optional YAML file, validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Monitor configuration. All durations are whole seconds.
///
/// Command-line flags override file values; see [`crate::cli::MonitorCli`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path of the heartbeat fifo.
    pub fifo: PathBuf,

    /// Path of the pid file (written when daemonized).
    pub pidfile: PathBuf,

    /// Seconds without a heartbeat before a resource is marked down.
    pub heartbeat_timeout: u64,

    /// Upper bound on one blocking wait for a heartbeat.
    pub poll_interval: u64,

    /// Seconds after startup during which no rules are applied, so a monitor
    /// restart does not fence off resources whose reporters have not
    /// reconnected yet.
    pub startup_grace: u64,

    /// Maximum seconds between rule syncs even without state changes.
    pub refresh_interval: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fifo: PathBuf::from("/var/run/disk-monitor.fifo"),
            pidfile: PathBuf::from("/var/run/disk-monitor.pid"),
            heartbeat_timeout: 5,
            poll_interval: 2,
            startup_grace: 60,
            refresh_interval: 60,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read config file {:?}", path.as_ref()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file {:?}", path.as_ref()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_timeout == 0 {
            anyhow::bail!("heartbeat_timeout must be at least 1 second");
        }
        if self.poll_interval == 0 {
            anyhow::bail!("poll_interval must be at least 1 second");
        }
        if self.refresh_interval == 0 {
            anyhow::bail!("refresh_interval must be at least 1 second");
        }
        Ok(())
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn startup_grace(&self) -> Duration {
        Duration::from_secs(self.startup_grace)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval)
    }
}
