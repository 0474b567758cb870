//! CLI argument parsing with clap, plus subscriber setup shared by both
//! binaries.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;

/// The monitor daemon.
#[derive(Parser, Debug)]
#[command(name = "disk-monitor")]
#[command(author, version, about = "Blocks service ports for resources whose heartbeats stop")]
pub struct MonitorCli {
    /// Config file path (YAML); flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Set the pidfile (written when daemonized)
    #[arg(short, long)]
    pub pidfile: Option<PathBuf>,

    /// Log to this file
    #[arg(short, long)]
    pub logfile: Option<PathBuf>,

    /// Set the fifo to listen to
    #[arg(short, long)]
    pub fifo: Option<PathBuf>,

    /// Daemonize
    #[arg(short, long)]
    pub daemonize: bool,

    /// Elapsed seconds between heartbeats before a resource is marked down
    #[arg(short = 'b', long = "heartbeat")]
    pub heartbeat_timeout: Option<u64>,

    /// Seconds from start of the daemon to wait before updating iptables
    #[arg(short = 'w', long = "wait")]
    pub startup_grace: Option<u64>,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbose mode (debug output)
    #[arg(short, long)]
    pub verbose: bool,
}

impl MonitorCli {
    /// Resolve the effective config: file values first, then flag overrides.
    pub fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(fifo) = &self.fifo {
            config.fifo = fifo.clone();
        }
        if let Some(pidfile) = &self.pidfile {
            config.pidfile = pidfile.clone();
        }
        if let Some(secs) = self.heartbeat_timeout {
            config.heartbeat_timeout = secs;
        }
        if let Some(secs) = self.startup_grace {
            config.startup_grace = secs;
        }

        config.validate()?;
        Ok(config)
    }
}

/// The reporter companion: touches a marker file in the monitored directory
/// and emits one heartbeat per interval.
#[derive(Parser, Debug)]
#[command(name = "disk-reporter")]
#[command(author, version, about = "Reports liveness of a monitored directory")]
pub struct ReporterCli {
    /// Set the pidfile (required when daemonized)
    #[arg(short, long)]
    pub pidfile: Option<PathBuf>,

    /// Log to this file
    #[arg(short, long)]
    pub logfile: Option<PathBuf>,

    /// Set the fifo to report to
    #[arg(short, long, default_value = "/var/run/disk-monitor.fifo")]
    pub fifo: PathBuf,

    /// Daemonize
    #[arg(short, long)]
    pub daemonize: bool,

    /// Directory to monitor
    #[arg(short, long)]
    pub monitor: PathBuf,

    /// Ports to close if the directory is not responsive (comma-separated)
    #[arg(short = 'P', long, value_delimiter = ',', required = true)]
    pub ports: Vec<u16>,

    /// Seconds to sleep between each report
    #[arg(short, long, default_value_t = 1)]
    pub sleep: u64,

    /// File to touch in the monitored directory
    #[arg(short, long, default_value = ".diskmonitor")]
    pub touchfile: String,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbose mode (debug output)
    #[arg(short, long)]
    pub verbose: bool,
}

/// Install the global subscriber: `-v` maps to DEBUG, `-q` to ERROR, the
/// default is INFO. With a logfile, lines are appended there instead of
/// stdout, without ANSI colors.
pub fn init_logging(quiet: bool, verbose: bool, logfile: Option<&Path>) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else if quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false);

    match logfile {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let subscriber = builder
                .with_ansi(false)
                .with_writer(std::sync::Arc::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        None => {
            let subscriber = builder.finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}
