//! disk-monitor: fences service ports when a monitored resource stops
//! reporting heartbeats.

use anyhow::{Context, Result};
use clap::Parser;

use disk_monitor::channel::HeartbeatChannel;
use disk_monitor::cli::{init_logging, MonitorCli};
use disk_monitor::config::Config;
use disk_monitor::daemon::Monitor;
use disk_monitor::firewall::{check_root, IptablesFirewall};
use disk_monitor::pidfile::PidFile;
use disk_monitor::reconcile::Reconciler;
use disk_monitor::signal::ShutdownGuard;

fn main() -> Result<()> {
    let cli = MonitorCli::parse();
    init_logging(cli.quiet, cli.verbose, cli.logfile.as_deref())?;

    let config = cli.resolve_config()?;
    check_root()?;

    // Fork before the runtime starts; forking with live worker threads is
    // not sound.
    let _pidfile = if cli.daemonize {
        nix::unistd::daemon(false, false).context("failed to daemonize")?;
        tracing::info!("daemonized");
        Some(PidFile::create(config.pidfile.clone())?)
    } else {
        None
    };

    // Channel setup is the only fatal failure class; once the loop is
    // entered, everything logs and keeps running.
    HeartbeatChannel::create(&config.fifo)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;
    runtime.block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    let channel = HeartbeatChannel::open(&config.fifo)?;
    let _signals = ShutdownGuard::new();

    let reconciler = Reconciler::new(
        Box::new(IptablesFirewall::new()),
        config.startup_grace(),
        config.refresh_interval(),
    );

    Monitor::new(config, channel, reconciler).run().await
}
