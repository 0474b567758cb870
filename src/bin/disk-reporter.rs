//! disk-reporter: periodically touches a marker file inside a monitored
//! directory and reports its liveness to the disk-monitor fifo.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use disk_monitor::channel::HeartbeatChannel;
use disk_monitor::cli::{init_logging, ReporterCli};
use disk_monitor::pidfile::PidFile;
use disk_monitor::reporter::Reporter;
use disk_monitor::signal::ShutdownGuard;

fn main() -> Result<()> {
    let cli = ReporterCli::parse();
    init_logging(cli.quiet, cli.verbose, cli.logfile.as_deref())?;

    if !cli.monitor.is_dir() {
        // The directory may appear later (e.g., a mount); keep reporting
        // attempts going rather than refusing to start.
        tracing::warn!("monitor directory {} does not exist", cli.monitor.display());
    }

    let _pidfile = if cli.daemonize {
        let pidfile = cli
            .pidfile
            .clone()
            .context("--pidfile is required with --daemonize")?;
        nix::unistd::daemon(false, false).context("failed to daemonize")?;
        tracing::info!("daemonized");
        Some(PidFile::create(pidfile)?)
    } else {
        None
    };

    // Either side may start first; both create the fifo if it is missing.
    HeartbeatChannel::create(&cli.fifo)?;

    let reporter = Reporter::new(
        cli.fifo.clone(),
        cli.monitor.clone(),
        &cli.touchfile,
        &cli.ports,
        Duration::from_secs(cli.sleep),
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;
    runtime.block_on(async {
        let _signals = ShutdownGuard::new();
        reporter.run().await
    })
}
