//! iptables controller, shelling out through the command abstraction.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::{parse_listing, split_rule_args, FirewallController, TaggedRule};
use crate::cmd::{args_to_strings, CommandExecutor, RealCommandExecutor};

const IPTABLES: &str = "iptables";

/// Controller for the host iptables.
pub struct IptablesFirewall {
    executor: Box<dyn CommandExecutor>,
}

impl IptablesFirewall {
    pub fn new() -> Self {
        Self {
            executor: Box::new(RealCommandExecutor::new()),
        }
    }

    pub fn with_executor(executor: Box<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    fn run(&self, args: Vec<String>) -> Result<String> {
        let output = self
            .executor
            .execute(IPTABLES, &args)
            .with_context(|| format!("failed to execute {}", IPTABLES))?;

        if output.success {
            Ok(output.stdout)
        } else {
            anyhow::bail!(
                "{} {} failed: {}",
                IPTABLES,
                args.join(" "),
                output.stderr.trim()
            )
        }
    }
}

impl Default for IptablesFirewall {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FirewallController for IptablesFirewall {
    async fn list_rules(&self) -> Result<Vec<TaggedRule>> {
        let output = self.run(args_to_strings(&["-S"]))?;
        Ok(parse_listing(&output))
    }

    async fn insert_rule(&self, body: &str) -> Result<()> {
        debug!("iptables -I {}", body);
        let mut args = vec!["-I".to_string()];
        args.extend(split_rule_args(body));
        self.run(args)?;
        Ok(())
    }

    async fn remove_rule(&self, body: &str) -> Result<()> {
        debug!("iptables -D {}", body);
        let mut args = vec!["-D".to_string()];
        args.extend(split_rule_args(body));
        self.run(args)?;
        Ok(())
    }
}

/// Check if running as root (effective UID == 0). Rule changes need it.
pub fn check_root() -> Result<()> {
    // SAFETY: geteuid() reads the effective user ID; no preconditions,
    // never fails, touches no state.
    let euid = unsafe { libc::geteuid() };

    if euid != 0 {
        anyhow::bail!("managing iptables rules requires root privileges; run with sudo")
    }
    Ok(())
}
