//! Command execution abstraction for testability.
//!
//! The reconciler's only side effects are iptables invocations. Putting them
//! behind a trait lets unit tests assert on the exact commands issued without
//! touching the host firewall.

use anyhow::Result;
use std::process::{Command, Stdio};

#[cfg(test)]
use mockall::automock;

/// Output from command execution
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Standard output from the command
    pub stdout: String,
    /// Standard error from the command
    pub stderr: String,
    /// Whether the command succeeded (exit code 0)
    pub success: bool,
}

/// Trait for command execution, allowing dependency injection for testing.
#[cfg_attr(test, automock)]
pub trait CommandExecutor: Send + Sync {
    /// Execute a command with the given arguments.
    fn execute(&self, cmd: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Real implementation that runs actual system commands.
#[derive(Debug, Clone, Default)]
pub struct RealCommandExecutor;

impl RealCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, cmd: &str, args: &[String]) -> Result<CommandOutput> {
        let output = Command::new(cmd)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        })
    }
}

/// Convert a slice of `&str` to `Vec<String>`; mockall cannot express the
/// lifetimes of `&[&str]`, so the trait takes `&[String]`.
pub fn args_to_strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_to_strings_converts() {
        assert_eq!(args_to_strings(&["-S"]), vec!["-S".to_string()]);
        assert!(args_to_strings(&[]).is_empty());
    }

    #[test]
    fn real_executor_captures_stdout() {
        let executor = RealCommandExecutor::new();
        let output = executor.execute("echo", &args_to_strings(&["-n", "hello"])).unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, "hello");
    }

    #[test]
    fn real_executor_reports_failure() {
        let executor = RealCommandExecutor::new();
        let output = executor.execute("false", &[]).unwrap();
        assert!(!output.success);
    }

    #[test]
    fn mock_executor_returns_programmed_output() {
        let mut mock = MockCommandExecutor::new();
        mock.expect_execute()
            .withf(|cmd, args| cmd == "iptables" && args == ["-S".to_string()])
            .times(1)
            .returning(|_, _| {
                Ok(CommandOutput {
                    stdout: "-P INPUT ACCEPT\n".to_string(),
                    stderr: String::new(),
                    success: true,
                })
            });

        let output = mock.execute("iptables", &args_to_strings(&["-S"])).unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, "-P INPUT ACCEPT\n");
    }
}
