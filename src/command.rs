// Shell command execution for each tick
use crate::error::{ChartError, ChartResult};
use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

pub type RunFuture<'a> = Pin<Box<dyn Future<Output = ChartResult<CommandOutput>> + 'a>>;

pub trait CommandRunner {
    fn run<'a>(&'a self, command: &'a str, timeout: Duration) -> RunFuture<'a>;
}

/// Runs commands through `sh -c`, killing them when the timeout expires.
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run<'a>(&'a self, command: &'a str, timeout: Duration) -> RunFuture<'a> {
        Box::pin(async move {
            let child = Command::new("sh")
                .arg("-c")
                .arg(command)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|source| ChartError::Spawn {
                    command: command.to_string(),
                    source,
                })?;

            let output = tokio::time::timeout(timeout, child.wait_with_output())
                .await
                .map_err(|_| ChartError::Timeout {
                    command: command.to_string(),
                    timeout,
                })??;

            Ok(CommandOutput {
                success: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        })
    }
}
