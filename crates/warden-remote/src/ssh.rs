//! ssh transport.
//!
//! Spawns the local `ssh` client directly (no local shell). The remote
//! side of ssh always hands the command to a shell, so every argument is
//! single-quoted before being joined.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ExecError, ExecResult};
use crate::executor::{CommandOutput, RemoteExecutor};

/// [`RemoteExecutor`] backed by the OpenSSH client.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    ssh_binary: String,
    user: Option<String>,
    timeout: Duration,
}

impl SshExecutor {
    /// Create an executor using `ssh` from `PATH`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            ssh_binary: "ssh".to_string(),
            user: None,
            timeout,
        }
    }

    /// Use a specific ssh client binary.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.ssh_binary = binary.into();
        self
    }

    /// Log in as `user` instead of the ssh default.
    pub fn with_user(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Full argument vector passed to the ssh client.
    fn build_args(&self, node: &str, command: &[String]) -> Vec<String> {
        let connect_timeout = self.timeout.as_secs().max(1);
        let destination = match &self.user {
            Some(user) => format!("{user}@{node}"),
            None => node.to_string(),
        };
        let remote = command
            .iter()
            .map(|arg| shell_quote(arg))
            .collect::<Vec<_>>()
            .join(" ");

        vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={connect_timeout}"),
            "--".to_string(),
            destination,
            remote,
        ]
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn execute(&self, node: &str, command: &[String]) -> ExecResult<CommandOutput> {
        if command.is_empty() {
            return Err(ExecError::EmptyCommand(node.to_string()));
        }

        let args = self.build_args(node, command);
        debug!(%node, command = ?command, "running remote command");

        let child = Command::new(&self.ssh_binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecError::Spawn {
                node: node.to_string(),
                source,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let result = CommandOutput {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                };
                debug!(%node, exit_code = ?result.exit_code, "remote command finished");
                Ok(result)
            }
            Ok(Err(source)) => Err(ExecError::Io {
                node: node.to_string(),
                source,
            }),
            Err(_) => Err(ExecError::Timeout {
                node: node.to_string(),
                timeout: self.timeout,
            }),
        }
    }
}

/// Quote one argument for a POSIX shell.
///
/// Arguments made only of unambiguous characters pass through unchanged.
pub fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:,@%+".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
