//! The remote execution seam.

use async_trait::async_trait;

use crate::error::{ExecError, ExecResult};

/// Captured result of a finished remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs a structured command on a named node.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run `command` on `node` and capture its output.
    ///
    /// A non-zero exit is not an error at this level.
    async fn execute(&self, node: &str, command: &[String]) -> ExecResult<CommandOutput>;

    /// Like [`execute`](Self::execute), but a non-zero exit becomes
    /// [`ExecError::NonZeroExit`].
    async fn execute_checked(&self, node: &str, command: &[String]) -> ExecResult<CommandOutput> {
        let output = self.execute(node, command).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(ExecError::NonZeroExit {
                node: node.to_string(),
                code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}
