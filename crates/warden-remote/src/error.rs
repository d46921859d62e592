//! Remote execution error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while running a command on a node.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("empty command for node {0}")]
    EmptyCommand(String),

    #[error("failed to spawn transport for {node}: {source}")]
    Spawn {
        node: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error talking to {node}: {source}")]
    Io {
        node: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command on {node} timed out after {timeout:?}")]
    Timeout { node: String, timeout: Duration },

    #[error("command on {node} exited with {code:?}: {stderr}")]
    NonZeroExit {
        node: String,
        code: Option<i32>,
        stderr: String,
    },
}

pub type ExecResult<T> = Result<T, ExecError>;
