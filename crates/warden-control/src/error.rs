//! Action execution error types.

use thiserror::Error;
use warden_remote::ExecError;

/// Errors that can occur while applying a recovery action.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The seed could not be marked safe to bootstrap. Fatal.
    #[error("cannot mark {node} safe to bootstrap: {reason}")]
    Precondition { node: String, reason: String },

    #[error("{action} on {node} failed: {source}")]
    Command {
        action: &'static str,
        node: String,
        #[source]
        source: ExecError,
    },
}

impl ActionError {
    /// Whether the control loop must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ActionError::Precondition { .. })
    }
}

pub type ActionResult<T> = Result<T, ActionError>;
