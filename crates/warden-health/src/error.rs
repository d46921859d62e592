//! Health check error types.

use std::time::Duration;

use thiserror::Error;
use warden_core::GrastateError;
use warden_remote::ExecError;

/// Errors from probing a single node.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("remote command failed: {0}")]
    Exec(#[from] ExecError),

    #[error("unreadable grastate record: {0}")]
    Grastate(#[from] GrastateError),
}

/// Errors from querying the cluster status endpoint.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("status query timed out after {0:?}")]
    Timeout(Duration),
}
