//! warden-remote — run commands on cluster nodes.
//!
//! Commands are structured argument lists, never shell strings built by
//! the caller. The [`RemoteExecutor`] trait is the seam the probe and
//! action executor depend on; [`SshExecutor`] is the production transport.
//!
//! # Failure model
//!
//! ```text
//! execute()          → Ok(CommandOutput)   any exit status
//!                    → Err(ExecError)      spawn failure, timeout
//! execute_checked()  → Err(NonZeroExit)    exit status != 0
//! ```
//!
//! Every call is bounded by the executor's timeout; a child that outlives
//! it is killed.

pub mod error;
pub mod executor;
pub mod ssh;

pub use error::{ExecError, ExecResult};
pub use executor::{CommandOutput, RemoteExecutor};
pub use ssh::SshExecutor;
