//! warden-control — the self-healing loop.
//!
//! # Iteration
//!
//! ```text
//! ClusterStatusChecker.status()       → ClusterStatus
//! NodeProbe.probe_all()  (concurrent) → ClusterView { up, down }
//! FailureTracker.update()             → escalations
//! RecoveryPlanner.plan()              → Plan
//! ActionExecutor.apply() (sequential) → settle delay after each action
//! sleep(interval)
//! ```
//!
//! Shutdown is honoured only at the settle and interval sleeps, never in
//! the middle of a remote call. A failed bootstrap precondition is the
//! one error that stops the loop.

pub mod actions;
pub mod control;
pub mod error;

pub use actions::{ActionCommands, ActionExecutor};
pub use control::{ControlLoop, IterationReport};
pub use error::{ActionError, ActionResult};
