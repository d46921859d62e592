//! warden-planner — decides what to do about an unhealthy cluster.
//!
//! Pure decision logic: no I/O, no clocks. Given the cluster state, the
//! up/down partition, and the nodes escalated by the failure tracker, it
//! returns an ordered list of recovery actions.
//!
//! # Precedence
//!
//! ```text
//! 1. RebootHost        every escalated node; nothing else for it
//! 2. StopService       endpoint reports non-Primary with up count >=
//!                      split-brain threshold (off unless configured)
//! 3. BootstrapNewCluster
//!                      unhealthy, nothing up: highest known seqno,
//!                      ties to the smallest node id; unknown seqno never seeds
//! 4. RestartService    something up: every remaining down node, ascending
//! ```
//!
//! Seeding a new cluster from a node with an unknown position could
//! silently discard committed transactions, so rule 3 emits nothing
//! rather than guess.

pub mod planner;

pub use planner::{Plan, RecoveryPlanner, Verdict, select_seed};
