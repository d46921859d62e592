//! warden-core — shared vocabulary for galera-warden.
//!
//! Node observations, cluster state, recovery actions, the on-disk
//! `grastate.dat` record, and the TOML configuration surface.

pub mod config;
pub mod grastate;
pub mod types;

pub use config::{ConfigError, WardenConfig};
pub use grastate::{GrastateError, GrastateRecord};
pub use types::*;
