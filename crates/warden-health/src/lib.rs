//! warden-health — health checking for a Galera cluster.
//!
//! Answers the three questions the control loop asks every iteration:
//! does the cluster have a Primary component, which nodes run their
//! database process (and at what seqno do the stopped ones sit), and
//! which nodes have stayed down long enough to warrant a host reboot.
//!
//! # Architecture
//!
//! ```text
//! ClusterStatusChecker
//!   └── StatusSource (MySQL: SHOW GLOBAL STATUS LIKE 'wsrep_cluster_status')
//! NodeProbe
//!   ├── RemoteExecutor: pgrep -x <pattern>      → Up / Down
//!   └── RemoteExecutor: cat grastate.dat        → seqno (down nodes only)
//! FailureTracker
//!   └── per-node down counter → escalation set
//! ```
//!
//! Remote and database failures never escape these components: they are
//! logged and folded into `Unhealthy` / `Down { seqno: None }`.

pub mod checker;
pub mod error;
pub mod probe;
pub mod tracker;

pub use checker::{ClusterStatusChecker, MysqlStatusSource, StatusSource};
pub use error::{ProbeError, StatusError};
pub use probe::NodeProbe;
pub use tracker::FailureTracker;
