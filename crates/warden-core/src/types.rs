//! Domain types shared by the probe, planner, and control loop.
//!
//! Observations are produced fresh every iteration. The only state that
//! outlives an iteration is the per-node down counter, which lives in
//! `warden-health`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identifier for a cluster member (hostname or address).
pub type NodeId = String;

/// Last durable replication position recorded by a node.
pub type SeqNo = i64;

// ── Observations ───────────────────────────────────────────────────

/// Liveness of a node's database process at probe time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Up,
    /// Not running. `seqno` is `None` when the position is unknown.
    Down { seqno: Option<SeqNo> },
}

/// Result of probing a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeObservation {
    pub node: NodeId,
    pub state: NodeState,
}

impl NodeObservation {
    pub fn up(node: impl Into<NodeId>) -> Self {
        Self {
            node: node.into(),
            state: NodeState::Up,
        }
    }

    pub fn down(node: impl Into<NodeId>, seqno: Option<SeqNo>) -> Self {
        Self {
            node: node.into(),
            state: NodeState::Down { seqno },
        }
    }

    pub fn is_up(&self) -> bool {
        self.state == NodeState::Up
    }
}

/// Quorum status of the cluster as seen through its shared endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterState {
    /// The endpoint reports a Primary component.
    Healthy,
    Unhealthy,
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterState::Healthy => f.write_str("healthy"),
            ClusterState::Unhealthy => f.write_str("unhealthy"),
        }
    }
}

/// What the status endpoint answered in one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterStatus {
    /// `wsrep_cluster_status` is `Primary`.
    Primary,
    /// The endpoint answered with another value, or with no row.
    NonPrimary(Option<String>),
    /// The endpoint could not be queried.
    Unavailable,
}

impl ClusterStatus {
    pub fn state(&self) -> ClusterState {
        match self {
            ClusterStatus::Primary => ClusterState::Healthy,
            ClusterStatus::NonPrimary(_) | ClusterStatus::Unavailable => ClusterState::Unhealthy,
        }
    }

    /// Whether the cluster itself reported losing its Primary component.
    ///
    /// An unreachable endpoint says nothing about quorum.
    pub fn quorum_lost(&self) -> bool {
        matches!(self, ClusterStatus::NonPrimary(_))
    }
}

impl From<ClusterState> for ClusterStatus {
    fn from(state: ClusterState) -> Self {
        match state {
            ClusterState::Healthy => ClusterStatus::Primary,
            ClusterState::Unhealthy => ClusterStatus::NonPrimary(None),
        }
    }
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterStatus::Primary => f.write_str("Primary"),
            ClusterStatus::NonPrimary(Some(value)) => f.write_str(value),
            ClusterStatus::NonPrimary(None) => f.write_str("<none>"),
            ClusterStatus::Unavailable => f.write_str("unavailable"),
        }
    }
}

/// Up/down partition of one iteration's observations.
///
/// Ordered collections keep every downstream decision deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterView {
    pub up: BTreeSet<NodeId>,
    pub down: BTreeMap<NodeId, Option<SeqNo>>,
}

impl ClusterView {
    pub fn from_observations<I>(observations: I) -> Self
    where
        I: IntoIterator<Item = NodeObservation>,
    {
        let mut view = ClusterView::default();
        for obs in observations {
            match obs.state {
                NodeState::Up => {
                    view.up.insert(obs.node);
                }
                NodeState::Down { seqno } => {
                    view.down.insert(obs.node, seqno);
                }
            }
        }
        view
    }

    /// Nodes observed down, in ascending order.
    pub fn down_nodes(&self) -> BTreeSet<NodeId> {
        self.down.keys().cloned().collect()
    }
}

// ── Actions ────────────────────────────────────────────────────────

/// A corrective step produced by the planner for one iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Mark `seed` safe to bootstrap and start a new cluster from it.
    BootstrapNewCluster { seed: NodeId },
    /// Restart the database service so the node rejoins the cluster.
    RestartService { node: NodeId },
    /// Reboot the host after the node failed to recover for too long.
    RebootHost { node: NodeId },
    /// Stop the database service (split-brain guard).
    StopService { node: NodeId },
}

impl RecoveryAction {
    /// The node this action targets.
    pub fn node(&self) -> &NodeId {
        match self {
            RecoveryAction::BootstrapNewCluster { seed } => seed,
            RecoveryAction::RestartService { node }
            | RecoveryAction::RebootHost { node }
            | RecoveryAction::StopService { node } => node,
        }
    }

    /// Short action label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            RecoveryAction::BootstrapNewCluster { .. } => "bootstrap",
            RecoveryAction::RestartService { .. } => "restart",
            RecoveryAction::RebootHost { .. } => "reboot",
            RecoveryAction::StopService { .. } => "stop",
        }
    }
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.node())
    }
}
