//! Recovery planner.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use warden_core::{ClusterState, ClusterStatus, NodeId, RecoveryAction, SeqNo};

/// Overall assessment attached to a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Healthy and nothing to do.
    Steady,
    /// Actions were planned.
    Recovering,
    /// A bootstrap is needed but no down node has a known seqno.
    Unrecoverable,
    /// Reported non-Primary although at least the threshold of nodes is up.
    SplitBrainSuspected,
    /// Unhealthy, some nodes up, nothing actionable.
    Stalled,
}

/// Ordered actions for one iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub actions: Vec<RecoveryAction>,
    pub verdict: Verdict,
}

/// Turns one iteration's observations into recovery actions.
#[derive(Debug, Clone, Default)]
pub struct RecoveryPlanner {
    /// Up-node count at which an unhealthy cluster is treated as split.
    split_brain_min_up: Option<usize>,
}

impl RecoveryPlanner {
    /// Planner with the split-brain guard disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable the split-brain guard at `min_up` nodes. `None` or `Some(0)`
    /// disables it.
    pub fn with_split_brain_guard(mut self, min_up: Option<usize>) -> Self {
        self.split_brain_min_up = min_up.filter(|n| *n > 0);
        self
    }

    /// Plan the actions for one iteration.
    ///
    /// A bare [`ClusterState::Unhealthy`] is read as a reported
    /// non-Primary status.
    pub fn plan(
        &self,
        status: impl Into<ClusterStatus>,
        up: &BTreeSet<NodeId>,
        down: &BTreeMap<NodeId, Option<SeqNo>>,
        escalations: &BTreeSet<NodeId>,
    ) -> Plan {
        let status = status.into();
        let cluster = status.state();
        let cluster = if cluster == ClusterState::Healthy && up.is_empty() {
            warn!("cluster reported healthy with no node up, planning as unhealthy");
            ClusterState::Unhealthy
        } else {
            cluster
        };

        let mut actions: Vec<RecoveryAction> = escalations
            .iter()
            .map(|node| RecoveryAction::RebootHost { node: node.clone() })
            .collect();

        if status.quorum_lost()
            && let Some(min_up) = self.split_brain_min_up
            && up.len() >= min_up
        {
            warn!(
                up = up.len(),
                threshold = min_up,
                %status,
                "cluster reports no primary with nodes up, suspecting split brain"
            );
            actions.extend(
                up.iter()
                    .filter(|node| !escalations.contains(*node))
                    .map(|node| RecoveryAction::StopService { node: node.clone() }),
            );
            return Plan {
                actions,
                verdict: Verdict::SplitBrainSuspected,
            };
        }

        if cluster == ClusterState::Unhealthy && up.is_empty() {
            return match select_seed(down, escalations) {
                Some((seed, seqno)) => {
                    info!(%seed, seqno, "selected bootstrap seed");
                    actions.push(RecoveryAction::BootstrapNewCluster { seed });
                    Plan {
                        actions,
                        verdict: Verdict::Recovering,
                    }
                }
                None => Plan {
                    actions,
                    verdict: Verdict::Unrecoverable,
                },
            };
        }

        if !up.is_empty() {
            actions.extend(
                down.keys()
                    .filter(|node| !escalations.contains(*node))
                    .map(|node| RecoveryAction::RestartService { node: node.clone() }),
            );
        }

        let verdict = match (actions.is_empty(), cluster) {
            (false, _) => Verdict::Recovering,
            (true, ClusterState::Healthy) => Verdict::Steady,
            (true, ClusterState::Unhealthy) => Verdict::Stalled,
        };
        debug!(?verdict, actions = actions.len(), "plan ready");
        Plan { actions, verdict }
    }
}

/// Pick the bootstrap seed: highest known seqno, ties to the smallest id.
///
/// Nodes in `exclude` and nodes with unknown seqno are never candidates.
pub fn select_seed(
    down: &BTreeMap<NodeId, Option<SeqNo>>,
    exclude: &BTreeSet<NodeId>,
) -> Option<(NodeId, SeqNo)> {
    let mut best: Option<(&NodeId, SeqNo)> = None;
    // Ascending iteration plus a strict comparison keeps the smallest id on ties.
    for (node, seqno) in down {
        let Some(seqno) = *seqno else { continue };
        if exclude.contains(node) {
            continue;
        }
        if best.is_none_or(|(_, top)| seqno > top) {
            best = Some((node, seqno));
        }
    }
    best.map(|(node, seqno)| (node.clone(), seqno))
}
