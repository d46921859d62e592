//! Down-counter tracking and reboot escalation.
//!
//! Each iteration a down observation adds one to the node's counter and
//! an up observation takes one away (never below zero). A node whose
//! counter reaches the threshold is escalated. The counter is reset only
//! once the control loop confirms the reboot was issued; until then it
//! holds at the threshold and the node is escalated again.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use warden_core::NodeId;

/// Per-node down counters, owned by the control loop.
#[derive(Debug, Clone, Default)]
pub struct FailureTracker {
    counters: BTreeMap<NodeId, u32>,
    /// Escalation threshold; `None` disables escalation.
    threshold: Option<u32>,
}

impl FailureTracker {
    /// Create a tracker. A threshold of `None` (or zero) never escalates.
    pub fn new(threshold: Option<u32>) -> Self {
        Self {
            counters: BTreeMap::new(),
            threshold: threshold.filter(|t| *t > 0),
        }
    }

    /// Record one iteration's observations and return nodes to escalate.
    pub fn update(&mut self, up: &BTreeSet<NodeId>, down: &BTreeSet<NodeId>) -> BTreeSet<NodeId> {
        for node in up {
            let counter = self.counters.entry(node.clone()).or_insert(0);
            *counter = counter.saturating_sub(1);
        }

        for node in down {
            let counter = self.counters.entry(node.clone()).or_insert(0);
            *counter = match self.threshold {
                Some(threshold) => (*counter + 1).min(threshold),
                None => counter.saturating_add(1),
            };
        }

        debug!(counters = ?self.counters, "down counters updated");

        let Some(threshold) = self.threshold else {
            return BTreeSet::new();
        };

        let escalate: BTreeSet<NodeId> = self
            .counters
            .iter()
            .filter(|(_, count)| **count >= threshold)
            .map(|(node, _)| node.clone())
            .collect();

        for node in &escalate {
            warn!(%node, threshold, "node down past threshold, escalating to host reboot");
        }
        escalate
    }

    /// Reset a node's counter after its reboot has been issued.
    pub fn acknowledge(&mut self, node: &str) {
        if let Some(counter) = self.counters.get_mut(node) {
            info!(%node, previous = *counter, "down counter reset after reboot");
            *counter = 0;
        }
    }

    /// Current counter for a node (zero if never observed).
    pub fn count(&self, node: &str) -> u32 {
        self.counters.get(node).copied().unwrap_or(0)
    }

    pub fn counters(&self) -> &BTreeMap<NodeId, u32> {
        &self.counters
    }

    pub fn threshold(&self) -> Option<u32> {
        self.threshold
    }
}
