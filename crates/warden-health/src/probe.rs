//! Per-node probe.
//!
//! Liveness comes from `pgrep` on the node. A node that is not confirmed
//! running is down; for down nodes the probe also reads `grastate.dat`
//! to learn the last committed seqno. Any failure along the way leaves
//! the seqno unknown, which keeps the node out of seed selection.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use warden_core::{GrastateRecord, NodeId, NodeObservation};
use warden_remote::{ExecError, RemoteExecutor};

use crate::error::ProbeError;

/// Probes database liveness and replication position on cluster nodes.
#[derive(Clone)]
pub struct NodeProbe {
    executor: Arc<dyn RemoteExecutor>,
    grastate_path: String,
    process_pattern: String,
}

impl NodeProbe {
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        grastate_path: impl Into<String>,
        process_pattern: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            grastate_path: grastate_path.into(),
            process_pattern: process_pattern.into(),
        }
    }

    /// Whether the database process is running on `node`.
    ///
    /// `pgrep` exits 1 when nothing matches; that is a clean "not running".
    /// Any other non-zero exit is a failed check.
    pub async fn check_liveness(&self, node: &str) -> Result<bool, ProbeError> {
        let command = vec![
            "pgrep".to_string(),
            "-x".to_string(),
            self.process_pattern.clone(),
        ];
        let output = self.executor.execute(node, &command).await?;

        match output.exit_code {
            Some(0) => Ok(!output.stdout.trim().is_empty()),
            Some(1) => Ok(false),
            code => Err(ProbeError::Exec(ExecError::NonZeroExit {
                node: node.to_string(),
                code,
                stderr: output.stderr.trim().to_string(),
            })),
        }
    }

    /// Read and parse the node's replication-state record.
    pub async fn read_grastate(&self, node: &str) -> Result<GrastateRecord, ProbeError> {
        let command = vec!["cat".to_string(), self.grastate_path.clone()];
        let output = self.executor.execute_checked(node, &command).await?;
        Ok(GrastateRecord::parse(&output.stdout)?)
    }

    /// Probe one node. Never fails; failures classify the node as down.
    pub async fn probe(&self, node: &str) -> NodeObservation {
        debug!(%node, "checking database process");
        match self.check_liveness(node).await {
            Ok(true) => {
                debug!(%node, "database process running");
                return NodeObservation::up(node);
            }
            Ok(false) => info!(%node, "database process not running"),
            Err(e) => warn!(%node, error = %e, "liveness check failed, treating node as down"),
        }

        let seqno = match self.read_grastate(node).await {
            Ok(record) => {
                if record.seqno.is_none() {
                    warn!(%node, "grastate records no seqno, node cannot seed a bootstrap");
                }
                record.seqno
            }
            Err(e) => {
                warn!(%node, error = %e, "failed to read seqno");
                None
            }
        };

        info!(%node, seqno = ?seqno, "node is down");
        NodeObservation::down(node, seqno)
    }

    /// Probe every node concurrently and join.
    ///
    /// Results are sorted by node. A probe task that panics yields a down
    /// observation with unknown seqno for its node.
    pub async fn probe_all(&self, nodes: &[NodeId]) -> Vec<NodeObservation> {
        let mut tasks = JoinSet::new();
        for node in nodes {
            let probe = self.clone();
            let node = node.clone();
            tasks.spawn(async move { probe.probe(&node).await });
        }

        let mut observations = Vec::with_capacity(nodes.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(obs) => observations.push(obs),
                Err(e) => error!(error = %e, "probe task failed"),
            }
        }

        let seen: BTreeSet<NodeId> = observations.iter().map(|o| o.node.clone()).collect();
        for node in nodes {
            if !seen.contains(node) {
                observations.push(NodeObservation::down(node.clone(), None));
            }
        }

        observations.sort_by(|a, b| a.node.cmp(&b.node));
        observations
    }
}
