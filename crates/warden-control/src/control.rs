//! Control loop — probe, plan, execute, sleep.
//!
//! The loop owns the only cross-iteration state (the failure tracker)
//! and holds no decision logic of its own.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use warden_core::{ClusterState, ClusterStatus, ClusterView, NodeId, RecoveryAction, WardenConfig};
use warden_health::{ClusterStatusChecker, FailureTracker, MysqlStatusSource, NodeProbe};
use warden_planner::{Plan, RecoveryPlanner, Verdict};
use warden_remote::SshExecutor;

use crate::actions::{ActionCommands, ActionExecutor};
use crate::error::ActionResult;

/// What one iteration saw and did.
#[derive(Debug, Clone)]
pub struct IterationReport {
    pub iteration: u64,
    /// What the status endpoint answered.
    pub status: ClusterStatus,
    pub cluster: ClusterState,
    pub view: ClusterView,
    pub escalations: BTreeSet<NodeId>,
    pub plan: Plan,
    /// Actions that completed successfully, in order.
    pub applied: Vec<RecoveryAction>,
    /// Actions that were attempted and failed (non-fatally).
    pub failed: Vec<RecoveryAction>,
    /// Whether shutdown interrupted the action sequence.
    pub interrupted: bool,
}

/// Drives the recovery cycle on a fixed interval.
pub struct ControlLoop {
    nodes: Vec<NodeId>,
    checker: ClusterStatusChecker,
    probe: NodeProbe,
    tracker: FailureTracker,
    planner: RecoveryPlanner,
    actions: ActionExecutor,
    interval: Duration,
    settle_delay: Duration,
    iteration: u64,
}

impl ControlLoop {
    pub fn new(
        nodes: Vec<NodeId>,
        checker: ClusterStatusChecker,
        probe: NodeProbe,
        tracker: FailureTracker,
        planner: RecoveryPlanner,
        actions: ActionExecutor,
    ) -> Self {
        Self {
            nodes,
            checker,
            probe,
            tracker,
            planner,
            actions,
            interval: Duration::from_secs(60),
            settle_delay: Duration::from_secs(60),
            iteration: 0,
        }
    }

    /// Set the pause between iterations and the delay after each action.
    pub fn with_timing(mut self, interval: Duration, settle_delay: Duration) -> Self {
        self.interval = interval;
        self.settle_delay = settle_delay;
        self
    }

    /// Assemble the production loop: ssh for nodes, MySQL for quorum.
    pub fn from_config(config: &WardenConfig) -> Self {
        let remote_timeout = config.timing.remote_timeout();
        let executor = Arc::new(
            SshExecutor::new(remote_timeout)
                .with_binary(config.remote.ssh_binary.clone())
                .with_user(config.remote.user.clone()),
        );

        let checker = ClusterStatusChecker::new(
            Arc::new(MysqlStatusSource::new(&config.database)),
            remote_timeout,
        );
        let probe = NodeProbe::new(
            executor.clone(),
            config.remote.grastate_path.clone(),
            config.remote.process_pattern.clone(),
        );
        let tracker = FailureTracker::new(config.down_threshold());
        let planner = RecoveryPlanner::new().with_split_brain_guard(config.split_brain_min_up());
        let actions = ActionExecutor::new(executor, ActionCommands::from(&config.remote));

        Self::new(config.nodes.clone(), checker, probe, tracker, planner, actions)
            .with_timing(config.timing.interval(), config.timing.settle_delay())
    }

    pub fn tracker(&self) -> &FailureTracker {
        &self.tracker
    }

    /// Run until shutdown is signalled or a fatal error occurs.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> ActionResult<()> {
        info!(
            nodes = ?self.nodes,
            interval_secs = self.interval.as_secs(),
            settle_secs = self.settle_delay.as_secs(),
            threshold = ?self.tracker.threshold(),
            "control loop started"
        );

        loop {
            let report = self.run_once(&mut shutdown).await?;
            if report.interrupted {
                break;
            }

            info!(interval_secs = self.interval.as_secs(), "sleeping until next iteration");
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("control loop shutting down");
        Ok(())
    }

    /// Run a single iteration.
    ///
    /// Returns `Err` only for a fatal action error.
    pub async fn run_once(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ActionResult<IterationReport> {
        self.iteration += 1;
        let iteration = self.iteration;
        info!(iteration, "{}", "#".repeat(40));

        let status = self.checker.status().await;
        let cluster = status.state();

        let observations = self.probe.probe_all(&self.nodes).await;
        let view = ClusterView::from_observations(observations);
        info!(
            %cluster,
            %status,
            up = ?view.up,
            down = ?view.down,
            "cluster view"
        );

        let escalations = self.tracker.update(&view.up, &view.down_nodes());
        info!(counters = ?self.tracker.counters(), "down counters");

        let plan = self
            .planner
            .plan(status.clone(), &view.up, &view.down, &escalations);
        log_plan(&plan);

        let mut report = IterationReport {
            iteration,
            status,
            cluster,
            view,
            escalations,
            plan: plan.clone(),
            applied: Vec::new(),
            failed: Vec::new(),
            interrupted: false,
        };

        for action in &plan.actions {
            if *shutdown.borrow() {
                warn!(%action, "shutdown requested, skipping remaining actions");
                report.interrupted = true;
                break;
            }

            match self.actions.apply(action).await {
                Ok(()) => {
                    if let RecoveryAction::RebootHost { node } = action {
                        self.tracker.acknowledge(node);
                    }
                    report.applied.push(action.clone());
                }
                Err(e) if e.is_fatal() => {
                    error!(%action, error = %e, "fatal precondition failure, stopping");
                    return Err(e);
                }
                Err(e) => {
                    // An unissued reboot leaves the counter at threshold.
                    error!(%action, error = %e, "recovery action failed");
                    report.failed.push(action.clone());
                }
            }

            if !self.settle(action, shutdown).await {
                report.interrupted = true;
                break;
            }
        }

        Ok(report)
    }

    /// Wait out the settle delay. Returns `false` if shutdown arrived.
    async fn settle(&self, action: &RecoveryAction, shutdown: &mut watch::Receiver<bool>) -> bool {
        if self.settle_delay.is_zero() {
            return !*shutdown.borrow();
        }
        debug!(%action, settle_secs = self.settle_delay.as_secs(), "waiting for node to settle");
        tokio::select! {
            _ = tokio::time::sleep(self.settle_delay) => true,
            _ = shutdown.changed() => false,
        }
    }
}

fn log_plan(plan: &Plan) {
    let actions: Vec<String> = plan.actions.iter().map(ToString::to_string).collect();
    match plan.verdict {
        Verdict::Steady => info!("cluster healthy, nothing to do"),
        Verdict::Recovering => info!(?actions, "recovery planned"),
        Verdict::Unrecoverable => error!(
            ?actions,
            "cluster down and no node has a known seqno, cannot bootstrap this iteration"
        ),
        Verdict::SplitBrainSuspected => warn!(?actions, "split brain suspected"),
        Verdict::Stalled => warn!("cluster unhealthy but no action available"),
    }
}
