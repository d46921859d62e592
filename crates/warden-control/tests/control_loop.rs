//! Control loop integration tests.
//!
//! Drives `ControlLoop` against a simulated Galera cluster that answers
//! both the remote commands and the quorum query.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use warden_control::{ActionCommands, ActionExecutor, ControlLoop};
use warden_core::{ClusterState, ClusterStatus, RecoveryAction};
use warden_health::{ClusterStatusChecker, FailureTracker, NodeProbe, StatusError, StatusSource};
use warden_planner::{RecoveryPlanner, Verdict};
use warden_remote::{CommandOutput, ExecError, ExecResult, RemoteExecutor};

#[derive(Debug, Clone)]
struct SimNode {
    running: bool,
    /// `None` renders as `seqno: -1`.
    seqno: Option<i64>,
    safe_to_bootstrap: bool,
    /// Restarts leave the process down until the host is rebooted.
    wedged: bool,
    reachable: bool,
    /// ssh cannot connect for the reboot command.
    reboot_unreachable: bool,
    reboots: u32,
}

impl SimNode {
    fn stopped(seqno: Option<i64>) -> Self {
        Self {
            running: false,
            seqno,
            safe_to_bootstrap: false,
            wedged: false,
            reachable: true,
            reboot_unreachable: false,
            reboots: 0,
        }
    }

    fn running() -> Self {
        Self {
            running: true,
            ..Self::stopped(None)
        }
    }
}

#[derive(Default)]
struct SimState {
    nodes: BTreeMap<String, SimNode>,
    /// Whether some node holds a Primary component.
    primary: bool,
    sed_fails: bool,
    /// The status endpoint cannot be reached.
    status_fails: bool,
    log: Vec<String>,
}

#[derive(Clone, Default)]
struct SimCluster(Arc<Mutex<SimState>>);

impl SimCluster {
    fn with(nodes: Vec<(&str, SimNode)>, primary: bool) -> Self {
        let state = SimState {
            nodes: nodes
                .into_iter()
                .map(|(name, node)| (name.to_string(), node))
                .collect(),
            primary,
            ..SimState::default()
        };
        Self(Arc::new(Mutex::new(state)))
    }

    fn node(&self, name: &str) -> SimNode {
        self.0.lock().unwrap().nodes[name].clone()
    }

    fn log(&self) -> Vec<String> {
        self.0.lock().unwrap().log.clone()
    }

    fn set_sed_fails(&self) {
        self.0.lock().unwrap().sed_fails = true;
    }

    fn set_status_fails(&self) {
        self.0.lock().unwrap().status_fails = true;
    }

    fn set_reboot_unreachable(&self, node: &str, unreachable: bool) {
        if let Some(sim) = self.0.lock().unwrap().nodes.get_mut(node) {
            sim.reboot_unreachable = unreachable;
        }
    }
}

fn output(code: i32, stdout: impl Into<String>) -> ExecResult<CommandOutput> {
    Ok(CommandOutput {
        exit_code: Some(code),
        stdout: stdout.into(),
        stderr: String::new(),
    })
}

fn ssh_failure(stderr: String) -> ExecResult<CommandOutput> {
    Ok(CommandOutput {
        exit_code: Some(255),
        stdout: String::new(),
        stderr,
    })
}

#[async_trait]
impl RemoteExecutor for SimCluster {
    async fn execute(&self, node: &str, command: &[String]) -> ExecResult<CommandOutput> {
        let mut guard = self.0.lock().unwrap();
        let SimState {
            nodes,
            primary,
            sed_fails,
            log,
            ..
        } = &mut *guard;
        let sim = nodes.get_mut(node).expect("unknown node");
        if !sim.reachable {
            return Err(ExecError::Timeout {
                node: node.to_string(),
                timeout: Duration::from_secs(1),
            });
        }

        let program = command[0].as_str();
        let args: Vec<&str> = command[1..].iter().map(String::as_str).collect();
        let result = match (program, args.as_slice()) {
            ("pgrep", _) if sim.running => output(0, "4242\n"),
            ("pgrep", _) => output(1, ""),
            ("cat", _) => {
                let seqno = sim.seqno.unwrap_or(-1);
                let flag = u8::from(sim.safe_to_bootstrap);
                output(0, format!("version: 2.1\nseqno: {seqno}\nsafe_to_bootstrap: {flag}\n"))
            }
            ("sed", _) if *sed_fails => output(1, ""),
            ("sed", _) => {
                sim.safe_to_bootstrap = true;
                output(0, "")
            }
            ("galera_new_cluster", _) => {
                sim.running = true;
                *primary = true;
                output(0, "")
            }
            ("systemctl", ["restart", _]) if sim.wedged => output(1, ""),
            ("systemctl", ["restart", _]) => {
                sim.running = true;
                output(0, "")
            }
            ("systemctl", ["stop", _]) => {
                sim.running = false;
                output(0, "")
            }
            ("systemctl", ["reboot"]) if sim.reboot_unreachable => ssh_failure(format!(
                "ssh: connect to host {node} port 22: No route to host\n"
            )),
            ("systemctl", ["reboot"]) => {
                sim.reboots += 1;
                sim.wedged = false;
                sim.running = false;
                ssh_failure(format!("Connection to {node} closed by remote host.\n"))
            }
            _ => output(127, ""),
        };

        log.push(format!("{node}:{}", command.join(" ")));
        result
    }
}

#[async_trait]
impl StatusSource for SimCluster {
    async fn query_cluster_status(&self) -> Result<Option<String>, StatusError> {
        let state = self.0.lock().unwrap();
        if state.status_fails {
            return Err(StatusError::Timeout(Duration::from_secs(1)));
        }
        let any_running = state.nodes.values().any(|n| n.running);
        let status = if state.primary && any_running {
            "Primary"
        } else {
            "non-Primary"
        };
        Ok(Some(status.to_string()))
    }
}

fn control_loop(sim: &SimCluster, threshold: Option<u32>, split_brain: Option<usize>) -> ControlLoop {
    let nodes: Vec<String> = sim.0.lock().unwrap().nodes.keys().cloned().collect();
    let checker = ClusterStatusChecker::new(Arc::new(sim.clone()), Duration::from_secs(1));
    let probe = NodeProbe::new(
        Arc::new(sim.clone()),
        "/var/lib/mysql/grastate.dat",
        "mysqld|mariadbd",
    );
    let actions = ActionExecutor::new(Arc::new(sim.clone()), ActionCommands::default());
    ControlLoop::new(
        nodes,
        checker,
        probe,
        FailureTracker::new(threshold),
        RecoveryPlanner::new().with_split_brain_guard(split_brain),
        actions,
    )
    .with_timing(Duration::from_millis(10), Duration::ZERO)
}

fn bootstrap(seed: &str) -> RecoveryAction {
    RecoveryAction::BootstrapNewCluster {
        seed: seed.to_string(),
    }
}

fn restart(node: &str) -> RecoveryAction {
    RecoveryAction::RestartService {
        node: node.to_string(),
    }
}

fn reboot(node: &str) -> RecoveryAction {
    RecoveryAction::RebootHost {
        node: node.to_string(),
    }
}

#[tokio::test]
async fn full_outage_recovers_from_most_advanced_node() {
    let sim = SimCluster::with(
        vec![
            ("db1", SimNode::stopped(Some(10))),
            ("db2", SimNode::stopped(Some(15))),
            ("db3", SimNode::stopped(None)),
        ],
        false,
    );
    let mut control = control_loop(&sim, Some(5), None);
    let (_tx, mut rx) = watch::channel(false);

    // Iteration 1: bootstrap from db2 only.
    let report = control.run_once(&mut rx).await.unwrap();
    assert_eq!(report.cluster, ClusterState::Unhealthy);
    assert!(report.view.up.is_empty());
    assert_eq!(report.plan.actions, vec![bootstrap("db2")]);
    assert_eq!(report.applied, vec![bootstrap("db2")]);
    assert!(sim.node("db2").safe_to_bootstrap);
    assert!(!sim.node("db1").safe_to_bootstrap);
    assert!(!sim.node("db3").safe_to_bootstrap);

    // Iteration 2: db2 is primary, the rest catch up.
    let report = control.run_once(&mut rx).await.unwrap();
    assert_eq!(report.cluster, ClusterState::Healthy);
    assert_eq!(report.plan.actions, vec![restart("db1"), restart("db3")]);

    // Iteration 3: steady.
    let report = control.run_once(&mut rx).await.unwrap();
    assert!(report.plan.actions.is_empty());
    assert_eq!(report.plan.verdict, Verdict::Steady);
    // Two down observations, one up: the counters wind down by one.
    assert_eq!(control.tracker().count("db1"), 1);
    assert_eq!(control.tracker().count("db2"), 0);
}

#[tokio::test]
async fn unknown_seqno_everywhere_takes_no_action() {
    let sim = SimCluster::with(
        vec![
            ("db1", SimNode::stopped(None)),
            ("db2", SimNode::stopped(None)),
        ],
        false,
    );
    let mut control = control_loop(&sim, Some(5), None);
    let (_tx, mut rx) = watch::channel(false);

    let report = control.run_once(&mut rx).await.unwrap();
    assert!(report.plan.actions.is_empty());
    assert_eq!(report.plan.verdict, Verdict::Unrecoverable);
    // Only probes were issued.
    assert!(sim.log().iter().all(|l| l.contains("pgrep") || l.contains("cat")));
}

#[tokio::test]
async fn unreachable_node_is_down_and_not_a_seed() {
    let mut unreachable = SimNode::stopped(Some(99));
    unreachable.reachable = false;
    let sim = SimCluster::with(
        vec![("db1", unreachable), ("db2", SimNode::stopped(Some(3)))],
        false,
    );
    let mut control = control_loop(&sim, Some(5), None);
    let (_tx, mut rx) = watch::channel(false);

    let report = control.run_once(&mut rx).await.unwrap();
    assert_eq!(report.view.down.get("db1"), Some(&None));
    assert_eq!(report.plan.actions, vec![bootstrap("db2")]);
}

#[tokio::test]
async fn precondition_failure_stops_the_loop() {
    let sim = SimCluster::with(vec![("db1", SimNode::stopped(Some(7)))], false);
    sim.set_sed_fails();
    let control = control_loop(&sim, Some(5), None);
    let (_tx, rx) = watch::channel(false);

    let err = control.run(rx).await.unwrap_err();
    assert!(err.is_fatal());
    assert!(!sim.log().iter().any(|l| l.contains("galera_new_cluster")));
}

#[tokio::test]
async fn wedged_node_escalates_to_reboot_and_resets() {
    let mut wedged = SimNode::stopped(Some(5));
    wedged.wedged = true;
    let sim = SimCluster::with(
        vec![("db1", SimNode::running()), ("db2", wedged)],
        true,
    );
    let mut control = control_loop(&sim, Some(3), None);
    let (_tx, mut rx) = watch::channel(false);

    for expected in 1..=2 {
        let report = control.run_once(&mut rx).await.unwrap();
        assert_eq!(report.plan.actions, vec![restart("db2")]);
        assert_eq!(report.failed, vec![restart("db2")]);
        assert_eq!(control.tracker().count("db2"), expected);
    }

    let report = control.run_once(&mut rx).await.unwrap();
    assert_eq!(report.plan.actions, vec![reboot("db2")]);
    assert_eq!(report.applied, vec![reboot("db2")]);
    assert_eq!(sim.node("db2").reboots, 1);
    assert_eq!(control.tracker().count("db2"), 0);

    // After the reboot the node is no longer wedged and rejoins.
    let report = control.run_once(&mut rx).await.unwrap();
    assert_eq!(report.applied, vec![restart("db2")]);
    assert!(sim.node("db2").running);
}

#[tokio::test]
async fn unissued_reboot_keeps_node_escalated() {
    let mut wedged = SimNode::stopped(Some(5));
    wedged.wedged = true;
    let sim = SimCluster::with(vec![("db1", SimNode::running()), ("db2", wedged)], true);
    sim.set_reboot_unreachable("db2", true);
    let mut control = control_loop(&sim, Some(2), None);
    let (_tx, mut rx) = watch::channel(false);

    control.run_once(&mut rx).await.unwrap();
    assert_eq!(control.tracker().count("db2"), 1);

    // Escalated, but ssh never reaches the host.
    for _ in 0..2 {
        let report = control.run_once(&mut rx).await.unwrap();
        assert_eq!(report.escalations.len(), 1);
        assert_eq!(report.plan.actions, vec![reboot("db2")]);
        assert!(report.applied.is_empty());
        assert_eq!(report.failed, vec![reboot("db2")]);
        assert_eq!(control.tracker().count("db2"), 2);
    }
    assert_eq!(sim.node("db2").reboots, 0);

    // Once the host is reachable the reboot goes out and the counter resets.
    sim.set_reboot_unreachable("db2", false);
    let report = control.run_once(&mut rx).await.unwrap();
    assert_eq!(report.applied, vec![reboot("db2")]);
    assert_eq!(sim.node("db2").reboots, 1);
    assert_eq!(control.tracker().count("db2"), 0);
}

#[tokio::test]
async fn failed_status_query_never_stops_nodes() {
    let sim = SimCluster::with(
        vec![
            ("db1", SimNode::running()),
            ("db2", SimNode::running()),
            ("db3", SimNode::running()),
        ],
        true,
    );
    sim.set_status_fails();
    let mut control = control_loop(&sim, Some(5), Some(3));
    let (_tx, mut rx) = watch::channel(false);

    for _ in 0..3 {
        let report = control.run_once(&mut rx).await.unwrap();
        assert_eq!(report.status, ClusterStatus::Unavailable);
        assert_eq!(report.cluster, ClusterState::Unhealthy);
        assert!(report.plan.actions.is_empty());
        assert_eq!(report.plan.verdict, Verdict::Stalled);
    }
    assert!(["db1", "db2", "db3"].iter().all(|n| sim.node(n).running));
    assert!(!sim.log().iter().any(|l| l.contains("systemctl")));
}

#[tokio::test]
async fn reported_split_brain_stops_every_node() {
    let sim = SimCluster::with(
        vec![
            ("db1", SimNode::running()),
            ("db2", SimNode::running()),
            ("db3", SimNode::running()),
        ],
        false,
    );
    let mut control = control_loop(&sim, Some(5), Some(3));
    let (_tx, mut rx) = watch::channel(false);

    let report = control.run_once(&mut rx).await.unwrap();
    assert!(report.status.quorum_lost());
    assert_eq!(report.plan.verdict, Verdict::SplitBrainSuspected);
    assert_eq!(report.applied.len(), 3);
    assert!(["db1", "db2", "db3"].iter().all(|n| !sim.node(n).running));
}

#[tokio::test]
async fn shutdown_skips_remaining_actions() {
    let sim = SimCluster::with(
        vec![
            ("db1", SimNode::running()),
            ("db2", SimNode::stopped(Some(1))),
            ("db3", SimNode::stopped(Some(1))),
        ],
        true,
    );
    let mut control = control_loop(&sim, Some(5), None);
    let (tx, mut rx) = watch::channel(false);
    tx.send(true).unwrap();

    let report = control.run_once(&mut rx).await.unwrap();
    assert_eq!(report.plan.actions.len(), 2);
    assert!(report.applied.is_empty());
    assert!(report.interrupted);
}

#[tokio::test]
async fn run_exits_cleanly_on_shutdown() {
    let sim = SimCluster::with(
        vec![("db1", SimNode::running()), ("db2", SimNode::running())],
        true,
    );
    let control = control_loop(&sim, Some(5), None);
    let (tx, rx) = watch::channel(false);

    let handle = tokio::spawn(control.run(rx));
    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(true).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("loop did not stop")
        .expect("loop task panicked");
    assert!(result.is_ok());
}
