//! Applies recovery actions on cluster nodes.

use std::sync::Arc;

use tracing::{error, info, warn};

use warden_core::config::RemoteConfig;
use warden_core::{GrastateRecord, RecoveryAction};
use warden_remote::{ExecError, RemoteExecutor};

use crate::error::{ActionError, ActionResult};

/// Exit status the OpenSSH client uses for its own errors.
const SSH_ERROR_EXIT: i32 = 255;

/// Client messages for an established session torn down by the remote end.
const SESSION_DROPPED: &[&str] = &[
    "closed by remote host",
    "Connection reset",
    "Broken pipe",
    "client_loop: send disconnect",
];

/// Remote commands behind each action.
#[derive(Debug, Clone)]
pub struct ActionCommands {
    pub grastate_path: String,
    pub bootstrap: Vec<String>,
    pub restart: Vec<String>,
    pub stop: Vec<String>,
    pub reboot: Vec<String>,
}

impl From<&RemoteConfig> for ActionCommands {
    fn from(remote: &RemoteConfig) -> Self {
        Self {
            grastate_path: remote.grastate_path.clone(),
            bootstrap: remote.bootstrap_command.clone(),
            restart: remote.restart_command.clone(),
            stop: remote.stop_command.clone(),
            reboot: remote.reboot_command.clone(),
        }
    }
}

impl Default for ActionCommands {
    fn default() -> Self {
        Self::from(&RemoteConfig::default())
    }
}

/// Runs [`RecoveryAction`]s through a [`RemoteExecutor`].
#[derive(Clone)]
pub struct ActionExecutor {
    executor: Arc<dyn RemoteExecutor>,
    commands: ActionCommands,
}

impl ActionExecutor {
    pub fn new(executor: Arc<dyn RemoteExecutor>, commands: ActionCommands) -> Self {
        Self { executor, commands }
    }

    /// Apply one action.
    ///
    /// Only [`ActionError::Precondition`] is fatal. A reboot counts as
    /// issued when the command succeeds or the host drops the established
    /// session; failing to connect, timing out, or the reboot command
    /// itself failing are errors.
    pub async fn apply(&self, action: &RecoveryAction) -> ActionResult<()> {
        match action {
            RecoveryAction::BootstrapNewCluster { seed } => {
                info!(node = %seed, "initializing new cluster");
                self.mark_safe_to_bootstrap(seed).await?;
                self.run(action.kind(), seed, &self.commands.bootstrap).await
            }
            RecoveryAction::RestartService { node } => {
                info!(%node, "restarting database service");
                self.run(action.kind(), node, &self.commands.restart).await
            }
            RecoveryAction::StopService { node } => {
                warn!(%node, "stopping database service");
                self.run(action.kind(), node, &self.commands.stop).await
            }
            RecoveryAction::RebootHost { node } => {
                error!(%node, "cannot recover node, rebooting host");
                match self.run(action.kind(), node, &self.commands.reboot).await {
                    Err(ActionError::Command { source, .. }) if session_dropped(&source) => {
                        warn!(%node, error = %source, "host closed the session, reboot in progress");
                        Ok(())
                    }
                    other => other,
                }
            }
        }
    }

    /// Rewrite `safe_to_bootstrap` to 1 on the seed and verify it stuck.
    async fn mark_safe_to_bootstrap(&self, node: &str) -> ActionResult<()> {
        info!(%node, "setting safe_to_bootstrap");
        let path = &self.commands.grastate_path;
        let sed = vec![
            "sed".to_string(),
            "-i".to_string(),
            "s/^safe_to_bootstrap:.*/safe_to_bootstrap: 1/".to_string(),
            path.clone(),
        ];
        self.executor
            .execute_checked(node, &sed)
            .await
            .map_err(|e| precondition(node, e.to_string()))?;

        let cat = vec!["cat".to_string(), path.clone()];
        let output = self
            .executor
            .execute_checked(node, &cat)
            .await
            .map_err(|e| precondition(node, e.to_string()))?;
        let record =
            GrastateRecord::parse(&output.stdout).map_err(|e| precondition(node, e.to_string()))?;

        match record.safe_to_bootstrap {
            Some(true) => Ok(()),
            // Pre-3.19 Galera has no flag and bootstraps unconditionally.
            None => {
                warn!(%node, "grastate has no safe_to_bootstrap field");
                Ok(())
            }
            Some(false) => Err(precondition(node, "flag still 0 after rewrite".to_string())),
        }
    }

    async fn run(&self, action: &'static str, node: &str, command: &[String]) -> ActionResult<()> {
        self.executor
            .execute_checked(node, command)
            .await
            .map(|_| ())
            .map_err(|source| ActionError::Command {
                action,
                node: node.to_string(),
                source,
            })
    }
}

/// Whether ssh connected and the remote end then tore the session down.
fn session_dropped(err: &ExecError) -> bool {
    match err {
        ExecError::NonZeroExit {
            code: Some(SSH_ERROR_EXIT),
            stderr,
            ..
        } => {
            !stderr.contains("connect to host")
                && SESSION_DROPPED.iter().any(|marker| stderr.contains(marker))
        }
        _ => false,
    }
}

fn precondition(node: &str, reason: String) -> ActionError {
    ActionError::Precondition {
        node: node.to_string(),
        reason,
    }
}
