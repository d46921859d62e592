//! warden.toml configuration parser.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardenConfig {
    /// Cluster members, addressed the way ssh reaches them.
    pub nodes: Vec<String>,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
}

/// Shared cluster endpoint used for the quorum query.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Pause between iterations (e.g. "1m").
    pub interval: String,
    /// Wait after every recovery action before the next one.
    pub settle_delay: String,
    /// Upper bound on any single remote call.
    pub remote_timeout: String,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            interval: "1m".to_string(),
            settle_delay: "1m".to_string(),
            remote_timeout: "30s".to_string(),
        }
    }
}

impl TimingConfig {
    pub fn interval(&self) -> Duration {
        parse_duration(&self.interval).unwrap_or(Duration::from_secs(60))
    }

    pub fn settle_delay(&self) -> Duration {
        parse_duration(&self.settle_delay).unwrap_or(Duration::from_secs(60))
    }

    pub fn remote_timeout(&self) -> Duration {
        parse_duration(&self.remote_timeout).unwrap_or(Duration::from_secs(30))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    pub enabled: bool,
    /// Down observations (net of up observations) before a host reboot.
    pub down_threshold: u32,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            down_threshold: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Up-node count at which a cluster reporting non-Primary is treated
    /// as split and every running node is stopped. Unset or `0` disables
    /// the guard.
    pub split_brain_min_up: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub ssh_binary: String,
    pub user: Option<String>,
    pub grastate_path: String,
    /// `pgrep -x` pattern matching the database server process.
    pub process_pattern: String,
    pub bootstrap_command: Vec<String>,
    pub restart_command: Vec<String>,
    pub stop_command: Vec<String>,
    pub reboot_command: Vec<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            ssh_binary: "ssh".to_string(),
            user: None,
            grastate_path: "/var/lib/mysql/grastate.dat".to_string(),
            process_pattern: "mysqld|mariadbd".to_string(),
            bootstrap_command: vec!["galera_new_cluster".to_string()],
            restart_command: strings(&["systemctl", "restart", "mariadb"]),
            stop_command: strings(&["systemctl", "stop", "mariadb"]),
            reboot_command: strings(&["systemctl", "reboot"]),
        }
    }
}

impl WardenConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: WardenConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes.is_empty() {
            return Err(ConfigError::Invalid("node list is empty".to_string()));
        }
        let mut seen = BTreeSet::new();
        for node in &self.nodes {
            if node.trim().is_empty() {
                return Err(ConfigError::Invalid("empty node name".to_string()));
            }
            if !seen.insert(node.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate node: {node}")));
            }
        }

        if self.escalation.enabled && self.escalation.down_threshold == 0 {
            return Err(ConfigError::Invalid(
                "escalation.down_threshold must be at least 1".to_string(),
            ));
        }

        for (field, value) in [
            ("timing.interval", &self.timing.interval),
            ("timing.settle_delay", &self.timing.settle_delay),
            ("timing.remote_timeout", &self.timing.remote_timeout),
        ] {
            if parse_duration(value).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "{field}: cannot parse duration {value:?}"
                )));
            }
        }

        for (field, command) in [
            ("remote.bootstrap_command", &self.remote.bootstrap_command),
            ("remote.restart_command", &self.remote.restart_command),
            ("remote.stop_command", &self.remote.stop_command),
            ("remote.reboot_command", &self.remote.reboot_command),
        ] {
            if command.is_empty() {
                return Err(ConfigError::Invalid(format!("{field} is empty")));
            }
        }

        Ok(())
    }

    /// Effective split-brain threshold, `None` when the guard is disabled.
    pub fn split_brain_min_up(&self) -> Option<usize> {
        self.policy.split_brain_min_up.filter(|n| *n > 0)
    }

    /// Effective escalation threshold, `None` when escalation is disabled.
    pub fn down_threshold(&self) -> Option<u32> {
        self.escalation
            .enabled
            .then_some(self.escalation.down_threshold)
    }
}

/// Parse a duration string: `"500ms"`, `"30s"`, `"1m"`, or bare seconds.
///
/// Values that overflow a millisecond count are rejected.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (amount, millis_per_unit) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, 1)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1_000)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60_000)
    } else {
        (s, 1_000)
    };
    let amount: u64 = amount.trim().parse().ok()?;
    amount
        .checked_mul(millis_per_unit)
        .map(Duration::from_millis)
}

fn default_db_port() -> u16 {
    3306
}

fn strings(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
