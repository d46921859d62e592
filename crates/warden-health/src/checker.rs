//! Cluster quorum check.
//!
//! Connects to the cluster's shared endpoint, reads
//! `wsrep_cluster_status`, and reports `Healthy` only for `Primary`.
//! Every other outcome, including connection failures, is `Unhealthy`.
//! [`ClusterStatusChecker::status`] keeps the distinction between a
//! non-Primary answer and no answer at all.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::MySqlConnectOptions;
use sqlx::{ConnectOptions, Connection};
use tracing::{debug, info, warn};

use warden_core::{ClusterState, ClusterStatus};
use warden_core::config::DatabaseConfig;

use crate::error::StatusError;

/// Value of `wsrep_cluster_status` on a node in the Primary component.
const PRIMARY: &str = "Primary";

const STATUS_QUERY: &str = "SHOW GLOBAL STATUS LIKE 'wsrep_cluster_status'";

/// Source of the raw `wsrep_cluster_status` value.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Return the status value, or `None` if the server reports none.
    async fn query_cluster_status(&self) -> Result<Option<String>, StatusError>;
}

/// [`StatusSource`] that opens a fresh MySQL connection per query.
pub struct MysqlStatusSource {
    options: MySqlConnectOptions,
    endpoint: String,
}

impl MysqlStatusSource {
    pub fn new(config: &DatabaseConfig) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password);
        Self {
            options,
            endpoint: format!("{}:{}", config.host, config.port),
        }
    }
}

#[async_trait]
impl StatusSource for MysqlStatusSource {
    async fn query_cluster_status(&self) -> Result<Option<String>, StatusError> {
        debug!(endpoint = %self.endpoint, "connecting to cluster endpoint");
        let mut conn = self.options.connect().await?;

        let row = sqlx::query_as::<_, (String, String)>(STATUS_QUERY)
            .fetch_optional(&mut conn)
            .await;

        // Close before propagating a query error.
        if let Err(e) = conn.close().await {
            debug!(endpoint = %self.endpoint, error = %e, "error closing status connection");
        }

        Ok(row?.map(|(_, value)| value))
    }
}

/// Classifies the cluster as healthy or unhealthy.
#[derive(Clone)]
pub struct ClusterStatusChecker {
    source: Arc<dyn StatusSource>,
    timeout: Duration,
}

impl ClusterStatusChecker {
    pub fn new(source: Arc<dyn StatusSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Query the endpoint, surfacing failures as errors.
    pub async fn query(&self) -> Result<ClusterStatus, StatusError> {
        let value = tokio::time::timeout(self.timeout, self.source.query_cluster_status())
            .await
            .map_err(|_| StatusError::Timeout(self.timeout))??;

        match value {
            Some(value) if value == PRIMARY => Ok(ClusterStatus::Primary),
            Some(other) => {
                warn!(status = %other, "cluster is not primary");
                Ok(ClusterStatus::NonPrimary(Some(other)))
            }
            None => {
                warn!("endpoint reported no wsrep_cluster_status");
                Ok(ClusterStatus::NonPrimary(None))
            }
        }
    }

    /// Query the endpoint; a failed query is `Unavailable`.
    pub async fn status(&self) -> ClusterStatus {
        match self.query().await {
            Ok(status) => {
                if status == ClusterStatus::Primary {
                    info!("cluster is up (primary)");
                }
                status
            }
            Err(e) => {
                warn!(error = %e, "cluster status check failed");
                ClusterStatus::Unavailable
            }
        }
    }

    /// Query the endpoint; any failure counts as `Unhealthy`.
    pub async fn check(&self) -> ClusterState {
        self.status().await.state()
    }
}
