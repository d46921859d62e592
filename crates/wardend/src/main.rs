//! wardend — the galera-warden daemon.
//!
//! Loads the cluster config, then probes, plans and repairs the Galera
//! cluster on a fixed interval until Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! WARDEN_CONFIG=/etc/galera-warden/warden.toml wardend --verbose
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use warden_control::ControlLoop;
use warden_core::WardenConfig;

const CONFIG_ENV: &str = "WARDEN_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "/etc/galera-warden/warden.toml";

#[derive(Parser)]
#[command(name = "wardend", about = "Galera cluster self-healing daemon", version)]
struct Cli {
    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "info,wardend=debug,warden_core=debug,warden_remote=debug,warden_health=debug,warden_planner=debug,warden_control=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    let path = config_path();
    let config = WardenConfig::from_file(&path)
        .with_context(|| format!("loading config from {}", path.display()))?;
    info!(
        config = %path.display(),
        nodes = ?config.nodes,
        database = %config.database.host,
        "configuration loaded"
    );

    let control = ControlLoop::from_config(&config);

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => error!(error = %e, "failed to listen for Ctrl-C, shutting down"),
        }
        let _ = shutdown_tx.send(true);
    });

    if let Err(e) = control.run(shutdown_rx).await {
        error!(error = %e, "control loop stopped on fatal error");
        return Err(e).context("control loop aborted");
    }

    info!("wardend stopped");
    Ok(())
}

fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
