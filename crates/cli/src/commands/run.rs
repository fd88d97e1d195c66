//! Run command

use anyhow::{Context, Result};
use pqwatch::{Daemon, RuntimeConfig};
use pqwatch_core::{Config, config::ConfigSource};
use tracing::info;

/// Run the watch pipeline until ctrl-c
pub async fn cmd_run(config: Config, source: &ConfigSource) -> Result<()> {
  info!(config = %source, "Configuration loaded");

  let stats = Daemon::new(RuntimeConfig::new(config))
    .run()
    .await
    .context("Failed to run pipeline")?;

  info!(processed = stats.processed, failed = stats.failed, "Stopped");
  Ok(())
}
