//! Daemon lifecycle for the long-running ingest pipeline.
//!
//! # Architecture
//!
//! ```text
//! Daemon (Supervisor)
//!   ├── WatcherTask  (notify subscription, debounce)
//!   ├── IngestActor  (serial pipeline runs on the blocking pool)
//!   └── health ticker (this task)
//! ```
//!
//! # Lifecycle
//!
//! 1. Create the watched and processed directories
//! 2. Open the event store and ensure its schema
//! 3. Load the scaler and classifier, failing fast if either is unusable
//! 4. Spawn the `IngestActor`
//! 5. Subscribe to the watched directory, then queue files already there
//! 6. Idle on the health ticker until cancelled
//! 7. Graceful shutdown: stop the watcher, let the in-flight file finish,
//!    wait for both tasks

use std::{path::PathBuf, sync::Arc, time::Duration};

use pqwatch_core::Config;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
  actor::{
    IngestActor, StatsSnapshot, WatcherConfig, WatcherError, WatcherTask,
    startup_scan::{self, StartupScanError},
  },
  artifacts::{ArtifactLoadError, PipelineArtifacts},
  pipeline::{IngestPipeline, PipelineConfig},
  store::{EventStore, StoreError},
};

/// Exit status for a missing or unusable model artifact
pub const EXIT_ARTIFACTS: i32 = 3;

// ============================================================================
// Configuration
// ============================================================================

/// Daemon runtime configuration.
///
/// Constructed from the resolved config file after command line overrides.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
  pub config: Config,
  /// Interval between health log lines
  pub health_interval: Duration,
}

impl RuntimeConfig {
  pub fn new(config: Config) -> Self {
    Self {
      health_interval: Duration::from_secs(config.daemon.health_interval_secs.max(1)),
      config,
    }
  }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
  #[error("Failed to create directory {}: {source}", path.display())]
  CreateDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("Event store unavailable: {0}")]
  Store(#[from] StoreError),
  #[error("Model artifacts unavailable: {0}")]
  Artifacts(#[from] ArtifactLoadError),
  #[error(transparent)]
  Watcher(#[from] WatcherError),
  #[error(transparent)]
  StartupScan(#[from] StartupScanError),
}

impl DaemonError {
  /// Process exit status for this failure
  pub fn exit_code(&self) -> i32 {
    match self {
      DaemonError::Artifacts(_) => EXIT_ARTIFACTS,
      _ => 1,
    }
  }
}

// ============================================================================
// Daemon
// ============================================================================

/// The pqwatch daemon - watches a directory and classifies every new file.
///
/// # Usage
///
/// ```ignore
/// let daemon = Daemon::new(RuntimeConfig::new(config));
/// let stats = daemon.run().await?;
/// ```
pub struct Daemon {
  runtime_config: RuntimeConfig,
}

impl Daemon {
  pub fn new(runtime_config: RuntimeConfig) -> Self {
    Self { runtime_config }
  }

  /// Run until ctrl-c, returning the final counters
  pub async fn run(self) -> Result<StatsSnapshot, DaemonError> {
    let cancel = CancellationToken::new();

    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
      if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        return;
      }
      info!("Received ctrl-c, shutting down...");
      cancel_for_signal.cancel();
    });

    self.run_with_cancel(cancel).await
  }

  /// Run until `shutdown` is cancelled
  pub async fn run_with_cancel(self, shutdown: CancellationToken) -> Result<StatsSnapshot, DaemonError> {
    let config = &self.runtime_config.config;
    let paths = &config.paths;

    info!("Starting pqwatch daemon");
    info!(
      watch_dir = %paths.watch_dir.display(),
      processed_dir = %paths.processed_dir.display(),
      db = %paths.db_path.display(),
      "Paths"
    );

    for dir in [&paths.watch_dir, &paths.processed_dir] {
      std::fs::create_dir_all(dir).map_err(|source| DaemonError::CreateDir {
        path: dir.clone(),
        source,
      })?;
    }

    // Schema first, then artifacts
    let store = Arc::new(EventStore::open(&paths.db_path)?);
    let artifacts = PipelineArtifacts::load(config)?;
    artifacts.check_feature_len(config.feature_len());

    // Children stop when this function returns, on any path
    let cancel = shutdown.child_token();
    let _stop_children = cancel.clone().drop_guard();

    let pipeline = Arc::new(IngestPipeline::new(PipelineConfig::from_config(config), artifacts, store));
    let (ingest, stats, actor_task) = IngestActor::spawn(pipeline, config.watcher.queue_capacity, cancel.clone());

    // Subscribe before scanning so nothing lands in between unseen
    let watcher = WatcherTask::new(
      WatcherConfig {
        dir: paths.watch_dir.clone(),
        watch: config.watcher.clone(),
      },
      ingest.clone(),
      cancel.clone(),
    )?;

    if config.watcher.scan_on_startup {
      match startup_scan::enqueue_existing(&paths.watch_dir, &config.watcher, &ingest).await {
        Ok(_) => {}
        Err(StartupScanError::Send(_)) if cancel.is_cancelled() => {}
        Err(e) => return Err(e.into()),
      }
    }
    drop(ingest);

    let watcher_task = tokio::spawn(watcher.run());
    info!(dir = %paths.watch_dir.display(), "Monitoring folder");

    let mut health = tokio::time::interval(self.runtime_config.health_interval);
    health.tick().await;
    loop {
      tokio::select! {
          _ = cancel.cancelled() => break,
          _ = health.tick() => {
              let s = stats.snapshot();
              info!(processed = s.processed, failed = s.failed, skipped = s.skipped, "Health");
          }
      }
    }

    info!("Shutting down...");
    if let Err(e) = watcher_task.await {
      warn!(error = %e, "Watcher task ended abnormally");
    }
    if let Err(e) = actor_task.await {
      warn!(error = %e, "Ingest actor ended abnormally");
    }

    let summary = stats.snapshot();
    info!(
      processed = summary.processed,
      failed = summary.failed,
      skipped = summary.skipped,
      "Daemon shutdown complete"
    );
    Ok(summary)
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use pretty_assertions::assert_eq;

  use super::*;
  use crate::actor::__tests__::helpers::{PipelineTestContext, sine_csv, wait_for};

  #[tokio::test]
  async fn test_missing_artifacts_fail_with_distinct_status() {
    let ctx = PipelineTestContext::new();
    let mut config = ctx.config.clone();
    config.paths.db_path = ctx.root.path().join("fresh").join("events.db");

    let err = Daemon::new(RuntimeConfig::new(config.clone()))
      .run_with_cancel(CancellationToken::new())
      .await
      .unwrap_err();

    assert!(matches!(err, DaemonError::Artifacts(ArtifactLoadError::Missing { .. })));
    assert_eq!(err.exit_code(), EXIT_ARTIFACTS);
    // Schema is ensured before artifacts are loaded
    assert!(config.paths.db_path.exists());
    assert!(config.paths.processed_dir.exists());
  }

  #[tokio::test]
  async fn test_startup_scan_then_graceful_shutdown() {
    let ctx = PipelineTestContext::new();
    ctx.write_artifacts();
    ctx.drop_file("waiting.csv", &sine_csv(2048));

    let cancel = CancellationToken::new();
    let daemon = Daemon::new(RuntimeConfig::new(ctx.config.clone()));
    let task = tokio::spawn(daemon.run_with_cancel(cancel.clone()));

    let store = ctx.store.clone();
    assert!(wait_for(Duration::from_secs(10), || store.count().unwrap_or(0) == 1).await);
    assert!(ctx.processed_dir().join("waiting.csv").exists());

    cancel.cancel();
    let summary = tokio::time::timeout(Duration::from_secs(10), task)
      .await
      .unwrap()
      .unwrap()
      .unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 0);
  }

  #[tokio::test]
  async fn test_cancel_before_start_returns_cleanly() {
    let ctx = PipelineTestContext::new();
    ctx.write_artifacts();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = Daemon::new(RuntimeConfig::new(ctx.config.clone()))
      .run_with_cancel(cancel)
      .await
      .unwrap();
    assert_eq!(summary, StatsSnapshot::default());
  }
}
