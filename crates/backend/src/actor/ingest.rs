//! IngestActor - serial consumer of "file ready" jobs
//!
//! The actor owns the receiving end of the job channel and runs one file at
//! a time through the [`IngestPipeline`] on tokio's blocking pool. Keeping a
//! single consumer means pipeline stages never overlap across files, so
//! event append order matches processing order.
//!
//! # Lifecycle
//!
//! The actor runs until one of:
//! - The CancellationToken is triggered
//! - An IngestJob::Shutdown message is received
//! - The job channel is closed
//!
//! Cancellation is only observed between files: a file that has started
//! always reaches a terminal state before the actor stops.

use std::{
  path::{Path, PathBuf},
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
  },
};

use serde::Serialize;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{handle::IngestHandle, message::IngestJob};
use crate::pipeline::{IngestPipeline, PipelineError, Processed, Settle};

// ============================================================================
// Counters
// ============================================================================

/// Running totals, shared with the daemon's health ticker
#[derive(Debug, Default)]
pub struct IngestStats {
  processed: AtomicU64,
  failed: AtomicU64,
  skipped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
  pub processed: u64,
  pub failed: u64,
  /// Files that disappeared before they could be read
  pub skipped: u64,
}

impl IngestStats {
  pub fn snapshot(&self) -> StatsSnapshot {
    StatsSnapshot {
      processed: self.processed.load(Ordering::Relaxed),
      failed: self.failed.load(Ordering::Relaxed),
      skipped: self.skipped.load(Ordering::Relaxed),
    }
  }

  fn record(&self, outcome: &FileOutcome) {
    let counter = match outcome {
      FileOutcome::Processed(_) => &self.processed,
      FileOutcome::Failed(_) => &self.failed,
      FileOutcome::Vanished => &self.skipped,
    };
    counter.fetch_add(1, Ordering::Relaxed);
  }
}

/// Terminal state of one job
#[derive(Debug)]
pub enum FileOutcome {
  Processed(Processed),
  Failed(PipelineError),
  Vanished,
}

/// Wait for the file to settle, then run the pipeline. Blocking.
pub fn ingest_file(pipeline: &IngestPipeline, path: &Path) -> FileOutcome {
  match pipeline.wait_for_write(path) {
    Settle::Stable => {}
    Settle::TimedOut => {
      warn!(file = %path.display(), "File still changing after settle timeout, processing anyway");
    }
    Settle::Vanished => {
      debug!(file = %path.display(), "File gone before processing, skipping");
      return FileOutcome::Vanished;
    }
  }

  match pipeline.process(path) {
    Ok(processed) => FileOutcome::Processed(processed),
    Err(e) => FileOutcome::Failed(e),
  }
}

// ============================================================================
// IngestActor
// ============================================================================

pub struct IngestActor {
  pipeline: Arc<IngestPipeline>,
  job_rx: mpsc::Receiver<IngestJob>,
  cancel: CancellationToken,
  stats: Arc<IngestStats>,
}

impl IngestActor {
  pub fn new(
    pipeline: Arc<IngestPipeline>,
    job_rx: mpsc::Receiver<IngestJob>,
    cancel: CancellationToken,
    stats: Arc<IngestStats>,
  ) -> Self {
    Self {
      pipeline,
      job_rx,
      cancel,
      stats,
    }
  }

  /// Spawn the actor with a bounded queue of `capacity` jobs
  pub fn spawn(
    pipeline: Arc<IngestPipeline>,
    capacity: usize,
    cancel: CancellationToken,
  ) -> (IngestHandle, Arc<IngestStats>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let stats = Arc::new(IngestStats::default());
    let actor = Self::new(pipeline, rx, cancel, stats.clone());
    let task = tokio::spawn(actor.run());
    (IngestHandle::new(tx), stats, task)
  }

  /// Main actor loop
  pub async fn run(mut self) {
    info!("IngestActor started");

    loop {
      tokio::select! {
          biased;

          _ = self.cancel.cancelled() => {
              info!("IngestActor shutting down (cancelled)");
              break;
          }

          job = self.job_rx.recv() => {
              match job {
                  Some(IngestJob::File { path }) => self.handle_file(path).await,
                  Some(IngestJob::Shutdown) => {
                      info!("IngestActor shutting down (requested)");
                      break;
                  }
                  None => {
                      info!("IngestActor shutting down (channel closed)");
                      break;
                  }
              }
          }
      }
    }

    let queued = self.job_rx.len();
    if queued > 0 {
      debug!(queued, "Leaving queued files for the next startup scan");
    }

    let stats = self.stats.snapshot();
    info!(
      processed = stats.processed,
      failed = stats.failed,
      skipped = stats.skipped,
      "IngestActor stopped"
    );
  }

  async fn handle_file(&self, path: PathBuf) {
    let pipeline = self.pipeline.clone();
    let file = path.clone();
    let result = tokio::task::spawn_blocking(move || ingest_file(&pipeline, &file)).await;

    match result {
      Ok(outcome) => self.stats.record(&outcome),
      Err(e) => {
        error!(file = %path.display(), error = %e, "Pipeline task panicked");
        self.stats.failed.fetch_add(1, Ordering::Relaxed);
      }
    }
  }
}
