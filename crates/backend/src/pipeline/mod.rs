//! Single-file ingestion pipeline
//!
//! Every observed file runs through five ordered stages:
//!
//! ```text
//! Extract → Transform → Infer → Log → Archive
//!   csv      features    model   sqlite  move
//! ```
//!
//! The file's location is its state. It starts `Incoming` in the watched
//! directory; the archive move makes it `Processed`. A failure in the first
//! three stages leaves it `FailedInPlace`, or `Quarantined` when a failed
//! directory is configured. A failed log append is retried and then ignored
//! so the file is still archived and never reprocessed in a loop.

pub mod archive;
pub mod reader;
pub mod settle;

use std::{
  fmt,
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use pqwatch_core::{ClassificationEvent, Config, FeatureError, FeatureExtractor, WaveletConfig};
use tracing::{debug, info, warn};

pub use self::{
  reader::MalformedInput,
  settle::{Settle, SettleConfig},
};
use crate::{
  artifacts::{InferenceError, PipelineArtifacts},
  store::{EventStore, StoreError},
};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct PipelineConfig {
  pub signal_column: String,
  pub wavelet: WaveletConfig,
  pub processed_dir: PathBuf,
  /// Quarantine for stage 1-3 failures; `None` leaves them in place
  pub failed_dir: Option<PathBuf>,
  pub append_retries: u32,
  pub retry_backoff: Duration,
  pub settle: SettleConfig,
}

impl PipelineConfig {
  pub fn from_config(config: &Config) -> Self {
    Self {
      signal_column: config.features.signal_column.clone(),
      wavelet: config.features.wavelet_config(),
      processed_dir: config.paths.processed_dir.clone(),
      failed_dir: config.paths.failed_dir.clone(),
      append_retries: config.store.append_retries,
      retry_backoff: Duration::from_millis(config.store.retry_backoff_ms),
      settle: SettleConfig {
        checks: config.watcher.stable_checks,
        interval: Duration::from_millis(config.watcher.stable_interval_ms),
        max_wait: Duration::from_millis(config.watcher.max_settle_ms),
      },
    }
  }
}

// ============================================================================
// Stages and states
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Extract,
  Transform,
  Infer,
  Log,
  Archive,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Stage::Extract => "extract",
      Stage::Transform => "transform",
      Stage::Infer => "infer",
      Stage::Log => "log",
      Stage::Archive => "archive",
    })
  }
}

/// Where a file ended up after one `process` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
  /// Still in the watched directory and eligible for another attempt
  Incoming,
  Processed,
  FailedInPlace,
  Quarantined,
}

impl fmt::Display for FileState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      FileState::Incoming => "incoming",
      FileState::Processed => "processed",
      FileState::FailedInPlace => "failed-in-place",
      FileState::Quarantined => "quarantined",
    })
  }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StageError {
  #[error("malformed input: {0}")]
  MalformedInput(#[from] MalformedInput),
  #[error("feature extraction failed: {0}")]
  FeatureExtraction(#[from] FeatureError),
  #[error("inference failed: {0}")]
  Inference(#[from] InferenceError),
  #[error("persistence failed: {0}")]
  Persistence(#[from] StoreError),
  #[error("archive failed: {0}")]
  Archive(#[source] std::io::Error),
}

/// A per-file failure, attributed to the file and the stage that failed
#[derive(Debug, thiserror::Error)]
#[error("{file}: {stage} stage failed ({state}): {source}")]
pub struct PipelineError {
  pub file: String,
  pub stage: Stage,
  pub state: FileState,
  #[source]
  pub source: StageError,
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct Processed {
  pub event: ClassificationEvent,
  /// Row id, or `None` when the append failed after all retries
  pub event_id: Option<i64>,
  pub archived_to: PathBuf,
}

// ============================================================================
// IngestPipeline
// ============================================================================

/// Drives one file through extract, transform, infer, log and archive.
///
/// Stateless apart from its shared collaborators, so a single instance can
/// be reused for every file.
#[derive(Debug, Clone)]
pub struct IngestPipeline {
  config: PipelineConfig,
  extractor: FeatureExtractor,
  artifacts: PipelineArtifacts,
  store: Arc<EventStore>,
}

impl IngestPipeline {
  pub fn new(config: PipelineConfig, artifacts: PipelineArtifacts, store: Arc<EventStore>) -> Self {
    Self {
      extractor: FeatureExtractor::new(config.wavelet),
      config,
      artifacts,
      store,
    }
  }

  /// Block until the file at `path` looks completely written
  pub fn wait_for_write(&self, path: &Path) -> Settle {
    settle::wait_until_stable(path, &self.config.settle)
  }

  /// Run all stages for one file. Blocking; call from a blocking thread.
  pub fn process(&self, path: &Path) -> Result<Processed, PipelineError> {
    let filename = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| path.display().to_string());
    debug!(file = %filename, "Processing file");

    let signal = reader::read_signal(path, &self.config.signal_column)
      .map_err(|e| self.reject(path, &filename, Stage::Extract, e.into()))?;

    let features = self
      .extractor
      .extract(&signal)
      .map_err(|e| self.reject(path, &filename, Stage::Transform, e.into()))?;

    let label = self
      .artifacts
      .infer(&features)
      .map_err(|e| self.reject(path, &filename, Stage::Infer, e.into()))?;

    let event = ClassificationEvent::new(filename.clone(), label);
    let event_id = self.append_with_retry(&event);

    let archived_to = archive::move_into(path, &self.config.processed_dir).map_err(|e| {
      warn!(
        file = %filename,
        stage = %Stage::Archive,
        label = %event.label,
        error = %e,
        "Archive failed, file stays in the watched directory"
      );
      PipelineError {
        file: filename.clone(),
        stage: Stage::Archive,
        state: FileState::Incoming,
        source: StageError::Archive(e),
      }
    })?;

    info!(
      file = %filename,
      label = %event.label,
      samples = signal.len(),
      state = %FileState::Processed,
      "Classified"
    );

    Ok(Processed {
      event,
      event_id,
      archived_to,
    })
  }

  /// Append with bounded retries. Failure is reported, never propagated.
  fn append_with_retry(&self, event: &ClassificationEvent) -> Option<i64> {
    let attempts = self.config.append_retries + 1;
    for attempt in 1..=attempts {
      match self.store.append(event) {
        Ok(id) => return Some(id),
        Err(e) if attempt < attempts => {
          debug!(file = %event.filename, attempt, error = %e, "Event append failed, retrying");
          std::thread::sleep(self.config.retry_backoff);
        }
        Err(e) => {
          let e = StageError::Persistence(e);
          warn!(
            file = %event.filename,
            label = %event.label,
            timestamp = %event.timestamp_rfc3339(),
            stage = %Stage::Log,
            attempts,
            error = %e,
            "Classification not logged, archiving anyway"
          );
        }
      }
    }
    None
  }

  /// Apply the dead-letter policy for a stage 1-3 failure
  fn reject(&self, path: &Path, filename: &str, stage: Stage, source: StageError) -> PipelineError {
    let state = match &self.config.failed_dir {
      _ if matches!(&source, StageError::MalformedInput(e) if e.is_not_found()) => FileState::Incoming,
      Some(dir) => match archive::move_into(path, dir) {
        Ok(_) => FileState::Quarantined,
        Err(e) => {
          warn!(file = %filename, error = %e, "Quarantine move failed, leaving file in place");
          FileState::FailedInPlace
        }
      },
      None => FileState::FailedInPlace,
    };

    warn!(file = %filename, stage = %stage, state = %state, error = %source, "File rejected");

    PipelineError {
      file: filename.to_string(),
      stage,
      state,
      source,
    }
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use pretty_assertions::assert_eq;

  use super::*;
  use crate::actor::__tests__::helpers::{PipelineTestContext, sine_csv};

  #[test]
  fn test_valid_file_is_logged_and_archived() {
    let ctx = PipelineTestContext::new();
    let content = sine_csv(4096);
    let path = ctx.drop_file("a.csv", &content);

    let processed = ctx.pipeline().process(&path).unwrap();

    assert!(!processed.event.label.is_empty());
    assert_eq!(processed.event.filename, "a.csv");
    assert!(processed.event_id.is_some());
    assert!(!path.exists());
    assert_eq!(fs::read_to_string(&processed.archived_to).unwrap(), content);
    assert_eq!(ctx.store.count().unwrap(), 1);
  }

  #[test]
  fn test_header_only_file_stays_in_place() {
    let ctx = PipelineTestContext::new();
    let path = ctx.drop_file("empty.csv", "signal\n");

    let err = ctx.pipeline().process(&path).unwrap_err();

    assert_eq!(err.stage, Stage::Extract);
    assert_eq!(err.state, FileState::FailedInPlace);
    assert!(matches!(err.source, StageError::MalformedInput(MalformedInput::NoRows)));
    assert!(path.exists());
    assert_eq!(ctx.store.count().unwrap(), 0);
  }

  #[test]
  fn test_short_signal_fails_transform() {
    let ctx = PipelineTestContext::new();
    let path = ctx.drop_file("short.csv", &sine_csv(50));

    let err = ctx.pipeline().process(&path).unwrap_err();
    assert_eq!(err.stage, Stage::Transform);
    assert!(matches!(
      err.source,
      StageError::FeatureExtraction(FeatureError::InsufficientSignalLength { len: 50, required: 112, .. })
    ));
    assert!(path.exists());
  }

  #[test]
  fn test_dimension_mismatch_fails_infer() {
    let mut ctx = PipelineTestContext::new();
    ctx.config.features.level = 3;
    let path = ctx.drop_file("a.csv", &sine_csv(4096));

    let err = ctx.pipeline().process(&path).unwrap_err();
    assert_eq!(err.stage, Stage::Infer);
    assert!(matches!(
      err.source,
      StageError::Inference(InferenceError::DimensionMismatch { expected: 10, actual: 8, .. })
    ));
    assert!(path.exists());
    assert_eq!(ctx.store.count().unwrap(), 0);
  }

  #[test]
  fn test_failed_file_is_quarantined_when_configured() {
    let mut ctx = PipelineTestContext::new();
    let failed = ctx.root.path().join("failed");
    ctx.config.paths.failed_dir = Some(failed.clone());
    let path = ctx.drop_file("bad.csv", "voltage\n1\n2\n");

    let err = ctx.pipeline().process(&path).unwrap_err();
    assert_eq!(err.state, FileState::Quarantined);
    assert!(!path.exists());
    assert!(failed.join("bad.csv").exists());
  }

  #[test]
  fn test_vanished_file_is_not_quarantined() {
    let mut ctx = PipelineTestContext::new();
    ctx.config.paths.failed_dir = Some(ctx.root.path().join("failed"));
    let path = ctx.watch_dir().join("ghost.csv");

    let err = ctx.pipeline().process(&path).unwrap_err();
    assert_eq!(err.state, FileState::Incoming);
    assert!(!ctx.root.path().join("failed").exists());
  }

  #[test]
  fn test_log_failure_still_archives() {
    let ctx = PipelineTestContext::new();
    let conn = rusqlite::Connection::open(ctx.db_path()).unwrap();
    conn.execute_batch("DROP TABLE events;").unwrap();
    let path = ctx.drop_file("a.csv", &sine_csv(4096));

    let processed = ctx.pipeline().process(&path).unwrap();
    assert_eq!(processed.event_id, None);
    assert!(!path.exists());
    assert!(processed.archived_to.exists());
  }

  #[test]
  fn test_same_name_is_replaced_in_archive() {
    let ctx = PipelineTestContext::new();
    let pipeline = ctx.pipeline();

    let first = ctx.drop_file("dup.csv", &sine_csv(4096));
    pipeline.process(&first).unwrap();
    let second = ctx.drop_file("dup.csv", &sine_csv(2048));
    let processed = pipeline.process(&second).unwrap();

    assert_eq!(fs::read_to_string(processed.archived_to).unwrap(), sine_csv(2048));
    assert_eq!(ctx.store.count().unwrap(), 2);
  }
}
