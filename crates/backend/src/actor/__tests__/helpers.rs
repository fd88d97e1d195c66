//! Test helpers for actor and pipeline tests.
//!
//! Provides `PipelineTestContext`, which owns a temporary root holding the
//! watched, processed and models directories plus an event database, and
//! builds pipelines and actors wired to them.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use pqwatch_core::Config;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
  actor::{IngestActor, IngestHandle, IngestStats},
  artifacts::{ClassifierSpec, NearestCentroid, PipelineArtifacts, StandardScaler},
  pipeline::{IngestPipeline, PipelineConfig},
  store::EventStore,
};

/// Number of features produced by the default db4 / level 4 configuration
pub const FEATURES: usize = 10;

pub struct PipelineTestContext {
  pub root: TempDir,
  /// Paths point into `root`; timings are shortened for tests
  pub config: Config,
  pub store: Arc<EventStore>,
}

impl PipelineTestContext {
  pub fn new() -> Self {
    let root = TempDir::new().expect("create temp root");

    let mut config = Config::default();
    config.paths.watch_dir = root.path().join("incoming");
    config.paths.processed_dir = root.path().join("processed");
    config.paths.models_dir = root.path().join("models");
    config.paths.db_path = root.path().join("db").join("events.db");
    config.watcher.settle_ms = 50;
    config.watcher.stable_checks = 2;
    config.watcher.stable_interval_ms = 10;
    config.watcher.max_settle_ms = 500;
    config.store.retry_backoff_ms = 1;

    std::fs::create_dir_all(&config.paths.watch_dir).expect("create watch dir");
    let store = Arc::new(EventStore::open(&config.paths.db_path).expect("open store"));

    Self { root, config, store }
  }

  pub fn watch_dir(&self) -> &Path {
    &self.config.paths.watch_dir
  }

  pub fn processed_dir(&self) -> &Path {
    &self.config.paths.processed_dir
  }

  pub fn db_path(&self) -> &Path {
    &self.config.paths.db_path
  }

  /// Write a file straight into the watched directory
  pub fn drop_file(&self, name: &str, content: &str) -> PathBuf {
    let path = self.watch_dir().join(name);
    std::fs::write(&path, content).expect("write input file");
    path
  }

  /// Identity scaler plus a nearest-centroid model that calls a unit sine "normal"
  pub fn artifacts(&self) -> PipelineArtifacts {
    let (scaler, classifier) = test_models();
    PipelineArtifacts::new(Arc::new(scaler), Arc::new(classifier))
  }

  /// Persist the test models where `PipelineArtifacts::load` expects them
  pub fn write_artifacts(&self) {
    let (scaler, classifier) = test_models();
    std::fs::create_dir_all(&self.config.paths.models_dir).expect("create models dir");
    std::fs::write(
      self.config.scaler_path(),
      serde_json::to_string(&scaler).expect("serialize scaler"),
    )
    .expect("write scaler");
    std::fs::write(
      self.config.classifier_path(),
      serde_json::to_string(&ClassifierSpec::NearestCentroid(classifier)).expect("serialize classifier"),
    )
    .expect("write classifier");
  }

  pub fn pipeline(&self) -> IngestPipeline {
    IngestPipeline::new(
      PipelineConfig::from_config(&self.config),
      self.artifacts(),
      self.store.clone(),
    )
  }

  /// Spawn an IngestActor over a fresh pipeline
  pub fn spawn_actor(&self) -> (IngestHandle, Arc<IngestStats>, JoinHandle<()>, CancellationToken) {
    let cancel = CancellationToken::new();
    let (handle, stats, task) = IngestActor::spawn(Arc::new(self.pipeline()), 16, cancel.clone());
    (handle, stats, task, cancel)
  }
}

fn test_models() -> (StandardScaler, NearestCentroid) {
  let scaler = StandardScaler::new(vec![0.0; FEATURES], vec![1.0; FEATURES]).expect("valid scaler");
  let classifier = NearestCentroid {
    classes: vec!["normal".to_string(), "disturbance".to_string()],
    centroids: vec![vec![0.0; FEATURES], vec![1e9; FEATURES]],
  };
  (scaler, classifier)
}

/// Single-column CSV holding `n` samples of a unit sine
pub fn sine_csv(n: usize) -> String {
  let mut out = String::from("signal\n");
  for i in 0..n {
    let v = (2.0 * std::f64::consts::PI * 50.0 * i as f64 / 3200.0).sin();
    out.push_str(&format!("{v}\n"));
  }
  out
}

/// Poll `cond` until it holds or `timeout` expires
pub async fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
  let deadline = tokio::time::Instant::now() + timeout;
  while tokio::time::Instant::now() < deadline {
    if cond() {
      return true;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
  }
  cond()
}
