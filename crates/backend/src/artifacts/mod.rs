//! Inference artifacts: the feature scaler and the classifier.
//!
//! Both are loaded once at startup from JSON files and are immutable
//! afterwards. [`PipelineArtifacts`] bundles them behind `Arc<dyn ...>` so
//! every pipeline invocation can share them without locking.

mod classifier;
mod scaler;

use std::{
  fmt::Debug,
  path::{Path, PathBuf},
  sync::Arc,
};

pub use classifier::{ClassifierSpec, LinearClassifier, NearestCentroid};
use pqwatch_core::{Config, FeatureVector};
pub use scaler::StandardScaler;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

/// Maps a raw feature vector onto the space the classifier was trained in
pub trait FeatureScaler: Send + Sync + Debug {
  fn input_len(&self) -> usize;
  fn transform(&self, features: &[f64]) -> Result<Vec<f64>, InferenceError>;
}

/// Maps a normalised feature vector onto a class label
pub trait Classifier: Send + Sync + Debug {
  fn input_len(&self) -> usize;
  fn classes(&self) -> &[String];
  fn predict(&self, features: &[f64]) -> Result<String, InferenceError>;
}

impl dyn FeatureScaler {
  pub fn load(path: &Path) -> Result<Arc<dyn FeatureScaler>, ArtifactLoadError> {
    let scaler: StandardScaler = read_json(path)?;
    scaler.validate().map_err(|reason| ArtifactLoadError::Invalid {
      path: path.to_path_buf(),
      reason,
    })?;
    Ok(Arc::new(scaler))
  }
}

impl dyn Classifier {
  pub fn load(path: &Path) -> Result<Arc<dyn Classifier>, ArtifactLoadError> {
    let spec: ClassifierSpec = read_json(path)?;
    spec.validate().map_err(|reason| ArtifactLoadError::Invalid {
      path: path.to_path_buf(),
      reason,
    })?;
    Ok(match spec {
      ClassifierSpec::Linear(c) => Arc::new(c),
      ClassifierSpec::NearestCentroid(c) => Arc::new(c),
    })
  }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactLoadError> {
  if !path.exists() {
    return Err(ArtifactLoadError::Missing {
      path: path.to_path_buf(),
    });
  }
  let content = std::fs::read_to_string(path).map_err(|source| ArtifactLoadError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  serde_json::from_str(&content).map_err(|source| ArtifactLoadError::Parse {
    path: path.to_path_buf(),
    source,
  })
}

// ============================================================================
// Errors
// ============================================================================

/// Fatal at startup: the pipeline must not start watching without artifacts
#[derive(Debug, thiserror::Error)]
pub enum ArtifactLoadError {
  #[error("artifact not found: {}", path.display())]
  Missing { path: PathBuf },
  #[error("failed to read artifact {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("failed to parse artifact {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
  #[error("invalid artifact {}: {reason}", path.display())]
  Invalid { path: PathBuf, reason: String },
}

/// Per-file inference failure
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
  #[error("{artifact} expects {expected} features, got {actual}")]
  DimensionMismatch {
    artifact: &'static str,
    expected: usize,
    actual: usize,
  },
  #[error("{artifact} produced a non-finite value")]
  NonFinite { artifact: &'static str },
}

// ============================================================================
// PipelineArtifacts
// ============================================================================

/// The scaler and classifier pair, shared read-only for the process lifetime
#[derive(Debug, Clone)]
pub struct PipelineArtifacts {
  scaler: Arc<dyn FeatureScaler>,
  classifier: Arc<dyn Classifier>,
}

impl PipelineArtifacts {
  pub fn new(scaler: Arc<dyn FeatureScaler>, classifier: Arc<dyn Classifier>) -> Self {
    Self { scaler, classifier }
  }

  /// Load both artifacts from the configured models directory
  pub fn load(config: &Config) -> Result<Self, ArtifactLoadError> {
    Self::load_from(&config.scaler_path(), &config.classifier_path())
  }

  pub fn load_from(scaler_path: &Path, classifier_path: &Path) -> Result<Self, ArtifactLoadError> {
    let scaler = <dyn FeatureScaler>::load(scaler_path)?;
    let classifier = <dyn Classifier>::load(classifier_path)?;
    info!(
      scaler = %scaler_path.display(),
      classifier = %classifier_path.display(),
      features = scaler.input_len(),
      classes = classifier.classes().len(),
      "Artifacts loaded"
    );
    Ok(Self::new(scaler, classifier))
  }

  /// Warn when the artifacts disagree with the configured feature length.
  ///
  /// Returns `true` when everything lines up.
  pub fn check_feature_len(&self, expected: usize) -> bool {
    let mut ok = true;
    if self.scaler.input_len() != expected {
      warn!(
        scaler = self.scaler.input_len(),
        features = expected,
        "Scaler input length does not match the configured feature length; every file will fail inference"
      );
      ok = false;
    }
    if self.classifier.input_len() != self.scaler.input_len() {
      warn!(
        scaler = self.scaler.input_len(),
        classifier = self.classifier.input_len(),
        "Classifier input length does not match the scaler output"
      );
      ok = false;
    }
    ok
  }

  /// Scale one feature vector and predict its label
  pub fn infer(&self, features: &FeatureVector) -> Result<String, InferenceError> {
    let scaled = self.scaler.transform(features.as_slice())?;
    self.classifier.predict(&scaled)
  }
}
