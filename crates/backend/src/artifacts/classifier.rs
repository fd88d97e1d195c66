//! Classifier artifacts.
//!
//! Both models are plain JSON documents tagged by `kind`:
//!
//! ```text
//! { "kind": "linear", "classes": [...], "coef": [[...]], "intercept": [...] }
//! { "kind": "nearest_centroid", "classes": [...], "centroids": [[...]] }
//! ```
//!
//! Class labels may be strings or numbers; numbers are rendered as text.

use serde::{Deserialize, Deserializer, Serialize};

use super::{Classifier, InferenceError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierSpec {
  Linear(LinearClassifier),
  NearestCentroid(NearestCentroid),
}

impl ClassifierSpec {
  pub(super) fn validate(&self) -> Result<(), String> {
    match self {
      ClassifierSpec::Linear(c) => c.validate(),
      ClassifierSpec::NearestCentroid(c) => c.validate(),
    }
  }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLabel {
  Text(String),
  Int(i64),
  Float(f64),
}

fn labels<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = Vec::<RawLabel>::deserialize(deserializer)?;
  Ok(
    raw
      .into_iter()
      .map(|label| match label {
        RawLabel::Text(s) => s,
        RawLabel::Int(i) => i.to_string(),
        RawLabel::Float(f) => f.to_string(),
      })
      .collect(),
  )
}

fn check_rows(name: &str, rows: &[Vec<f64>]) -> Result<usize, String> {
  let width = rows.first().map(Vec::len).unwrap_or(0);
  if width == 0 {
    return Err(format!("{} is empty", name));
  }
  for (i, row) in rows.iter().enumerate() {
    if row.len() != width {
      return Err(format!("{} row {} has {} entries, expected {}", name, i, row.len(), width));
    }
    if row.iter().any(|v| !v.is_finite()) {
      return Err(format!("{} row {} contains a non-finite value", name, i));
    }
  }
  Ok(width)
}

fn check_input(expected: usize, features: &[f64]) -> Result<(), InferenceError> {
  if features.len() != expected {
    return Err(InferenceError::DimensionMismatch {
      artifact: "classifier",
      expected,
      actual: features.len(),
    });
  }
  Ok(())
}

/// Index of the largest score; the first one wins on ties
fn argmax(scores: &[f64]) -> Option<usize> {
  scores
    .iter()
    .enumerate()
    .fold(None, |best: Option<(usize, f64)>, (i, &s)| match best {
      Some((_, b)) if b >= s => best,
      _ => Some((i, s)),
    })
    .map(|(i, _)| i)
}

// ============================================================================
// Linear model
// ============================================================================

/// Linear decision function `coef · x + intercept` per class.
///
/// With two classes and a single coefficient row the binary rule applies:
/// a positive score selects `classes[1]`, otherwise `classes[0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearClassifier {
  #[serde(deserialize_with = "labels")]
  pub classes: Vec<String>,
  pub coef: Vec<Vec<f64>>,
  pub intercept: Vec<f64>,
}

impl LinearClassifier {
  fn validate(&self) -> Result<(), String> {
    if self.classes.len() < 2 {
      return Err(format!("linear classifier needs at least 2 classes, got {}", self.classes.len()));
    }
    check_rows("coef", &self.coef)?;
    let binary = self.classes.len() == 2 && self.coef.len() == 1;
    if !binary && self.coef.len() != self.classes.len() {
      return Err(format!(
        "{} coefficient rows for {} classes",
        self.coef.len(),
        self.classes.len()
      ));
    }
    if self.intercept.len() != self.coef.len() {
      return Err(format!(
        "{} intercepts for {} coefficient rows",
        self.intercept.len(),
        self.coef.len()
      ));
    }
    if self.intercept.iter().any(|v| !v.is_finite()) {
      return Err("intercept contains a non-finite value".into());
    }
    Ok(())
  }

  fn scores(&self, features: &[f64]) -> Vec<f64> {
    self
      .coef
      .iter()
      .zip(&self.intercept)
      .map(|(row, b)| row.iter().zip(features).map(|(w, x)| w * x).sum::<f64>() + b)
      .collect()
  }
}

impl Classifier for LinearClassifier {
  fn input_len(&self) -> usize {
    self.coef.first().map(Vec::len).unwrap_or(0)
  }

  fn classes(&self) -> &[String] {
    &self.classes
  }

  fn predict(&self, features: &[f64]) -> Result<String, InferenceError> {
    check_input(self.input_len(), features)?;
    let scores = self.scores(features);
    if scores.iter().any(|s| !s.is_finite()) {
      return Err(InferenceError::NonFinite { artifact: "classifier" });
    }

    let index = if scores.len() == 1 {
      usize::from(scores[0] > 0.0)
    } else {
      argmax(&scores).ok_or(InferenceError::NonFinite { artifact: "classifier" })?
    };
    Ok(self.classes[index].clone())
  }
}

// ============================================================================
// Nearest centroid
// ============================================================================

/// Assigns the class whose centroid is closest in Euclidean distance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestCentroid {
  #[serde(deserialize_with = "labels")]
  pub classes: Vec<String>,
  pub centroids: Vec<Vec<f64>>,
}

impl NearestCentroid {
  fn validate(&self) -> Result<(), String> {
    if self.classes.is_empty() {
      return Err("nearest centroid classifier has no classes".into());
    }
    if self.centroids.len() != self.classes.len() {
      return Err(format!(
        "{} centroids for {} classes",
        self.centroids.len(),
        self.classes.len()
      ));
    }
    check_rows("centroids", &self.centroids)?;
    Ok(())
  }
}

impl Classifier for NearestCentroid {
  fn input_len(&self) -> usize {
    self.centroids.first().map(Vec::len).unwrap_or(0)
  }

  fn classes(&self) -> &[String] {
    &self.classes
  }

  fn predict(&self, features: &[f64]) -> Result<String, InferenceError> {
    check_input(self.input_len(), features)?;
    let negated: Vec<f64> = self
      .centroids
      .iter()
      .map(|c| -c.iter().zip(features).map(|(a, b)| (a - b) * (a - b)).sum::<f64>())
      .collect();
    if negated.iter().any(|d| !d.is_finite()) {
      return Err(InferenceError::NonFinite { artifact: "classifier" });
    }
    let index = argmax(&negated).ok_or(InferenceError::NonFinite { artifact: "classifier" })?;
    Ok(self.classes[index].clone())
  }
}
