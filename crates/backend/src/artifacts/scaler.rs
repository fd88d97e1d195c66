use serde::{Deserialize, Serialize};

use super::{FeatureScaler, InferenceError};

/// Per-feature standardisation: `(x - mean) / scale`.
///
/// A zero scale entry (constant feature during fitting) is treated as 1 so the
/// feature is only centred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
  pub mean: Vec<f64>,
  pub scale: Vec<f64>,
}

impl StandardScaler {
  pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, String> {
    let scaler = Self { mean, scale };
    scaler.validate()?;
    Ok(scaler)
  }

  pub(super) fn validate(&self) -> Result<(), String> {
    if self.mean.is_empty() {
      return Err("scaler has no features".into());
    }
    if self.mean.len() != self.scale.len() {
      return Err(format!(
        "mean has {} entries but scale has {}",
        self.mean.len(),
        self.scale.len()
      ));
    }
    if let Some(i) = self.mean.iter().position(|v| !v.is_finite()) {
      return Err(format!("mean[{}] is not finite", i));
    }
    if let Some(i) = self.scale.iter().position(|v| !v.is_finite()) {
      return Err(format!("scale[{}] is not finite", i));
    }
    Ok(())
  }
}

impl FeatureScaler for StandardScaler {
  fn input_len(&self) -> usize {
    self.mean.len()
  }

  fn transform(&self, features: &[f64]) -> Result<Vec<f64>, InferenceError> {
    if features.len() != self.mean.len() {
      return Err(InferenceError::DimensionMismatch {
        artifact: "scaler",
        expected: self.mean.len(),
        actual: features.len(),
      });
    }

    let scaled: Vec<f64> = features
      .iter()
      .zip(self.mean.iter().zip(&self.scale))
      .map(|(x, (mean, scale))| {
        let scale = if *scale == 0.0 { 1.0 } else { *scale };
        (x - mean) / scale
      })
      .collect();

    if scaled.iter().any(|v| !v.is_finite()) {
      return Err(InferenceError::NonFinite { artifact: "scaler" });
    }
    Ok(scaled)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_transform_standardises() {
    let scaler = StandardScaler::new(vec![1.0, 10.0], vec![2.0, 5.0]).unwrap();
    assert_eq!(scaler.transform(&[3.0, 0.0]).unwrap(), vec![1.0, -2.0]);
  }

  #[test]
  fn test_zero_scale_only_centres() {
    let scaler = StandardScaler::new(vec![4.0], vec![0.0]).unwrap();
    assert_eq!(scaler.transform(&[6.5]).unwrap(), vec![2.5]);
  }

  #[test]
  fn test_dimension_mismatch() {
    let scaler = StandardScaler::new(vec![0.0; 10], vec![1.0; 10]).unwrap();
    let err = scaler.transform(&[0.0; 8]).unwrap_err();
    assert_eq!(
      err,
      InferenceError::DimensionMismatch {
        artifact: "scaler",
        expected: 10,
        actual: 8,
      }
    );
  }

  #[test]
  fn test_rejects_inconsistent_lengths() {
    assert!(StandardScaler::new(vec![0.0, 1.0], vec![1.0]).is_err());
    assert!(StandardScaler::new(vec![], vec![]).is_err());
    assert!(StandardScaler::new(vec![f64::NAN], vec![1.0]).is_err());
  }
}
