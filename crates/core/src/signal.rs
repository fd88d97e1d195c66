use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
  #[error("signal is empty")]
  Empty,
  #[error("sample {index} is not finite ({value})")]
  NonFinite { index: usize, value: f64 },
}

/// An ordered, non-empty sequence of finite samples from one input file.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal(Vec<f64>);

impl Signal {
  pub fn new(samples: Vec<f64>) -> Result<Self, SignalError> {
    if samples.is_empty() {
      return Err(SignalError::Empty);
    }
    if let Some((index, &value)) = samples.iter().enumerate().find(|(_, v)| !v.is_finite()) {
      return Err(SignalError::NonFinite { index, value });
    }
    Ok(Self(samples))
  }

  pub fn samples(&self) -> &[f64] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl TryFrom<Vec<f64>> for Signal {
  type Error = SignalError;

  fn try_from(samples: Vec<f64>) -> Result<Self, Self::Error> {
    Self::new(samples)
  }
}
