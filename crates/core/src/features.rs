//! Wavelet sub-band feature extraction.
//!
//! A signal is decomposed to `level` with the configured wavelet and every
//! resulting band is summarised by two numbers:
//!
//! - energy: `Σ c_i²`
//! - Shannon entropy (bits) of the normalised squared coefficients
//!   `p_i = c_i² / Σ c_j²`, skipping zero-probability entries
//!
//! The output layout is `[E(cA_L), H(cA_L), E(cD_L), H(cD_L), ..., E(cD_1), H(cD_1)]`
//! and its length depends only on the level, never on the signal length.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
  signal::Signal,
  wavelet::{Wavelet, wavedec},
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
  #[error("signal has {len} samples but {wavelet} level {level} needs at least {required}")]
  InsufficientSignalLength {
    len: usize,
    required: usize,
    wavelet: Wavelet,
    level: u32,
  },
  #[error("band {band} produced a non-finite {quantity}")]
  NonFinite { band: usize, quantity: &'static str },
}

/// Wavelet family and decomposition depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveletConfig {
  pub wavelet: Wavelet,
  pub level: u32,
}

impl Default for WaveletConfig {
  fn default() -> Self {
    Self {
      wavelet: Wavelet::Db4,
      level: 4,
    }
  }
}

impl WaveletConfig {
  pub fn new(wavelet: Wavelet, level: u32) -> Self {
    Self { wavelet, level }
  }

  /// Number of bands produced: one approximation plus `level` details
  pub fn band_count(&self) -> usize {
    self.level as usize + 1
  }

  /// Length of every feature vector produced with this configuration
  pub fn feature_len(&self) -> usize {
    2 * self.band_count()
  }

  pub fn min_signal_len(&self) -> usize {
    self.wavelet.min_signal_len(self.level)
  }
}

/// Energy and entropy of one coefficient band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandStats {
  pub energy: f64,
  pub entropy: f64,
}

impl BandStats {
  pub fn of(coeffs: &[f64]) -> Self {
    let energy: f64 = coeffs.iter().map(|c| c * c).sum();
    if energy == 0.0 {
      return Self { energy, entropy: 0.0 };
    }

    let entropy = coeffs
      .iter()
      .map(|c| c * c / energy)
      .filter(|p| *p > 0.0)
      .map(|p| -p * p.log2())
      .sum();

    Self { energy, entropy }
  }
}

/// Fixed-length feature vector, `(energy, entropy)` per band in band order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
  pub fn from_bands(bands: &[BandStats]) -> Self {
    Self(bands.iter().flat_map(|b| [b.energy, b.entropy]).collect())
  }

  pub fn as_slice(&self) -> &[f64] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Iterate `(energy, entropy)` pairs in band order
  pub fn bands(&self) -> impl Iterator<Item = BandStats> + '_ {
    self.0.chunks_exact(2).map(|pair| BandStats {
      energy: pair[0],
      entropy: pair[1],
    })
  }
}

/// Stateless extractor bound to one wavelet configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor {
  config: WaveletConfig,
}

impl FeatureExtractor {
  pub fn new(config: WaveletConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &WaveletConfig {
    &self.config
  }

  pub fn extract(&self, signal: &Signal) -> Result<FeatureVector, FeatureError> {
    extract(signal, &self.config)
  }
}

/// Decompose `signal` and summarise every band.
///
/// The depth is validated against the signal length up front; a signal that
/// is too short is an error, never a shallower decomposition.
pub fn extract(signal: &Signal, config: &WaveletConfig) -> Result<FeatureVector, FeatureError> {
  let required = config.min_signal_len();
  if signal.len() < required {
    return Err(FeatureError::InsufficientSignalLength {
      len: signal.len(),
      required,
      wavelet: config.wavelet,
      level: config.level,
    });
  }

  let bands = wavedec(signal.samples(), config.wavelet, config.level);
  let mut stats = Vec::with_capacity(bands.len());
  for (band, coeffs) in bands.iter().enumerate() {
    let s = BandStats::of(coeffs);
    if !s.energy.is_finite() {
      return Err(FeatureError::NonFinite {
        band,
        quantity: "energy",
      });
    }
    if !s.entropy.is_finite() {
      return Err(FeatureError::NonFinite {
        band,
        quantity: "entropy",
      });
    }
    stats.push(s);
  }

  Ok(FeatureVector::from_bands(&stats))
}
