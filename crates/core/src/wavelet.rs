//! Discrete wavelet transform with half-sample symmetric extension.
//!
//! Filters are the orthogonal Daubechies family. Only the scaling (low-pass
//! reconstruction) coefficients are stored; the decomposition filters are
//! derived from them:
//!
//! ```text
//! dec_lo[k] = rec_lo[F-1-k]
//! dec_hi[k] = (-1)^(k+1) * rec_lo[k]
//! ```
//!
//! A single level keeps every other sample of the full convolution, starting
//! at index 1, which yields `floor((n + F - 1) / 2)` coefficients per band.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

const HAAR: [f64; 2] = [0.7071067811865476, 0.7071067811865476];

const DB2: [f64; 4] = [
  0.48296291314469025,
  0.836516303737469,
  0.22414386804185735,
  -0.12940952255092145,
];

const DB3: [f64; 6] = [
  0.3326705529509569,
  0.8068915093133388,
  0.4598775021193313,
  -0.13501102001039084,
  -0.08544127388224149,
  0.035226291882100656,
];

const DB4: [f64; 8] = [
  0.23037781330885523,
  0.7148465705525415,
  0.6308807679295904,
  -0.02798376941698385,
  -0.18703481171888114,
  0.030841381835986965,
  0.032883011666982945,
  -0.010597401784997278,
];

/// Supported wavelet families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Wavelet {
  #[serde(alias = "db1")]
  Haar,
  Db2,
  Db3,
  #[default]
  Db4,
}

impl Wavelet {
  pub const ALL: [Wavelet; 4] = [Wavelet::Haar, Wavelet::Db2, Wavelet::Db3, Wavelet::Db4];

  pub fn name(&self) -> &'static str {
    match self {
      Wavelet::Haar => "haar",
      Wavelet::Db2 => "db2",
      Wavelet::Db3 => "db3",
      Wavelet::Db4 => "db4",
    }
  }

  fn scaling(&self) -> &'static [f64] {
    match self {
      Wavelet::Haar => &HAAR,
      Wavelet::Db2 => &DB2,
      Wavelet::Db3 => &DB3,
      Wavelet::Db4 => &DB4,
    }
  }

  pub fn filter_len(&self) -> usize {
    self.scaling().len()
  }

  pub fn filters(&self) -> FilterBank {
    let rec_lo = self.scaling();
    let dec_lo = rec_lo.iter().rev().copied().collect();
    let dec_hi = rec_lo
      .iter()
      .enumerate()
      .map(|(k, &c)| if k % 2 == 0 { -c } else { c })
      .collect();
    FilterBank { dec_lo, dec_hi }
  }

  /// Deepest useful decomposition level for a signal of `len` samples.
  ///
  /// Largest `L` with `(F - 1) * 2^L <= len`; `None` when even level 0
  /// cannot hold a single filter span.
  pub fn max_level(&self, len: usize) -> Option<u32> {
    let span = self.filter_len() - 1;
    if len < span {
      return None;
    }
    let mut level = 0u32;
    while min_len_for(span, level + 1).is_some_and(|required| required <= len) {
      level += 1;
    }
    Some(level)
  }

  /// Minimum number of samples required to decompose down to `level`.
  ///
  /// Saturates at `usize::MAX` for absurd levels.
  pub fn min_signal_len(&self, level: u32) -> usize {
    min_len_for(self.filter_len() - 1, level).unwrap_or(usize::MAX)
  }
}

fn min_len_for(span: usize, level: u32) -> Option<usize> {
  1usize.checked_shl(level).and_then(|p| p.checked_mul(span))
}

impl fmt::Display for Wavelet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for Wavelet {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "haar" | "db1" => Ok(Wavelet::Haar),
      "db2" => Ok(Wavelet::Db2),
      "db3" => Ok(Wavelet::Db3),
      "db4" => Ok(Wavelet::Db4),
      other => Err(format!("unsupported wavelet '{}' (expected haar, db1, db2, db3 or db4)", other)),
    }
  }
}

/// Decomposition filter pair for one wavelet
#[derive(Debug, Clone)]
pub struct FilterBank {
  pub dec_lo: Vec<f64>,
  pub dec_hi: Vec<f64>,
}

/// Sample `x` at `idx`, mirroring across both ends (`x[-1] = x[0]`, `x[n] = x[n-1]`).
fn symmetric_at(x: &[f64], idx: isize) -> f64 {
  let n = x.len() as isize;
  let period = 2 * n;
  let mut k = idx.rem_euclid(period);
  if k >= n {
    k = period - 1 - k;
  }
  x[k as usize]
}

/// One level of the DWT: returns `(approximation, detail)`.
///
/// `x` must be non-empty.
pub fn dwt(x: &[f64], bank: &FilterBank) -> (Vec<f64>, Vec<f64>) {
  let f = bank.dec_lo.len();
  let out_len = (x.len() + f - 1) / 2;
  let mut approx = Vec::with_capacity(out_len);
  let mut detail = Vec::with_capacity(out_len);

  for o in 0..out_len {
    let center = (2 * o + 1) as isize;
    let mut a = 0.0;
    let mut d = 0.0;
    for j in 0..f {
      let sample = symmetric_at(x, center - j as isize);
      a += bank.dec_lo[j] * sample;
      d += bank.dec_hi[j] * sample;
    }
    approx.push(a);
    detail.push(d);
  }

  (approx, detail)
}

/// Multilevel decomposition.
///
/// Returns `level + 1` bands ordered `[cA_L, cD_L, cD_{L-1}, ..., cD_1]`.
/// The caller is responsible for validating `level` against the signal length.
pub fn wavedec(x: &[f64], wavelet: Wavelet, level: u32) -> Vec<Vec<f64>> {
  let bank = wavelet.filters();
  let mut approx = x.to_vec();
  let mut details = Vec::with_capacity(level as usize);

  for _ in 0..level {
    let (a, d) = dwt(&approx, &bank);
    details.push(d);
    approx = a;
  }

  let mut bands = Vec::with_capacity(level as usize + 1);
  bands.push(approx);
  bands.extend(details.into_iter().rev());
  bands
}
