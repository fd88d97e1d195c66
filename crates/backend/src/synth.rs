//! Synthetic power-quality signals for demos and simulated traffic.
//!
//! A clean 50 Hz sine sampled at 3.2 kHz, optionally carrying one
//! disturbance over a random window.

use std::{fmt, io, path::Path, str::FromStr};

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disturbance {
  Normal,
  Sag,
  Swell,
  Harmonics,
  Interruption,
  Transient,
}

impl Disturbance {
  pub const ALL: [Disturbance; 6] = [
    Disturbance::Normal,
    Disturbance::Sag,
    Disturbance::Swell,
    Disturbance::Harmonics,
    Disturbance::Interruption,
    Disturbance::Transient,
  ];

  pub fn name(self) -> &'static str {
    match self {
      Disturbance::Normal => "normal",
      Disturbance::Sag => "sag",
      Disturbance::Swell => "swell",
      Disturbance::Harmonics => "harmonics",
      Disturbance::Interruption => "interruption",
      Disturbance::Transient => "transient",
    }
  }
}

impl fmt::Display for Disturbance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for Disturbance {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Disturbance::ALL
      .into_iter()
      .find(|d| d.name().eq_ignore_ascii_case(s.trim()))
      .ok_or_else(|| {
        let names: Vec<_> = Disturbance::ALL.iter().map(|d| d.name()).collect();
        format!("unknown disturbance '{}', expected one of: {}", s, names.join(", "))
      })
  }
}

#[derive(Debug, Clone, Copy)]
pub struct SynthConfig {
  pub frequency_hz: f64,
  pub sample_rate_hz: f64,
  pub samples: usize,
  pub amplitude: f64,
  /// Peak of the uniform noise added to every sample
  pub noise: f64,
}

impl Default for SynthConfig {
  fn default() -> Self {
    Self {
      frequency_hz: 50.0,
      sample_rate_hz: 3200.0,
      samples: 4096,
      amplitude: 1.0,
      noise: 0.01,
    }
  }
}

/// Generate one signal of the given kind
pub fn generate<R: Rng>(kind: Disturbance, config: &SynthConfig, rng: &mut R) -> Vec<f64> {
  let n = config.samples;
  let w = 2.0 * std::f64::consts::PI * config.frequency_hz / config.sample_rate_hz;

  // Disturbance window covers 10-50% of the signal
  let len = if n == 0 { 0 } else { rng.gen_range((n / 10).max(1)..=(n / 2).max(1)) };
  let start = rng.gen_range(0..=n - len);
  let in_window = |i: usize| i >= start && i < start + len;

  let depth = match kind {
    Disturbance::Sag => rng.gen_range(0.1..0.9),
    Disturbance::Swell => rng.gen_range(1.1..1.8),
    Disturbance::Interruption => rng.gen_range(0.0..0.1),
    _ => 1.0,
  };
  let harmonics: [(f64, f64); 3] = [
    (3.0, rng.gen_range(0.05..0.15)),
    (5.0, rng.gen_range(0.05..0.15)),
    (7.0, rng.gen_range(0.02..0.1)),
  ];
  let transient_freq = rng.gen_range(300.0..900.0) * 2.0 * std::f64::consts::PI / config.sample_rate_hz;
  let transient_peak = rng.gen_range(0.5..1.5);
  let transient_decay = rng.gen_range(20.0..60.0);

  (0..n)
    .map(|i| {
      let t = i as f64;
      let mut v = (w * t).sin();
      match kind {
        Disturbance::Sag | Disturbance::Swell | Disturbance::Interruption if in_window(i) => v *= depth,
        Disturbance::Harmonics => {
          v += harmonics.iter().map(|(h, a)| a * (h * w * t).sin()).sum::<f64>();
        }
        Disturbance::Transient if i >= start => {
          let dt = (i - start) as f64;
          v += transient_peak * (-dt / transient_decay).exp() * (transient_freq * dt).sin();
        }
        _ => {}
      }
      let noise = if config.noise > 0.0 {
        rng.gen_range(-config.noise..config.noise)
      } else {
        0.0
      };
      config.amplitude * v + noise
    })
    .collect()
}

/// Write samples as a single-column CSV with a `signal` header
pub fn write_csv(path: &Path, samples: &[f64]) -> io::Result<()> {
  let mut writer = csv::Writer::from_path(path)?;
  writer.write_record(["signal"])?;
  for v in samples {
    writer.write_record([v.to_string()])?;
  }
  writer.flush()
}
