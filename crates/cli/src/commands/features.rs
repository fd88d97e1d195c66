//! Feature vector inspection

use std::path::Path;

use anyhow::{Context, Result};
use pqwatch::pipeline::reader::read_signal;
use pqwatch_core::{BandStats, Config, FeatureExtractor};
use serde::Serialize;

#[derive(Serialize)]
struct FeatureReport<'a> {
  file: String,
  wavelet: &'a str,
  level: u32,
  samples: usize,
  features: &'a [f64],
  bands: Vec<BandReport>,
}

#[derive(Serialize)]
struct BandReport {
  band: String,
  energy: f64,
  entropy: f64,
}

/// Name of band `i` in `[cA_L, cD_L, ..., cD_1]` order
fn band_name(i: usize, level: u32) -> String {
  if i == 0 {
    format!("cA{}", level)
  } else {
    format!("cD{}", level as usize + 1 - i)
  }
}

pub fn cmd_features(config: &Config, file: &Path, json: bool) -> Result<()> {
  let signal = read_signal(file, &config.features.signal_column)
    .with_context(|| format!("Failed to read signal from {}", file.display()))?;
  let wavelet = config.features.wavelet_config();
  let features = FeatureExtractor::new(wavelet)
    .extract(&signal)
    .with_context(|| format!("Failed to extract features from {}", file.display()))?;

  let bands: Vec<BandReport> = features
    .bands()
    .enumerate()
    .map(|(i, BandStats { energy, entropy })| BandReport {
      band: band_name(i, wavelet.level),
      energy,
      entropy,
    })
    .collect();

  if json {
    let report = FeatureReport {
      file: file.display().to_string(),
      wavelet: wavelet.wavelet.name(),
      level: wavelet.level,
      samples: signal.len(),
      features: features.as_slice(),
      bands,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    return Ok(());
  }

  println!(
    "{} ({} samples, {} level {})",
    file.display(),
    signal.len(),
    wavelet.wavelet,
    wavelet.level
  );
  println!();
  println!("{:<6} {:>16} {:>10}", "band", "energy", "entropy");
  for band in &bands {
    println!("{:<6} {:>16.6} {:>10.6}", band.band, band.energy, band.entropy);
  }
  Ok(())
}
