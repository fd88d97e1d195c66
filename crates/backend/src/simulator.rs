//! Traffic simulator: an external producer stand-in that drops CSV files
//! into the watched directory at random intervals.
//!
//! Files are written under a hidden temporary name and renamed into place,
//! so the watcher only ever sees complete files.

use std::{
  path::{Path, PathBuf},
  time::{Duration, SystemTime, UNIX_EPOCH},
};

use rand::{Rng, seq::SliceRandom};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::synth::{self, Disturbance, SynthConfig};

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
  /// Directory of CSV files to copy from; `None` synthesises signals
  pub source_dir: Option<PathBuf>,
  pub dest_dir: PathBuf,
  pub min_delay: Duration,
  pub max_delay: Duration,
  /// Stop after this many files; `None` runs until cancelled
  pub count: Option<u64>,
  pub synth: SynthConfig,
}

impl SimulatorConfig {
  pub fn new(dest_dir: PathBuf) -> Self {
    Self {
      source_dir: None,
      dest_dir,
      min_delay: Duration::from_secs(2),
      max_delay: Duration::from_secs(5),
      count: None,
      synth: SynthConfig::default(),
    }
  }
}

#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
  #[error("No CSV files found in {}", dir.display())]
  NoSources { dir: PathBuf },
  #[error("I/O error on {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("Blocking task failed: {0}")]
  Join(#[from] tokio::task::JoinError),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SimulatorError + '_ {
  move |source| SimulatorError::Io {
    path: path.to_path_buf(),
    source,
  }
}

#[derive(Debug, Clone)]
enum Source {
  Files(Vec<PathBuf>),
  Synthetic,
}

pub struct Simulator {
  config: SimulatorConfig,
  source: Source,
}

impl Simulator {
  pub fn new(config: SimulatorConfig) -> Result<Self, SimulatorError> {
    let source = match &config.source_dir {
      Some(dir) => {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err(dir))? {
          let path = entry.map_err(io_err(dir))?.path();
          let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
          if is_csv && path.is_file() {
            files.push(path);
          }
        }
        if files.is_empty() {
          return Err(SimulatorError::NoSources { dir: dir.clone() });
        }
        files.sort();
        Source::Files(files)
      }
      None => Source::Synthetic,
    };

    std::fs::create_dir_all(&config.dest_dir).map_err(io_err(&config.dest_dir))?;
    Ok(Self { config, source })
  }

  /// Number of source files, or `None` in synthetic mode
  pub fn source_count(&self) -> Option<usize> {
    match &self.source {
      Source::Files(files) => Some(files.len()),
      Source::Synthetic => None,
    }
  }

  /// Drop one file into the destination directory. Blocking.
  pub fn drop_one<R: Rng>(&self, rng: &mut R) -> Result<PathBuf, SimulatorError> {
    let millis = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .map(|d| d.as_millis())
      .unwrap_or_default();

    let (base_name, tmp) = match &self.source {
      Source::Files(files) => {
        let Some(src) = files.choose(rng) else {
          return Err(SimulatorError::NoSources {
            dir: self.config.source_dir.clone().unwrap_or_default(),
          });
        };
        let base = src.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let tmp = self.config.dest_dir.join(format!(".{}_{}.partial", millis, base));
        std::fs::copy(src, &tmp).map_err(io_err(src))?;
        (base, tmp)
      }
      Source::Synthetic => {
        let kind = Disturbance::ALL[rng.gen_range(0..Disturbance::ALL.len())];
        let base = format!("{}.csv", kind);
        let tmp = self.config.dest_dir.join(format!(".{}_{}.partial", millis, base));
        let samples = synth::generate(kind, &self.config.synth, rng);
        synth::write_csv(&tmp, &samples).map_err(io_err(&tmp))?;
        (base, tmp)
      }
    };

    let dest = self.config.dest_dir.join(format!("{}_{}", millis, base_name));
    std::fs::rename(&tmp, &dest).map_err(io_err(&dest))?;
    Ok(dest)
  }

  fn next_delay<R: Rng>(&self, rng: &mut R) -> Duration {
    let min = self.config.min_delay.as_millis() as u64;
    let max = (self.config.max_delay.as_millis() as u64).max(min);
    Duration::from_millis(rng.gen_range(min..=max))
  }

  /// Drop files until cancelled or `count` is reached, returning how many were written
  pub async fn run(self, cancel: CancellationToken) -> Result<u64, SimulatorError> {
    info!(
      dest = %self.config.dest_dir.display(),
      sources = ?self.source_count(),
      "Simulator started"
    );

    let sim = std::sync::Arc::new(self);
    let mut written = 0u64;

    loop {
      if sim.config.count.is_some_and(|n| written >= n) {
        break;
      }

      let worker = sim.clone();
      match tokio::task::spawn_blocking(move || worker.drop_one(&mut rand::thread_rng())).await? {
        Ok(path) => {
          written += 1;
          info!(file = %path.display(), "Uploaded event");
        }
        Err(e) => warn!(error = %e, "Failed to drop file"),
      }

      if sim.config.count.is_some_and(|n| written >= n) {
        break;
      }

      let delay = sim.next_delay(&mut rand::thread_rng());
      tokio::select! {
          _ = cancel.cancelled() => break,
          _ = tokio::time::sleep(delay) => {}
      }
    }

    info!(written, "Simulator stopped");
    Ok(written)
  }
}
