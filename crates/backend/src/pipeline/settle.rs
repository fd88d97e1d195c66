//! Write-completion detection.
//!
//! A file is considered complete once its size and modification time stop
//! changing for a number of consecutive observations.

use std::{
  fs, io,
  path::Path,
  thread,
  time::{Duration, Instant, SystemTime},
};

use tracing::trace;

#[derive(Debug, Clone, Copy)]
pub struct SettleConfig {
  /// Consecutive unchanged observations required
  pub checks: u32,
  pub interval: Duration,
  pub max_wait: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settle {
  Stable,
  /// Still changing when `max_wait` ran out
  TimedOut,
  /// The file no longer exists
  Vanished,
}

fn observe(path: &Path) -> io::Result<(u64, Option<SystemTime>)> {
  let meta = fs::metadata(path)?;
  Ok((meta.len(), meta.modified().ok()))
}

/// Block until `path` looks fully written. Runs on a blocking thread.
///
/// Errors other than "not found" end the wait early so the read stage can
/// report them.
pub fn wait_until_stable(path: &Path, config: &SettleConfig) -> Settle {
  let started = Instant::now();
  let mut last = match observe(path) {
    Ok(obs) => obs,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Settle::Vanished,
    Err(_) => return Settle::Stable,
  };
  let mut unchanged = 0;

  while unchanged < config.checks {
    if started.elapsed() >= config.max_wait {
      return Settle::TimedOut;
    }
    thread::sleep(config.interval);

    match observe(path) {
      Ok(obs) if obs == last => unchanged += 1,
      Ok(obs) => {
        trace!(file = %path.display(), size = obs.0, "File still changing");
        last = obs;
        unchanged = 0;
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Settle::Vanished,
      Err(_) => return Settle::Stable,
    }
  }

  Settle::Stable
}
