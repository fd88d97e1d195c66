//! Startup scan for files that arrived while the daemon was down

use std::{
  io,
  path::{Path, PathBuf},
  time::SystemTime,
};

use pqwatch_core::config::WatchConfig;
use tracing::{debug, info};

use super::handle::{IngestHandle, SendError};

#[derive(Debug, thiserror::Error)]
pub enum StartupScanError {
  #[error("Failed to list watched directory {}: {source}", path.display())]
  ReadDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
  #[error(transparent)]
  Send(#[from] SendError),
}

/// Candidate files already in `dir`, oldest modification time first.
///
/// Ties are broken by file name so the order is stable.
pub fn existing_files(dir: &Path, watch: &WatchConfig) -> io::Result<Vec<PathBuf>> {
  let mut files: Vec<(SystemTime, PathBuf)> = Vec::new();

  for entry in std::fs::read_dir(dir)? {
    let entry = entry?;
    let path = entry.path();
    let hidden = entry.file_name().to_string_lossy().starts_with('.');
    if hidden || !watch.matches_extension(&path) {
      continue;
    }
    // Entries can disappear between listing and stat
    let Ok(meta) = entry.metadata() else { continue };
    if !meta.is_file() {
      continue;
    }
    files.push((meta.modified().unwrap_or(SystemTime::UNIX_EPOCH), path));
  }

  files.sort();
  Ok(files.into_iter().map(|(_, path)| path).collect())
}

/// Queue every existing candidate file with the ingest actor
pub async fn enqueue_existing(dir: &Path, watch: &WatchConfig, ingest: &IngestHandle) -> Result<usize, StartupScanError> {
  let files = existing_files(dir, watch).map_err(|source| StartupScanError::ReadDir {
    path: dir.to_path_buf(),
    source,
  })?;

  let count = files.len();
  for path in files {
    debug!(file = %path.display(), "Queueing existing file");
    ingest.file_ready(path).await?;
  }

  if count > 0 {
    info!(count, dir = %dir.display(), "Queued files found at startup");
  }
  Ok(count)
}
