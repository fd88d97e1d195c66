//! Messages accepted by the ingest actor
//!
//! The watcher and the startup scan both speak the same "file ready"
//! protocol: one `IngestJob::File` per file that should go through the
//! pipeline. The actor decides when it actually runs.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestJob {
  /// A candidate file in the watched directory
  File { path: PathBuf },
  /// Finish the current file and stop
  Shutdown,
}
