//! Actor-based concurrency for the ingest daemon
//!
//! Components communicate via message passing instead of shared state.
//!
//! # Actors
//!
//! - [`WatcherTask`]: watches the input directory and debounces new files
//! - [`IngestActor`]: the single consumer that runs files through the pipeline
//!
//! ```text
//! notify → WatcherTask ──IngestJob::File──▶ IngestActor → IngestPipeline
//!            debounce        bounded mpsc      one file at a time
//! ```
//!
//! The startup scan feeds the same queue before the watcher starts.

pub mod handle;
pub mod ingest;
pub mod message;
pub mod startup_scan;
pub mod watcher;

#[cfg(test)]
pub(crate) mod __tests__;

pub use handle::{IngestHandle, SendError};
pub use ingest::{FileOutcome, IngestActor, IngestStats, StatsSnapshot, ingest_file};
pub use message::IngestJob;
pub use watcher::{WatcherConfig, WatcherError, WatcherTask};
