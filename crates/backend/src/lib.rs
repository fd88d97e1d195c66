//! pqwatch backend: model artifacts, the event store, the per-file ingest
//! pipeline, the watcher and ingest actors, and the daemon that ties them
//! together.

pub mod actor;
pub mod artifacts;
pub mod pipeline;
pub mod simulator;
pub mod store;
pub mod synth;

pub mod dirs;

mod daemon;
pub use daemon::{Daemon, DaemonError, EXIT_ARTIFACTS, RuntimeConfig};
pub use pqwatch_core::{config, event};
