//! Actor handles for communicating with actors
//!
//! Handles are cheap to clone and wrap the channel sender. Ingest jobs are
//! fire-and-forget; outcomes are reported through logging and the actor's
//! counters.

use std::path::PathBuf;

use tokio::sync::mpsc;

use super::message::IngestJob;

// ============================================================================
// Ingest Handle
// ============================================================================

/// Handle to communicate with an IngestActor
#[derive(Clone, Debug)]
pub struct IngestHandle {
  pub tx: mpsc::Sender<IngestJob>,
}

impl IngestHandle {
  pub fn new(tx: mpsc::Sender<IngestJob>) -> Self {
    Self { tx }
  }

  /// Send a job, waiting for queue capacity
  pub async fn send(&self, job: IngestJob) -> Result<(), SendError> {
    self.tx.send(job).await.map_err(|_| SendError::ActorGone)
  }

  /// Queue one file for the pipeline
  pub async fn file_ready(&self, path: PathBuf) -> Result<(), SendError> {
    self.send(IngestJob::File { path }).await
  }

  /// Request the actor to shutdown after its current file
  pub async fn shutdown(&self) -> Result<(), SendError> {
    self.send(IngestJob::Shutdown).await
  }
}

// ============================================================================
// Errors
// ============================================================================

/// Error when sending to an actor
#[derive(Debug, Clone, thiserror::Error)]
pub enum SendError {
  #[error("Actor has shut down")]
  ActorGone,
}
