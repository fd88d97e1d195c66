//! WatcherTask - Async directory watcher that feeds the ingest actor
//!
//! This task watches the input directory for new signal files, debounces
//! them, and sends `IngestJob::File` messages to an `IngestActor`.
//!
//! # Design
//!
//! The watcher bridges the sync notify callbacks with our async actor system:
//! 1. notify's sync callback uses `blocking_send` to forward events to a channel
//! 2. The async task consumes events from that channel
//! 3. Events are debounced so a file being written is announced once
//! 4. Settled paths are converted to `IngestJob::File` messages
//!
//! Only the watched directory itself is observed (no recursion). A path
//! becomes a candidate when it is created or renamed into the directory;
//! later writes only push its settle deadline back.
//!
//! # Lifecycle
//!
//! The watcher runs until:
//! - The `CancellationToken` is triggered
//! - The event channel closes (notify watcher dropped)
//!
//! Changes still pending at cancellation are dropped. Their files remain in
//! the directory and are picked up by the next startup scan.

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  time::{Duration, Instant},
};

use notify::{
  Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
  event::{ModifyKind, RenameMode},
};
use pqwatch_core::config::WatchConfig;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::handle::IngestHandle;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct WatcherConfig {
  /// Directory to watch
  pub dir: PathBuf,
  pub watch: WatchConfig,
}

impl WatcherConfig {
  pub fn debounce(&self) -> Duration {
    Duration::from_millis(self.watch.settle_ms.max(1))
  }

  /// Interval for notify's fallback poller
  pub fn poll_interval(&self) -> Duration {
    Duration::from_secs(self.watch.poll_interval_secs.max(1))
  }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
  #[error("Failed to initialize watcher: {0}")]
  Init(#[source] notify::Error),

  #[error("Failed to watch path: {0}")]
  Watch(#[source] notify::Error),
}

// ============================================================================
// Internal Types
// ============================================================================

/// What the watcher makes of one notify event for one path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Notice {
  /// The path just appeared in the directory
  Arrived,
  /// The path was written to
  Touched,
  /// The path left the directory
  Gone,
}

/// A candidate file waiting out the debounce window
#[derive(Debug)]
struct PendingChange {
  last_event: Instant,
}

impl PendingChange {
  fn new() -> Self {
    Self {
      last_event: Instant::now(),
    }
  }

  fn touch(&mut self) {
    self.last_event = Instant::now();
  }

  fn is_settled(&self, now: Instant, debounce: Duration) -> bool {
    now.duration_since(self.last_event) >= debounce
  }
}

fn classify(kind: &EventKind) -> Option<Notice> {
  match kind {
    EventKind::Create(_) => Some(Notice::Arrived),
    EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(Notice::Arrived),
    EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(Notice::Gone),
    EventKind::Modify(ModifyKind::Name(_)) => None,
    EventKind::Modify(_) => Some(Notice::Touched),
    EventKind::Remove(_) => Some(Notice::Gone),
    EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
  }
}

/// Apply one path-level signal to the pending map
fn record(pending: &mut HashMap<PathBuf, PendingChange>, path: &Path, notice: Notice) {
  match notice {
    Notice::Arrived => match pending.get_mut(path) {
      Some(existing) => existing.touch(),
      None => {
        pending.insert(path.to_path_buf(), PendingChange::new());
      }
    },
    Notice::Touched => {
      if let Some(existing) = pending.get_mut(path) {
        existing.touch();
      }
    }
    Notice::Gone => {
      if pending.remove(path).is_some() {
        trace!(file = %path.display(), "Pending file left the directory");
      }
    }
  }
}

fn is_hidden(path: &Path) -> bool {
  path
    .file_name()
    .and_then(|n| n.to_str())
    .is_some_and(|n| n.starts_with('.'))
}

// ============================================================================
// WatcherTask
// ============================================================================

/// Async directory watcher that sends IngestJobs to an IngestActor
///
/// # Example
///
/// ```ignore
/// let config = WatcherConfig { dir: watch_dir, watch: config.watcher.clone() };
/// let watcher = WatcherTask::new(config, ingest_handle, cancel_token)?;
/// tokio::spawn(watcher.run());
/// ```
pub struct WatcherTask {
  config: WatcherConfig,
  ingest: IngestHandle,
  cancel: CancellationToken,
  // The notify watcher must be held to keep it alive
  _watcher: RecommendedWatcher,
  // Channel receiving events from notify's sync callback
  event_rx: mpsc::Receiver<Result<Event, notify::Error>>,
}

impl WatcherTask {
  /// Create a new WatcherTask
  ///
  /// This initializes the notify subscription immediately. The task is not
  /// started until `run()` is called.
  pub fn new(config: WatcherConfig, ingest: IngestHandle, cancel: CancellationToken) -> Result<Self, WatcherError> {
    info!(dir = %config.dir.display(), "Initializing directory watcher");

    let (event_tx, event_rx) = mpsc::channel::<Result<Event, notify::Error>>(256);

    let notify_config = Config::default().with_poll_interval(config.poll_interval());

    let mut watcher = RecommendedWatcher::new(
      move |res| {
        // Runs on notify's thread; a closed channel means we are shutting down
        let _ = event_tx.blocking_send(res);
      },
      notify_config,
    )
    .map_err(WatcherError::Init)?;

    watcher
      .watch(&config.dir, RecursiveMode::NonRecursive)
      .map_err(WatcherError::Watch)?;

    Ok(Self {
      config,
      ingest,
      cancel,
      _watcher: watcher,
      event_rx,
    })
  }

  /// Spawn the watcher task and return its join handle
  pub fn spawn(
    config: WatcherConfig,
    ingest: IngestHandle,
    cancel: CancellationToken,
  ) -> Result<tokio::task::JoinHandle<()>, WatcherError> {
    let task = Self::new(config, ingest, cancel)?;
    Ok(tokio::spawn(task.run()))
  }

  /// Run the watcher task
  ///
  /// This consumes the task and runs until:
  /// - The `CancellationToken` is triggered
  /// - The event channel closes
  pub async fn run(mut self) {
    info!(dir = %self.config.dir.display(), extension = %self.config.watch.extension, "WatcherTask started");

    let mut pending: HashMap<PathBuf, PendingChange> = HashMap::new();
    let mut debounce_interval = tokio::time::interval(self.config.debounce());

    loop {
      tokio::select! {
          biased;

          _ = self.cancel.cancelled() => {
              info!("WatcherTask shutting down (cancelled)");
              break;
          }

          event = self.event_rx.recv() => {
              match event {
                  Some(Ok(event)) => self.process_event(&mut pending, event),
                  Some(Err(e)) => warn!(error = %e, "Watcher error"),
                  None => {
                      info!("WatcherTask shutting down (channel closed)");
                      break;
                  }
              }
          }

          _ = debounce_interval.tick() => {
              if !self.flush_settled(&mut pending).await {
                  info!("WatcherTask shutting down (ingest actor gone)");
                  break;
              }
          }
      }
    }

    if !pending.is_empty() {
      debug!(
        pending = pending.len(),
        "Dropping undispatched files on shutdown; they remain in the watched directory"
      );
    }

    info!(dir = %self.config.dir.display(), "WatcherTask stopped");
  }

  /// Should this path be considered at all
  fn is_candidate(&self, path: &Path) -> bool {
    !is_hidden(path) && self.config.watch.matches_extension(path)
  }

  fn process_event(&self, pending: &mut HashMap<PathBuf, PendingChange>, event: Event) {
    // A rename within the directory carries both paths: [from, to]
    if let EventKind::Modify(ModifyKind::Name(RenameMode::Both)) = event.kind
      && let [from, to] = event.paths.as_slice()
    {
      record(pending, from, Notice::Gone);
      if self.is_candidate(to) && !to.is_dir() {
        debug!(from = %from.display(), to = %to.display(), "File renamed into place");
        record(pending, to, Notice::Arrived);
      }
      return;
    }

    let Some(notice) = classify(&event.kind) else {
      trace!(kind = ?event.kind, "Ignoring event");
      return;
    };

    for path in &event.paths {
      if !self.is_candidate(path) {
        trace!(path = %path.display(), "Skipping non-matching path");
        continue;
      }
      if notice == Notice::Arrived && path.is_dir() {
        continue;
      }
      if notice == Notice::Arrived {
        debug!(file = %path.display(), "File arrived");
      }
      record(pending, path, notice);
    }
  }

  /// Dispatch settled files. Returns `false` once the actor is gone.
  async fn flush_settled(&self, pending: &mut HashMap<PathBuf, PendingChange>) -> bool {
    let now = Instant::now();
    let debounce = self.config.debounce();

    let settled: Vec<PathBuf> = pending
      .iter()
      .filter(|(_, change)| change.is_settled(now, debounce))
      .map(|(path, _)| path.clone())
      .collect();

    if settled.is_empty() {
      return true;
    }

    debug!(count = settled.len(), "Dispatching settled files");

    for path in settled {
      pending.remove(&path);
      if let Err(e) = self.ingest.file_ready(path).await {
        warn!(error = %e, "Failed to send ingest job");
        return false;
      }
    }
    true
  }
}

#[cfg(test)]
mod tests {
  use notify::event::{CreateKind, DataChange, RemoveKind};

  use super::*;

  #[test]
  fn test_classify_event_kinds() {
    assert_eq!(classify(&EventKind::Create(CreateKind::File)), Some(Notice::Arrived));
    assert_eq!(
      classify(&EventKind::Modify(ModifyKind::Name(RenameMode::To))),
      Some(Notice::Arrived)
    );
    assert_eq!(
      classify(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
      Some(Notice::Touched)
    );
    assert_eq!(classify(&EventKind::Remove(RemoveKind::File)), Some(Notice::Gone));
    assert_eq!(classify(&EventKind::Any), None);
  }

  #[test]
  fn test_writes_only_extend_known_files() {
    let mut pending = HashMap::new();
    let path = PathBuf::from("/w/a.csv");

    record(&mut pending, &path, Notice::Touched);
    assert!(pending.is_empty());

    record(&mut pending, &path, Notice::Arrived);
    let first = pending[&path].last_event;
    std::thread::sleep(Duration::from_millis(5));
    record(&mut pending, &path, Notice::Touched);
    assert!(pending[&path].last_event > first);
    assert_eq!(pending.len(), 1);

    record(&mut pending, &path, Notice::Gone);
    assert!(pending.is_empty());
  }

  #[test]
  fn test_duplicate_arrivals_coalesce() {
    let mut pending = HashMap::new();
    let path = PathBuf::from("/w/a.csv");
    record(&mut pending, &path, Notice::Arrived);
    record(&mut pending, &path, Notice::Arrived);
    assert_eq!(pending.len(), 1);
  }

  #[test]
  fn test_settle_window() {
    let change = PendingChange::new();
    let now = change.last_event;
    assert!(!change.is_settled(now, Duration::from_millis(100)));
    assert!(change.is_settled(now + Duration::from_millis(100), Duration::from_millis(100)));
  }

  #[test]
  fn test_hidden_files_are_skipped() {
    assert!(is_hidden(Path::new("/w/.a.csv.partial")));
    assert!(!is_hidden(Path::new("/w/a.csv")));
  }
}
