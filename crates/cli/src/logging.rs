//! Logging setup for CLI commands and the long-running pipeline

use std::path::{Path, PathBuf};

use pqwatch::dirs;
use pqwatch_core::config::DaemonConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Build the filter from the configured level, letting RUST_LOG override it
fn env_filter(daemon: &DaemonConfig) -> EnvFilter {
  EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new(&daemon.log_level))
    .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize logging for one-shot commands (stderr, so stdout stays clean)
pub fn init_cli_logging(daemon: &DaemonConfig) {
  tracing_subscriber::fmt()
    .with_env_filter(env_filter(daemon))
    .with_writer(std::io::stderr)
    .init();
}

/// Initialize logging for `run`.
///
/// Logs to a rolling file when `daemon.log_file` is set or `to_file` is
/// requested, otherwise to the console with colors.
///
/// Returns the guard that must be kept alive for the duration of the program
pub fn init_daemon_logging(daemon: &DaemonConfig, to_file: bool) -> Option<WorkerGuard> {
  let env_filter = env_filter(daemon);

  let log_path = match (&daemon.log_file, to_file) {
    (Some(path), _) => path.clone(),
    (None, true) => dirs::default_log_path(),
    (None, false) => {
      tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_ansi(true)
        .init();
      return None;
    }
  };

  let (log_dir, file_name) = split_log_path(&log_path);
  if std::fs::create_dir_all(&log_dir).is_err() {
    // Fall back to console-only logging
    init_cli_logging(daemon);
    return None;
  }

  let file_appender = match daemon.log_rotation.as_str() {
    "hourly" => tracing_appender::rolling::hourly(&log_dir, &file_name),
    "never" => tracing_appender::rolling::never(&log_dir, &file_name),
    _ => tracing_appender::rolling::daily(&log_dir, &file_name),
  };

  let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

  tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_target(true)
    .with_ansi(false)
    .with_writer(file_writer)
    .init();

  Some(guard)
}

fn split_log_path(path: &Path) -> (PathBuf, String) {
  let dir = match path.parent() {
    Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
    _ => PathBuf::from("."),
  };
  let name = path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| "pqwatch.log".to_string());
  (dir, name)
}
