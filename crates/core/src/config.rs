//! Configuration for the pqwatch pipeline.
//!
//! Config priority: explicit `--config` file > project file (./pqwatch.toml)
//! > user file (~/.config/pqwatch/config.toml) > built-in defaults.

use std::{
  fmt,
  path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
  error::{Error, Result},
  features::WaveletConfig,
  wavelet::Wavelet,
};

/// File name looked up in the working directory
pub const PROJECT_CONFIG_FILE: &str = "pqwatch.toml";

/// Deepest decomposition level accepted by [`Config::validate`]
pub const MAX_LEVEL: u32 = 20;

// ============================================================================
// Paths Configuration
// ============================================================================

/// Directory and database locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
  /// Directory watched for incoming signal files
  pub watch_dir: PathBuf,

  /// Archive for successfully classified files
  pub processed_dir: PathBuf,

  /// Quarantine for files that failed before classification.
  /// When unset, failed files stay in the watched directory.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub failed_dir: Option<PathBuf>,

  /// Directory holding the scaler and classifier artifacts
  pub models_dir: PathBuf,

  /// SQLite event log
  pub db_path: PathBuf,
}

impl Default for PathsConfig {
  fn default() -> Self {
    Self {
      watch_dir: PathBuf::from("data/simulation_input"),
      processed_dir: PathBuf::from("data/processed"),
      failed_dir: None,
      models_dir: PathBuf::from("models"),
      db_path: PathBuf::from("db/pq_events.db"),
    }
  }
}

// ============================================================================
// Feature Configuration
// ============================================================================

/// Feature extraction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
  /// Wavelet family: haar (db1), db2, db3, db4
  pub wavelet: Wavelet,

  /// Decomposition depth (default: 4)
  pub level: u32,

  /// CSV column holding the samples (default: "signal")
  pub signal_column: String,
}

impl Default for FeaturesConfig {
  fn default() -> Self {
    Self {
      wavelet: Wavelet::Db4,
      level: 4,
      signal_column: "signal".to_string(),
    }
  }
}

impl FeaturesConfig {
  pub fn wavelet_config(&self) -> WaveletConfig {
    WaveletConfig::new(self.wavelet, self.level)
  }
}

// ============================================================================
// Artifact Configuration
// ============================================================================

/// Model artifact file names, relative to `paths.models_dir`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
  pub scaler_file: String,
  pub classifier_file: String,
}

impl Default for ArtifactsConfig {
  fn default() -> Self {
    Self {
      scaler_file: "scaler.json".to_string(),
      classifier_file: "pq_classifier.json".to_string(),
    }
  }
}

// ============================================================================
// Watch Configuration
// ============================================================================

/// File watcher and ingest queue settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
  /// File extension to pick up, without the dot (default: "csv")
  pub extension: String,

  /// Quiet period after the last event for a path before it is queued (default: 100)
  pub settle_ms: u64,

  /// Poll interval for the fallback poll watcher in seconds (default: 2)
  pub poll_interval_secs: u64,

  /// Consecutive identical size/mtime observations required before reading (default: 3)
  pub stable_checks: u32,

  /// Delay between size/mtime observations in milliseconds (default: 50)
  pub stable_interval_ms: u64,

  /// Upper bound on write-completion waiting in milliseconds (default: 5000)
  pub max_settle_ms: u64,

  /// Capacity of the watcher -> ingest queue (default: 256)
  pub queue_capacity: usize,

  /// Enqueue files already present in the watched directory at startup (default: true)
  pub scan_on_startup: bool,
}

impl Default for WatchConfig {
  fn default() -> Self {
    Self {
      extension: "csv".to_string(),
      settle_ms: 100,
      poll_interval_secs: 2,
      stable_checks: 3,
      stable_interval_ms: 50,
      max_settle_ms: 5000,
      queue_capacity: 256,
      scan_on_startup: true,
    }
  }
}

impl WatchConfig {
  /// Whether `path` carries the configured extension (case-insensitive)
  pub fn matches_extension(&self, path: &Path) -> bool {
    path
      .extension()
      .and_then(|ext| ext.to_str())
      .is_some_and(|ext| ext.eq_ignore_ascii_case(self.extension.trim_start_matches('.')))
  }
}

// ============================================================================
// Store Configuration
// ============================================================================

/// Event store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  /// Extra append attempts after a failed insert (default: 2)
  pub append_retries: u32,

  /// Delay before each retry in milliseconds (default: 50)
  pub retry_backoff_ms: u64,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      append_retries: 2,
      retry_backoff_ms: 50,
    }
  }
}

// ============================================================================
// Daemon Configuration
// ============================================================================

/// Process-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
  /// Log level: "off", "error", "warn", "info", "debug", "trace"
  /// Default: "info"
  pub log_level: String,

  /// Optional log file; logs go to stderr only when unset
  #[serde(skip_serializing_if = "Option::is_none")]
  pub log_file: Option<PathBuf>,

  /// Log file rotation: "daily", "hourly", "never"
  /// Default: "daily"
  pub log_rotation: String,

  /// Seconds between health summaries (default: 60)
  pub health_interval_secs: u64,
}

impl Default for DaemonConfig {
  fn default() -> Self {
    Self {
      log_level: "info".to_string(),
      log_file: None,
      log_rotation: "daily".to_string(),
      health_interval_secs: 60,
    }
  }
}

// ============================================================================
// Main Configuration
// ============================================================================

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
  Explicit(PathBuf),
  Project(PathBuf),
  User(PathBuf),
  Defaults,
}

impl fmt::Display for ConfigSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigSource::Explicit(p) => write!(f, "explicit config {}", p.display()),
      ConfigSource::Project(p) => write!(f, "project config {}", p.display()),
      ConfigSource::User(p) => write!(f, "user config {}", p.display()),
      ConfigSource::Defaults => f.write_str("built-in defaults"),
    }
  }
}

/// pqwatch configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Directory and database locations
  pub paths: PathsConfig,

  /// Feature extraction settings
  pub features: FeaturesConfig,

  /// Model artifact file names
  pub artifacts: ArtifactsConfig,

  /// Watcher and queue settings
  pub watcher: WatchConfig,

  /// Event store settings
  pub store: StoreConfig,

  /// Logging and health settings
  pub daemon: DaemonConfig,
}

impl Config {
  /// Resolve the effective configuration.
  ///
  /// An explicit file must exist and parse. Implicit files that fail to
  /// parse are skipped with a warning.
  pub fn load(explicit: Option<&Path>, project_dir: &Path) -> Result<(Self, ConfigSource)> {
    Self::load_from(explicit, project_dir, Self::user_config_path().as_deref())
  }

  fn load_from(explicit: Option<&Path>, project_dir: &Path, user: Option<&Path>) -> Result<(Self, ConfigSource)> {
    if let Some(path) = explicit {
      let config = Self::load_file(path)?;
      return Ok((config, ConfigSource::Explicit(path.to_path_buf())));
    }

    let project = Self::project_config_path(project_dir);
    if project.exists() {
      match Self::load_file(&project) {
        Ok(config) => return Ok((config, ConfigSource::Project(project))),
        Err(e) => warn!(error = %e, "Skipping project config"),
      }
    }

    if let Some(user) = user
      && user.exists()
    {
      match Self::load_file(user) {
        Ok(config) => return Ok((config, ConfigSource::User(user.to_path_buf()))),
        Err(e) => warn!(error = %e, "Skipping user config"),
      }
    }

    debug!("No config file found, using defaults");
    Ok((Self::default(), ConfigSource::Defaults))
  }

  /// Read, parse and validate a single config file
  pub fn load_file(path: &Path) -> Result<Self> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
      path: path.to_path_buf(),
      source,
    })?;
    let config: Self = toml::from_str(&content).map_err(|source| Error::ConfigParse {
      path: path.to_path_buf(),
      source,
    })?;
    config.validate()?;
    Ok(config)
  }

  /// Get the user-level config path
  pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CONFIG_DIR") {
      return Some(PathBuf::from(path).join("config.toml"));
    }

    if let Ok(path) = std::env::var("XDG_CONFIG_HOME") {
      return Some(PathBuf::from(path).join("pqwatch").join("config.toml"));
    }

    dirs::config_dir().map(|p: PathBuf| p.join("pqwatch").join("config.toml"))
  }

  /// Get the project-relative config path
  pub fn project_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(PROJECT_CONFIG_FILE)
  }

  pub fn validate(&self) -> Result<()> {
    if self.features.level > MAX_LEVEL {
      return Err(Error::InvalidConfig(format!(
        "features.level {} exceeds the maximum of {}",
        self.features.level, MAX_LEVEL
      )));
    }
    if self.features.signal_column.trim().is_empty() {
      return Err(Error::InvalidConfig("features.signal_column must not be empty".into()));
    }
    if self.watcher.extension.trim().trim_start_matches('.').is_empty() {
      return Err(Error::InvalidConfig("watcher.extension must not be empty".into()));
    }
    if self.watcher.queue_capacity == 0 {
      return Err(Error::InvalidConfig("watcher.queue_capacity must be at least 1".into()));
    }
    Ok(())
  }

  /// Number of features produced for the configured wavelet and level
  pub fn feature_len(&self) -> usize {
    self.features.wavelet_config().feature_len()
  }

  pub fn scaler_path(&self) -> PathBuf {
    self.paths.models_dir.join(&self.artifacts.scaler_file)
  }

  pub fn classifier_path(&self) -> PathBuf {
    self.paths.models_dir.join(&self.artifacts.classifier_file)
  }

  /// Generate a default config file as a string
  pub fn generate_template() -> String {
    r#"# pqwatch configuration
# Place in ./pqwatch.toml (project) or ~/.config/pqwatch/config.toml (user)

# ============================================================================
# Paths
# ============================================================================

[paths]
watch_dir = "data/simulation_input"
processed_dir = "data/processed"
models_dir = "models"
db_path = "db/pq_events.db"

# Quarantine for files that fail before classification (uncomment to use).
# Without it, failed files stay in watch_dir.
# failed_dir = "data/failed"

# ============================================================================
# Features
# ============================================================================

[features]
# Wavelet family: haar (alias db1), db2, db3, db4
wavelet = "db4"
# Decomposition depth; the feature vector has 2 * (level + 1) entries
level = 4
# CSV column holding the samples
signal_column = "signal"

# ============================================================================
# Model artifacts (relative to paths.models_dir)
# ============================================================================

[artifacts]
scaler_file = "scaler.json"
classifier_file = "pq_classifier.json"

# ============================================================================
# Watcher
# ============================================================================

[watcher]
extension = "csv"
# Quiet period after the last filesystem event before a file is queued
settle_ms = 100
# Poll interval of the fallback poll watcher
poll_interval_secs = 2
# Write-completion check: size and mtime must match this many times in a row
stable_checks = 3
stable_interval_ms = 50
max_settle_ms = 5000
queue_capacity = 256
# Process files already waiting in watch_dir at startup
scan_on_startup = true

# ============================================================================
# Event store
# ============================================================================

[store]
# Retries before a classification is archived without a log row
append_retries = 2
retry_backoff_ms = 50

# ============================================================================
# Daemon
# ============================================================================

[daemon]
# off, error, warn, info, debug, trace (RUST_LOG overrides)
log_level = "info"
# daily, hourly, never
log_rotation = "daily"
# log_file = "logs/pqwatch.log"
health_interval_secs = 60
"#
    .to_string()
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use tempfile::TempDir;

  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.paths.watch_dir, PathBuf::from("data/simulation_input"));
    assert_eq!(config.paths.db_path, PathBuf::from("db/pq_events.db"));
    assert_eq!(config.features.wavelet, Wavelet::Db4);
    assert_eq!(config.features.level, 4);
    assert_eq!(config.feature_len(), 10);
    assert_eq!(config.scaler_path(), PathBuf::from("models/scaler.json"));
    assert_eq!(config.classifier_path(), PathBuf::from("models/pq_classifier.json"));
    assert!(config.paths.failed_dir.is_none());
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_generate_template_parses_to_defaults() {
    let parsed: Config = toml::from_str(&Config::generate_template()).unwrap();
    assert_eq!(parsed, Config::default());
  }

  #[test]
  fn test_partial_file_keeps_other_defaults() {
    let config: Config = toml::from_str(
      r#"
[features]
wavelet = "db1"
level = 2

[paths]
failed_dir = "quarantine"
"#,
    )
    .unwrap();
    assert_eq!(config.features.wavelet, Wavelet::Haar);
    assert_eq!(config.features.level, 2);
    assert_eq!(config.features.signal_column, "signal");
    assert_eq!(config.paths.failed_dir, Some(PathBuf::from("quarantine")));
    assert_eq!(config.watcher, WatchConfig::default());
  }

  #[test]
  fn test_toml_roundtrip() {
    let mut config = Config::default();
    config.paths.failed_dir = Some(PathBuf::from("failed"));
    config.daemon.log_file = Some(PathBuf::from("logs/pq.log"));
    config.watcher.settle_ms = 10;

    let text = toml::to_string_pretty(&config).unwrap();
    let back: Config = toml::from_str(&text).unwrap();
    assert_eq!(back, config);
  }

  #[test]
  fn test_validate_rejects_bad_values() {
    let mut config = Config::default();
    config.features.level = 21;
    assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

    let mut config = Config::default();
    config.features.signal_column = "  ".into();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.watcher.extension = ".".into();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.watcher.queue_capacity = 0;
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_unknown_wavelet_is_a_parse_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("bad.toml");
    std::fs::write(&path, "[features]\nwavelet = \"sym5\"\n").unwrap();
    assert!(matches!(Config::load_file(&path), Err(Error::ConfigParse { .. })));
  }

  #[test]
  fn test_explicit_config_must_exist() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("missing.toml");
    let err = Config::load_from(Some(&missing), temp.path(), None).unwrap_err();
    assert!(matches!(err, Error::ConfigRead { .. }));
  }

  #[test]
  fn test_project_config_wins_over_user() {
    let temp = TempDir::new().unwrap();
    let user = temp.path().join("user.toml");
    std::fs::write(&user, "[features]\nlevel = 3\n").unwrap();
    std::fs::write(temp.path().join(PROJECT_CONFIG_FILE), "[features]\nlevel = 5\n").unwrap();

    let (config, source) = Config::load_from(None, temp.path(), Some(&user)).unwrap();
    assert_eq!(config.features.level, 5);
    assert_eq!(source, ConfigSource::Project(temp.path().join(PROJECT_CONFIG_FILE)));
  }

  #[test]
  fn test_invalid_project_config_falls_back_to_user() {
    let temp = TempDir::new().unwrap();
    let user = temp.path().join("user.toml");
    std::fs::write(&user, "[features]\nlevel = 3\n").unwrap();
    std::fs::write(temp.path().join(PROJECT_CONFIG_FILE), "[features\nlevel = ").unwrap();

    let (config, source) = Config::load_from(None, temp.path(), Some(&user)).unwrap();
    assert_eq!(config.features.level, 3);
    assert_eq!(source, ConfigSource::User(user));
  }

  #[test]
  fn test_load_default_when_no_config() {
    let temp = TempDir::new().unwrap();
    let (config, source) = Config::load_from(None, temp.path(), None).unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(source, ConfigSource::Defaults);
  }

  #[test]
  fn test_extension_matching() {
    let watch = WatchConfig::default();
    assert!(watch.matches_extension(Path::new("/in/a.csv")));
    assert!(watch.matches_extension(Path::new("/in/B.CSV")));
    assert!(!watch.matches_extension(Path::new("/in/a.csv.tmp")));
    assert!(!watch.matches_extension(Path::new("/in/csv")));
  }
}
