use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One classification outcome. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationEvent {
  pub timestamp: DateTime<Utc>,
  pub filename: String,
  pub label: String,
}

impl ClassificationEvent {
  pub fn new(filename: impl Into<String>, label: impl Into<String>) -> Self {
    Self {
      timestamp: Utc::now(),
      filename: filename.into(),
      label: label.into(),
    }
  }

  /// ISO-8601 / RFC 3339 rendering with microsecond precision, always `Z`
  pub fn timestamp_rfc3339(&self) -> String {
    self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
  }
}

/// An event as read back from the store, with its sequential id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
  pub id: i64,
  #[serde(flatten)]
  pub event: ClassificationEvent,
}
