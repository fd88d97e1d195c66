//! Extract stage - reads one signal column out of a CSV file.

use std::{fs::File, path::Path};

use pqwatch_core::Signal;

/// Why a file could not be turned into a signal
#[derive(Debug, thiserror::Error)]
pub enum MalformedInput {
  #[error("unreadable file: {0}")]
  Unreadable(#[source] std::io::Error),
  #[error("file is empty")]
  Empty,
  #[error("missing column '{column}' (found: {found})")]
  MissingColumn { column: String, found: String },
  #[error("no data rows")]
  NoRows,
  #[error("row {row}: cannot parse '{value}' as a number")]
  BadSample { row: usize, value: String },
  #[error("row {row}: sample {value} is not finite")]
  NonFiniteSample { row: usize, value: f64 },
  #[error("malformed csv at row {row}: {source}")]
  Csv {
    row: usize,
    #[source]
    source: csv::Error,
  },
}

impl MalformedInput {
  /// The file disappeared between notification and read
  pub fn is_not_found(&self) -> bool {
    matches!(self, MalformedInput::Unreadable(e) if e.kind() == std::io::ErrorKind::NotFound)
  }
}

/// Read the `column` values of `path` into a [`Signal`].
///
/// Row numbers in errors are 1-based data rows (the header is row 0).
pub fn read_signal(path: &Path, column: &str) -> Result<Signal, MalformedInput> {
  let file = File::open(path).map_err(MalformedInput::Unreadable)?;
  let len = file.metadata().map_err(MalformedInput::Unreadable)?.len();
  if len == 0 {
    return Err(MalformedInput::Empty);
  }

  let mut reader = csv::ReaderBuilder::new()
    .has_headers(true)
    .flexible(true)
    .trim(csv::Trim::All)
    .from_reader(file);

  let headers = reader
    .headers()
    .map_err(|source| MalformedInput::Csv { row: 0, source })?
    .clone();
  if headers.iter().all(|h| h.is_empty()) {
    return Err(MalformedInput::Empty);
  }

  let index = headers
    .iter()
    .position(|h| h.trim_start_matches('\u{feff}') == column)
    .ok_or_else(|| MalformedInput::MissingColumn {
      column: column.to_string(),
      found: headers.iter().collect::<Vec<_>>().join(", "),
    })?;

  let mut samples = Vec::new();
  for (i, record) in reader.records().enumerate() {
    let row = i + 1;
    let record = record.map_err(|source| MalformedInput::Csv { row, source })?;
    let field = record.get(index).unwrap_or_default();
    let value: f64 = field.parse().map_err(|_| MalformedInput::BadSample {
      row,
      value: field.to_string(),
    })?;
    if !value.is_finite() {
      return Err(MalformedInput::NonFiniteSample { row, value });
    }
    samples.push(value);
  }

  Signal::new(samples).map_err(|_| MalformedInput::NoRows)
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;

  fn write(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("input.csv");
    std::fs::write(&path, content).unwrap();
    path
  }

  #[test]
  fn test_reads_signal_column() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "time,signal\n0, 1.5\n1,-2\n2,3e-1\n");
    let signal = read_signal(&path, "signal").unwrap();
    assert_eq!(signal.samples(), &[1.5, -2.0, 0.3]);
  }

  #[test]
  fn test_header_only_has_no_rows() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "signal\n");
    assert!(matches!(read_signal(&path, "signal"), Err(MalformedInput::NoRows)));
  }

  #[test]
  fn test_empty_file() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "");
    assert!(matches!(read_signal(&path, "signal"), Err(MalformedInput::Empty)));
  }

  #[test]
  fn test_missing_column_lists_headers() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "a,b\n1,2\n");
    let err = read_signal(&path, "signal").unwrap_err();
    assert_eq!(err.to_string(), "missing column 'signal' (found: a, b)");
  }

  #[test]
  fn test_bad_sample_reports_row() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "signal\n1.0\n2.0\noops\n");
    assert!(matches!(
      read_signal(&path, "signal"),
      Err(MalformedInput::BadSample { row: 3, .. })
    ));
  }

  #[test]
  fn test_short_row_is_a_bad_sample() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "time,signal\n0,1.0\n1\n");
    assert!(matches!(
      read_signal(&path, "signal"),
      Err(MalformedInput::BadSample { row: 2, .. })
    ));
  }

  #[test]
  fn test_nan_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "signal\n1.0\nNaN\n");
    assert!(matches!(
      read_signal(&path, "signal"),
      Err(MalformedInput::NonFiniteSample { row: 2, .. })
    ));
  }

  #[test]
  fn test_missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let err = read_signal(&dir.path().join("gone.csv"), "signal").unwrap_err();
    assert!(err.is_not_found());
  }
}
