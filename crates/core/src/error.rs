use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
  #[error("failed to read config file {}: {source}", path.display())]
  ConfigRead {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("failed to parse config file {}: {source}", path.display())]
  ConfigParse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
  #[error("invalid configuration: {0}")]
  InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
