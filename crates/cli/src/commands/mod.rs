//! CLI command implementations

mod config;
mod events;
mod features;
mod process;
mod run;
mod simulate;

use anyhow::{Context, Result};
use pqwatch::{DaemonError, EXIT_ARTIFACTS, artifacts::ArtifactLoadError};
use pqwatch_core::{Config, config::ConfigSource};

pub use config::{cmd_completions, cmd_config_init, cmd_config_show};
pub use events::cmd_events;
pub use features::cmd_features;
pub use process::{ProcessOptions, cmd_process};
pub use run::cmd_run;
pub use simulate::{SimulateOptions, cmd_simulate};

use crate::GlobalArgs;

/// Resolve the config file and apply command line path overrides
pub fn load_config(args: &GlobalArgs) -> Result<(Config, ConfigSource)> {
  let cwd = std::env::current_dir().context("Failed to read current directory")?;
  let (mut config, source) = Config::load(args.config.as_deref(), &cwd)?;

  if let Some(dir) = &args.watch_dir {
    config.paths.watch_dir = dir.clone();
  }
  if let Some(dir) = &args.processed_dir {
    config.paths.processed_dir = dir.clone();
  }
  if let Some(dir) = &args.models_dir {
    config.paths.models_dir = dir.clone();
  }
  if let Some(path) = &args.db {
    config.paths.db_path = path.clone();
  }

  config.validate()?;
  Ok((config, source))
}

/// Process exit status for a command failure
pub fn exit_code(err: &anyhow::Error) -> u8 {
  for cause in err.chain() {
    if let Some(e) = cause.downcast_ref::<DaemonError>() {
      return e.exit_code() as u8;
    }
    if cause.downcast_ref::<ArtifactLoadError>().is_some() {
      return EXIT_ARTIFACTS as u8;
    }
  }
  1
}
