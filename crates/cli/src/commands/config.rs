//! Configuration and shell completion commands

use std::io;

use anyhow::{Result, bail};
use clap::CommandFactory;
use clap_complete::Shell;
use pqwatch_core::{Config, config::ConfigSource};

/// Show the effective configuration
pub fn cmd_config_show(config: &Config, source: &ConfigSource) -> Result<()> {
  println!("Using {}", source);
  println!();
  println!("{}", toml::to_string_pretty(config)?);
  Ok(())
}

/// Write the default config template to ./pqwatch.toml
pub fn cmd_config_init(force: bool) -> Result<()> {
  let cwd = std::env::current_dir()?;
  let config_path = Config::project_config_path(&cwd);

  if config_path.exists() && !force {
    bail!(
      "Config file already exists: {} (use --force to overwrite)",
      config_path.display()
    );
  }

  std::fs::write(&config_path, Config::generate_template())?;

  println!("Created config: {}", config_path.display());
  println!("Edit the file to customize paths, wavelet settings and watcher timings.");
  Ok(())
}

pub fn cmd_completions<C: CommandFactory>(shell: Shell) -> Result<()> {
  let mut command = C::command();
  let name = command.get_name().to_string();
  clap_complete::generate(shell, &mut command, name, &mut io::stdout());
  Ok(())
}
