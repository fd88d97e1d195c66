//! pqwatch CLI - real-time power-quality disturbance classification

use std::{path::PathBuf, process::ExitCode};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

mod commands;
mod logging;

use commands::{
  ProcessOptions, SimulateOptions, cmd_completions, cmd_config_init, cmd_config_show, cmd_events, cmd_features,
  cmd_process, cmd_run, cmd_simulate, exit_code, load_config,
};
use logging::{init_cli_logging, init_daemon_logging};

#[derive(Parser)]
#[command(name = "pqwatch")]
#[command(about = "Watch a directory for power-quality signals and classify each one")]
#[command(after_help = "\
QUICK START:
  pqwatch config init             # Write ./pqwatch.toml with defaults
  pqwatch run                     # Watch, classify, log and archive
  pqwatch simulate --synthetic    # Drop synthetic signals into the watched dir

INSPECTION:
  pqwatch events --limit 20       # Most recent classifications
  pqwatch features signal.csv     # Feature vector for one file

EXIT STATUS:
  0 success, 1 failure, 3 model artifacts missing or invalid")]
struct Cli {
  #[command(flatten)]
  global: GlobalArgs,

  #[command(subcommand)]
  command: Commands,
}

/// Options shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
  /// Config file (default: ./pqwatch.toml, then the user config)
  #[arg(long, global = true, value_name = "FILE")]
  pub config: Option<PathBuf>,
  /// Override paths.watch_dir
  #[arg(long, global = true, value_name = "DIR")]
  pub watch_dir: Option<PathBuf>,
  /// Override paths.processed_dir
  #[arg(long, global = true, value_name = "DIR")]
  pub processed_dir: Option<PathBuf>,
  /// Override paths.models_dir
  #[arg(long, global = true, value_name = "DIR")]
  pub models_dir: Option<PathBuf>,
  /// Override paths.db_path
  #[arg(long, global = true, value_name = "FILE")]
  pub db: Option<PathBuf>,
}

/// Subcommands for `pqwatch config`
#[derive(Subcommand)]
pub enum ConfigCommand {
  /// Show the effective configuration and where it came from
  Show,
  /// Write a commented default config to ./pqwatch.toml
  Init {
    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
  },
}

#[derive(Subcommand)]
enum Commands {
  /// Run the watch pipeline until interrupted
  #[command(long_about = "Run the watch pipeline until interrupted.\n\n\
    Ensures the event table exists, loads the scaler and classifier, queues any files \
    already waiting, then classifies every new file dropped into the watched directory. \
    Ctrl-C stops watching and lets the file in progress finish.")]
  Run {
    /// Log to a rolling file instead of the console
    #[arg(long)]
    log_to_file: bool,
  },
  /// Classify the given files once, with the same stages as `run`
  Process {
    #[arg(required = true, value_name = "FILE")]
    files: Vec<PathBuf>,
    /// Output one JSON object per file
    #[arg(long)]
    json: bool,
  },
  /// Print the wavelet feature vector of a CSV file
  Features {
    file: PathBuf,
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
  /// List the most recent classification events
  Events {
    #[arg(short, long, default_value = "20")]
    limit: usize,
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
  /// Drop CSV files into the watched directory at random intervals
  #[command(after_help = "\
EXAMPLES:
  pqwatch simulate --source signals/          # Copy random files from signals/
  pqwatch simulate --synthetic --count 10     # Ten generated signals, then stop")]
  Simulate {
    /// Directory of CSV files to copy from
    #[arg(long, value_name = "DIR", conflicts_with = "synthetic")]
    source: Option<PathBuf>,
    /// Generate signals instead of copying files
    #[arg(long)]
    synthetic: bool,
    /// Stop after this many files
    #[arg(long)]
    count: Option<u64>,
    /// Minimum delay between files in milliseconds
    #[arg(long, default_value = "2000")]
    min_delay_ms: u64,
    /// Maximum delay between files in milliseconds
    #[arg(long, default_value = "5000")]
    max_delay_ms: u64,
  },
  /// Manage configuration
  #[command(after_help = "\
CONFIG LOCATIONS:
  Project: ./pqwatch.toml
  User:    ~/.config/pqwatch/config.toml")]
  Config {
    #[command(subcommand)]
    command: ConfigCommand,
  },
  /// Print shell completions
  Completions { shell: Shell },
}

#[tokio::main]
async fn main() -> ExitCode {
  let cli = Cli::parse();
  match run(cli).await {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      eprintln!("Error: {:#}", e);
      ExitCode::from(exit_code(&e))
    }
  }
}

async fn run(cli: Cli) -> Result<()> {
  // Commands that don't need a config
  match &cli.command {
    Commands::Completions { shell } => return cmd_completions::<Cli>(*shell),
    Commands::Config {
      command: ConfigCommand::Init { force },
    } => return cmd_config_init(*force),
    _ => {}
  }

  let (config, source) = load_config(&cli.global)?;

  // Keep the guard alive until exit so buffered file logs are flushed
  let _guard = match &cli.command {
    Commands::Run { log_to_file } => init_daemon_logging(&config.daemon, *log_to_file),
    _ => {
      init_cli_logging(&config.daemon);
      None
    }
  };

  match cli.command {
    Commands::Run { .. } => cmd_run(config, &source).await,
    Commands::Process { files, json } => cmd_process(config, ProcessOptions { files, json }).await,
    Commands::Features { file, json } => cmd_features(&config, &file, json),
    Commands::Events { limit, json } => cmd_events(&config, limit, json),
    Commands::Simulate {
      source,
      synthetic,
      count,
      min_delay_ms,
      max_delay_ms,
    } => {
      cmd_simulate(
        &config,
        SimulateOptions {
          source,
          synthetic,
          count,
          min_delay_ms,
          max_delay_ms,
        },
      )
      .await
    }
    Commands::Config { command } => match command {
      ConfigCommand::Show => cmd_config_show(&config, &source),
      ConfigCommand::Init { force } => cmd_config_init(force),
    },
    Commands::Completions { shell } => cmd_completions::<Cli>(shell),
  }
}
