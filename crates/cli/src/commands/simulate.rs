//! Traffic simulator command

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result, bail};
use pqwatch::simulator::{Simulator, SimulatorConfig};
use pqwatch_core::Config;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct SimulateOptions {
  pub source: Option<PathBuf>,
  pub synthetic: bool,
  pub count: Option<u64>,
  pub min_delay_ms: u64,
  pub max_delay_ms: u64,
}

pub async fn cmd_simulate(config: &Config, opts: SimulateOptions) -> Result<()> {
  if opts.source.is_none() && !opts.synthetic {
    bail!("Pass --source <DIR> to copy existing files or --synthetic to generate signals");
  }
  if opts.min_delay_ms > opts.max_delay_ms {
    bail!("--min-delay-ms must not exceed --max-delay-ms");
  }

  let simulator = Simulator::new(SimulatorConfig {
    source_dir: opts.source,
    min_delay: Duration::from_millis(opts.min_delay_ms),
    max_delay: Duration::from_millis(opts.max_delay_ms),
    count: opts.count,
    ..SimulatorConfig::new(config.paths.watch_dir.clone())
  })
  .context("Failed to start simulator")?;

  let cancel = CancellationToken::new();
  let cancel_for_signal = cancel.clone();
  tokio::spawn(async move {
    if let Err(e) = tokio::signal::ctrl_c().await {
      warn!("Failed to listen for ctrl-c: {}", e);
      return;
    }
    info!("Received ctrl-c, stopping simulator...");
    cancel_for_signal.cancel();
  });

  println!("Dropping files into: {}", config.paths.watch_dir.display());
  let written = simulator.run(cancel).await?;
  println!("Simulator stopped after {} files", written);
  Ok(())
}
