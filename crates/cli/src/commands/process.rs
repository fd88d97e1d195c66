//! One-shot classification of explicit files

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use pqwatch::{
  artifacts::PipelineArtifacts,
  pipeline::{IngestPipeline, PipelineConfig},
  store::EventStore,
};
use pqwatch_core::Config;
use serde::Serialize;

pub struct ProcessOptions {
  pub files: Vec<PathBuf>,
  pub json: bool,
}

#[derive(Serialize)]
struct FileReport {
  file: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  label: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  event_id: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  archived_to: Option<PathBuf>,
  #[serde(skip_serializing_if = "Option::is_none")]
  stage: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  error: Option<String>,
}

/// Run every file through the pipeline once, in the order given
pub async fn cmd_process(config: Config, opts: ProcessOptions) -> Result<()> {
  std::fs::create_dir_all(&config.paths.processed_dir)
    .with_context(|| format!("Failed to create {}", config.paths.processed_dir.display()))?;
  let store = Arc::new(EventStore::open(&config.paths.db_path).context("Failed to open event store")?);
  let artifacts = PipelineArtifacts::load(&config).context("Failed to load model artifacts")?;
  artifacts.check_feature_len(config.feature_len());

  let pipeline = IngestPipeline::new(PipelineConfig::from_config(&config), artifacts, store);
  let total = opts.files.len();

  let reports = tokio::task::spawn_blocking(move || {
    opts
      .files
      .iter()
      .map(|path| match pipeline.process(path) {
        Ok(done) => FileReport {
          file: path.display().to_string(),
          label: Some(done.event.label),
          event_id: done.event_id,
          archived_to: Some(done.archived_to),
          stage: None,
          error: None,
        },
        Err(e) => FileReport {
          file: path.display().to_string(),
          label: None,
          event_id: None,
          archived_to: None,
          stage: Some(e.stage.to_string()),
          error: Some(e.source.to_string()),
        },
      })
      .collect::<Vec<_>>()
  })
  .await?;

  let failed = reports.iter().filter(|r| r.error.is_some()).count();
  for report in &reports {
    if opts.json {
      println!("{}", serde_json::to_string(report)?);
    } else {
      match (&report.label, &report.error) {
        (Some(label), _) => println!("{}: {}", report.file, label),
        (None, Some(error)) => println!(
          "{}: failed at {} ({})",
          report.file,
          report.stage.as_deref().unwrap_or("?"),
          error
        ),
        (None, None) => {}
      }
    }
  }

  if failed > 0 {
    bail!("{} of {} files failed", failed, total);
  }
  Ok(())
}
