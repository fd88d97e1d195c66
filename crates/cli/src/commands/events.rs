//! Event log listing

use anyhow::{Context, Result};
use pqwatch::store::EventStore;
use pqwatch_core::Config;

pub fn cmd_events(config: &Config, limit: usize, json: bool) -> Result<()> {
  let store = EventStore::open(&config.paths.db_path)
    .with_context(|| format!("Failed to open event store {}", config.paths.db_path.display()))?;
  let events = store.recent(limit)?;

  if json {
    println!("{}", serde_json::to_string_pretty(&events)?);
    return Ok(());
  }

  if events.is_empty() {
    println!("No events recorded in {}", config.paths.db_path.display());
    return Ok(());
  }

  println!("{:>6}  {:<27}  {:<16}  filename", "id", "timestamp", "classification");
  for stored in &events {
    println!(
      "{:>6}  {:<27}  {:<16}  {}",
      stored.id,
      stored.event.timestamp_rfc3339(),
      stored.event.label,
      stored.event.filename
    );
  }
  println!();
  println!("{} of {} events", events.len(), store.count()?);
  Ok(())
}
