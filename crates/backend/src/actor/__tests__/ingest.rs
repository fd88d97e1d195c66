//! Ingest actor scenarios: valid, malformed and mixed traffic, shutdown.

#[cfg(test)]
mod tests {
  use std::{
    fs::OpenOptions,
    io::Write,
    sync::{
      Arc,
      atomic::{AtomicBool, Ordering},
    },
    time::Duration,
  };

  use pretty_assertions::assert_eq;

  use crate::actor::{
    __tests__::helpers::{PipelineTestContext, sine_csv, wait_for},
    StatsSnapshot,
  };

  const WAIT: Duration = Duration::from_secs(10);

  #[tokio::test]
  async fn test_valid_file_is_classified_logged_and_archived() {
    let ctx = PipelineTestContext::new();
    let path = ctx.drop_file("20240101_normal.csv", &sine_csv(4096));
    let (handle, stats, task, _cancel) = ctx.spawn_actor();

    handle.file_ready(path.clone()).await.unwrap();
    assert!(wait_for(WAIT, || stats.snapshot().processed == 1).await);

    assert!(!path.exists());
    assert!(ctx.processed_dir().join("20240101_normal.csv").exists());

    let events = ctx.store.recent(10).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event.filename, "20240101_normal.csv");
    assert_eq!(events[0].event.label, "normal");

    handle.shutdown().await.unwrap();
    task.await.unwrap();
  }

  #[tokio::test]
  async fn test_malformed_file_stays_and_actor_keeps_going() {
    let ctx = PipelineTestContext::new();
    let bad = ctx.drop_file("bad.csv", "voltage\n1.0\n2.0\n");
    let good = ctx.drop_file("good.csv", &sine_csv(1024));
    let (handle, stats, task, _cancel) = ctx.spawn_actor();

    handle.file_ready(bad.clone()).await.unwrap();
    handle.file_ready(good.clone()).await.unwrap();
    handle.shutdown().await.unwrap();
    task.await.unwrap();

    assert_eq!(
      stats.snapshot(),
      StatsSnapshot {
        processed: 1,
        failed: 1,
        skipped: 0
      }
    );
    assert!(bad.exists());
    assert!(!good.exists());
    assert_eq!(ctx.store.count().unwrap(), 1);
    assert_eq!(ctx.store.last_for_file("bad.csv").unwrap(), None);
  }

  #[tokio::test]
  async fn test_mixed_batch_is_processed_serially() {
    let ctx = PipelineTestContext::new();
    let names = ["a.csv", "b.csv", "short.csv", "c.csv"];
    let mut paths = Vec::new();
    for name in names {
      let samples = if name == "short.csv" { 64 } else { 2048 };
      paths.push(ctx.drop_file(name, &sine_csv(samples)));
    }
    let (handle, stats, task, _cancel) = ctx.spawn_actor();

    for path in &paths {
      handle.file_ready(path.clone()).await.unwrap();
    }
    handle.shutdown().await.unwrap();
    task.await.unwrap();

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.processed, 3);
    assert_eq!(snapshot.failed, 1);

    // Serial processing: log order is dispatch order
    let mut logged: Vec<String> = ctx
      .store
      .recent(10)
      .unwrap()
      .into_iter()
      .map(|e| e.event.filename)
      .collect();
    logged.reverse();
    assert_eq!(logged, vec!["a.csv", "b.csv", "c.csv"]);
    assert!(ctx.watch_dir().join("short.csv").exists());
  }

  #[tokio::test]
  async fn test_duplicate_job_for_archived_file_is_skipped() {
    let ctx = PipelineTestContext::new();
    let path = ctx.drop_file("dup.csv", &sine_csv(1024));
    let (handle, stats, task, _cancel) = ctx.spawn_actor();

    handle.file_ready(path.clone()).await.unwrap();
    handle.file_ready(path.clone()).await.unwrap();
    handle.shutdown().await.unwrap();
    task.await.unwrap();

    assert_eq!(
      stats.snapshot(),
      StatsSnapshot {
        processed: 1,
        failed: 0,
        skipped: 1
      }
    );
    assert_eq!(ctx.store.count().unwrap(), 1);
  }

  #[tokio::test]
  async fn test_cancel_stops_actor_and_leaves_queue() {
    let ctx = PipelineTestContext::new();
    let (handle, stats, task, cancel) = ctx.spawn_actor();

    cancel.cancel();
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();

    let path = ctx.drop_file("late.csv", &sine_csv(1024));
    assert!(handle.file_ready(path.clone()).await.is_err());
    assert!(path.exists());
    assert_eq!(stats.snapshot(), StatsSnapshot::default());
  }

  #[tokio::test]
  async fn test_cancel_waits_for_file_in_flight() {
    let mut ctx = PipelineTestContext::new();
    ctx.config.watcher.max_settle_ms = 5_000;
    let path = ctx.drop_file("growing.csv", &sine_csv(4096));
    let (handle, stats, task, cancel) = ctx.spawn_actor();

    // Keep the file growing so the actor is held in the settle wait
    let writing = Arc::new(AtomicBool::new(true));
    let writer = {
      let writing = writing.clone();
      let path = path.clone();
      std::thread::spawn(move || {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        while writing.load(Ordering::Relaxed) {
          file.write_all(b"0.5\n").unwrap();
          std::thread::sleep(Duration::from_millis(2));
        }
      })
    };

    handle.file_ready(path.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ctx.store.count().unwrap(), 0);

    cancel.cancel();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!task.is_finished());

    writing.store(false, Ordering::Relaxed);
    writer.join().unwrap();
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();

    assert_eq!(
      stats.snapshot(),
      StatsSnapshot {
        processed: 1,
        failed: 0,
        skipped: 0
      }
    );
    assert!(!path.exists());
    assert!(ctx.processed_dir().join("growing.csv").exists());
    assert_eq!(ctx.store.recent(1).unwrap()[0].event.filename, "growing.csv");
  }

  #[tokio::test]
  async fn test_log_failure_is_counted_as_processed() {
    let ctx = PipelineTestContext::new();
    rusqlite::Connection::open(ctx.db_path())
      .unwrap()
      .execute_batch("DROP TABLE events;")
      .unwrap();
    let path = ctx.drop_file("a.csv", &sine_csv(1024));
    let (handle, stats, task, _cancel) = ctx.spawn_actor();

    handle.file_ready(path.clone()).await.unwrap();
    handle.shutdown().await.unwrap();
    task.await.unwrap();

    assert_eq!(stats.snapshot().processed, 1);
    assert!(!path.exists());
    assert!(ctx.processed_dir().join("a.csv").exists());
  }
}
