//! Watcher integration: real notify events against a temp directory.

#[cfg(test)]
mod tests {
  use std::{fs, sync::Arc, time::Duration};

  use pretty_assertions::assert_eq;
  use tokio::{
    sync::mpsc,
    time::{sleep, timeout},
  };
  use tokio_util::sync::CancellationToken;

  use crate::actor::{
    IngestActor, IngestHandle, IngestJob, WatcherConfig, WatcherTask,
    __tests__::helpers::{PipelineTestContext, sine_csv, wait_for},
  };

  fn watcher_config(ctx: &PipelineTestContext) -> WatcherConfig {
    WatcherConfig {
      dir: ctx.watch_dir().to_path_buf(),
      watch: ctx.config.watcher.clone(),
    }
  }

  #[tokio::test]
  async fn test_new_csv_is_dispatched_once() {
    let ctx = PipelineTestContext::new();
    let (tx, mut rx) = mpsc::channel::<IngestJob>(16);
    let cancel = CancellationToken::new();
    let task = WatcherTask::spawn(watcher_config(&ctx), IngestHandle::new(tx), cancel.clone()).unwrap();

    sleep(Duration::from_millis(100)).await;

    fs::write(ctx.watch_dir().join("notes.txt"), "ignored").unwrap();
    let path = ctx.drop_file("a.csv", "signal\n");
    // More writes inside the debounce window must not produce a second job
    fs::write(&path, "signal\n1\n2\n").unwrap();

    let job = timeout(Duration::from_secs(2), rx.recv())
      .await
      .expect("timeout waiting for job")
      .expect("receive job");
    assert_eq!(job, IngestJob::File { path: path.clone() });

    sleep(Duration::from_millis(300)).await;
    assert!(rx.try_recv().is_err(), "expected a single job");

    cancel.cancel();
    timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
  }

  #[tokio::test]
  async fn test_file_removed_before_settling_is_not_dispatched() {
    let mut ctx = PipelineTestContext::new();
    ctx.config.watcher.settle_ms = 300;
    let (tx, mut rx) = mpsc::channel::<IngestJob>(16);
    let cancel = CancellationToken::new();
    let task = WatcherTask::spawn(watcher_config(&ctx), IngestHandle::new(tx), cancel.clone()).unwrap();

    sleep(Duration::from_millis(100)).await;
    let path = ctx.drop_file("gone.csv", "signal\n1\n");
    sleep(Duration::from_millis(20)).await;
    fs::remove_file(&path).unwrap();

    assert!(timeout(Duration::from_millis(800), rx.recv()).await.is_err());

    cancel.cancel();
    timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
  }

  #[tokio::test]
  async fn test_subdirectory_files_are_ignored() {
    let ctx = PipelineTestContext::new();
    let nested = ctx.watch_dir().join("nested");
    fs::create_dir(&nested).unwrap();
    let (tx, mut rx) = mpsc::channel::<IngestJob>(16);
    let cancel = CancellationToken::new();
    let task = WatcherTask::spawn(watcher_config(&ctx), IngestHandle::new(tx), cancel.clone()).unwrap();

    sleep(Duration::from_millis(100)).await;
    fs::write(nested.join("deep.csv"), "signal\n1\n").unwrap();

    assert!(timeout(Duration::from_millis(500), rx.recv()).await.is_err());

    cancel.cancel();
    timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
  }

  #[tokio::test]
  async fn test_watcher_into_actor_end_to_end() {
    let ctx = PipelineTestContext::new();
    let cancel = CancellationToken::new();
    let (handle, stats, actor) = IngestActor::spawn(Arc::new(ctx.pipeline()), 16, cancel.clone());
    let watcher = WatcherTask::spawn(watcher_config(&ctx), handle, cancel.clone()).unwrap();

    sleep(Duration::from_millis(100)).await;
    // Both land inside one debounce window
    ctx.drop_file("first.csv", &sine_csv(4096));
    ctx.drop_file("second.csv", &sine_csv(4096));
    ctx.drop_file("empty.csv", "signal\n");

    assert!(wait_for(Duration::from_secs(10), || stats.snapshot().processed == 2 && stats.snapshot().failed == 1).await);
    sleep(Duration::from_millis(300)).await;

    let mut logged: Vec<String> = ctx
      .store
      .recent(10)
      .unwrap()
      .into_iter()
      .map(|e| {
        assert_eq!(e.event.label, "normal");
        e.event.filename
      })
      .collect();
    logged.sort();
    assert_eq!(logged, vec!["first.csv", "second.csv"]);
    assert!(ctx.processed_dir().join("first.csv").exists());
    assert!(ctx.processed_dir().join("second.csv").exists());
    assert!(ctx.watch_dir().join("empty.csv").exists());

    cancel.cancel();
    timeout(Duration::from_secs(5), watcher).await.unwrap().unwrap();
    timeout(Duration::from_secs(5), actor).await.unwrap().unwrap();
  }
}
