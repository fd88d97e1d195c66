pub(crate) mod helpers;
mod ingest;
mod watcher;
