//! Purge/replay engine
//!
//! Replays this agent's cached batches one file at a time. Each file is
//! independent: a corrupt file or a failed delivery never stops the pass.
//! A file is removed only after the collector confirmed the batch, so a
//! second pass can never re-deliver something the first pass delivered.

use std::path::PathBuf;
use tracing::{error, info};

use crate::cache::CacheStore;
use crate::codec;
use crate::delivery::{DeliveryClient, DeliveryOutcome};
use crate::error::CacheError;

/// What happened to one cache file during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Delivered,
    Failed(DeliveryOutcome),
    Corrupt(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    pub status: FileStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeSummary {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    pub corrupt: usize,
    pub files: Vec<FileReport>,
}

impl PurgeSummary {
    fn record(&mut self, path: PathBuf, status: FileStatus) {
        match status {
            FileStatus::Delivered => self.delivered += 1,
            FileStatus::Failed(_) => self.failed += 1,
            FileStatus::Corrupt(_) => self.corrupt += 1,
        }
        self.files.push(FileReport { path, status });
    }
}

/// Replay every cache file owned by `store` to `endpoint`
///
/// Only listing the directory can fail the whole pass; everything after that
/// is classified per file.
pub async fn purge(
    store: &CacheStore,
    client: &DeliveryClient,
    endpoint: &str,
) -> Result<PurgeSummary, CacheError> {
    let files = store.list()?;
    let mut summary = PurgeSummary::default();

    for path in files {
        let batch = match store.read(&path).map_err(|e| e.to_string()).and_then(|bytes| {
            codec::decode(&bytes).map_err(|e| e.to_string())
        }) {
            Ok(batch) => batch,
            Err(reason) => {
                error!(
                    "Error reading cached agent data file {}: {}. May be corrupted, left in place",
                    path.display(),
                    reason
                );
                summary.record(path, FileStatus::Corrupt(reason));
                continue;
            }
        };

        summary.attempted += 1;
        let outcome = client.post(endpoint, &batch).await;
        if !outcome.is_delivered() {
            summary.record(path, FileStatus::Failed(outcome));
            continue;
        }

        // The collector has it now; a failed unlink only means a duplicate later.
        match store.remove(&path) {
            Ok(()) => info!(
                "Purged cache file {} after successfully contacting {}",
                path.display(),
                endpoint
            ),
            Err(e) => error!(
                "Delivered {} but could not remove it, it will be sent again: {}",
                path.display(),
                e
            ),
        }
        summary.record(path, FileStatus::Delivered);
    }

    if summary.attempted > 0 || summary.corrupt > 0 {
        info!(
            "Purge pass for {}: {} attempted, {} delivered, {} failed, {} corrupt",
            store.directory().display(),
            summary.attempted,
            summary.delivered,
            summary.failed,
            summary.corrupt
        );
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BatchBuilder, DataType, DataVariable, PolledBatch};
    use crate::fingerprint::HashAlgorithm;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn batch(ts: i64) -> PolledBatch {
        let mut b = BatchBuilder::new(ts, "abc123", "relay-agent", "h1");
        b.push(DataVariable::numeric("h1", "uptime", "0", DataType::Counter64, ts as u64))
            .unwrap();
        b.finish()
    }

    fn setup() -> (tempfile::TempDir, CacheStore, DeliveryClient) {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path(), "abc123", "h1", HashAlgorithm::Sha1).unwrap();
        let client = DeliveryClient::new(Duration::from_secs(2)).unwrap();
        (dir, store, client)
    }

    #[tokio::test]
    async fn test_empty_cache_is_a_noop() {
        let (_dir, store, client) = setup();
        let summary = purge(&store, &client, "http://127.0.0.1:1/x").await.unwrap();
        assert_eq!(summary, PurgeSummary::default());
    }

    #[tokio::test]
    async fn test_failed_delivery_keeps_files() {
        let (_dir, store, client) = setup();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        store.write(&batch(100)).unwrap();
        store.write(&batch(200)).unwrap();

        let summary = purge(&store, &client, &server.uri()).await.unwrap();
        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.delivered, 0);
        assert!(summary
            .files
            .iter()
            .all(|f| f.status == FileStatus::Failed(DeliveryOutcome::Rejected { status: 503 })));
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_file_reported_and_kept() {
        let (_dir, store, client) = setup();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        store.write(&batch(100)).unwrap();
        let bad = store.directory().join(format!("50{}", store.suffix()));
        std::fs::write(&bad, b"{\"timestamp\": ").unwrap();

        let summary = purge(&store, &client, &server.uri()).await.unwrap();
        assert_eq!(summary.corrupt, 1);
        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.attempted, 1);
        assert!(bad.exists());
        assert_eq!(store.list().unwrap(), vec![bad]);
    }

    /// Swap a cache file for a directory of the same name: listed, but
    /// neither readable nor removable as a file
    fn replace_with_dir(path: &std::path::Path) {
        if path.is_file() {
            std::fs::remove_file(path).unwrap();
            std::fs::create_dir(path).unwrap();
        }
    }

    #[tokio::test]
    async fn test_remove_failure_still_counts_delivered() {
        let (_dir, store, client) = setup();
        let path = store.write(&batch(100)).unwrap();

        let server = MockServer::start().await;
        let victim = path.clone();
        Mock::given(method("POST"))
            .respond_with(move |_: &Request| {
                replace_with_dir(&victim);
                ResponseTemplate::new(200)
            })
            .expect(1)
            .mount(&server)
            .await;

        let summary = purge(&store, &client, &server.uri()).await.unwrap();
        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(
            summary.files,
            vec![FileReport {
                path: path.clone(),
                status: FileStatus::Delivered,
            }]
        );
        assert!(path.is_dir());
    }

    #[tokio::test]
    async fn test_unreadable_file_classified_corrupt() {
        let (_dir, store, client) = setup();
        store.write(&batch(100)).unwrap();
        let unreadable = store.write(&batch(200)).unwrap();

        // the first delivery makes the second listed file unreadable
        let server = MockServer::start().await;
        let victim = unreadable.clone();
        Mock::given(method("POST"))
            .respond_with(move |_: &Request| {
                replace_with_dir(&victim);
                ResponseTemplate::new(200)
            })
            .expect(1)
            .mount(&server)
            .await;

        let summary = purge(&store, &client, &server.uri()).await.unwrap();
        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.corrupt, 1);
        let report = summary.files.iter().find(|f| f.path == unreadable).unwrap();
        assert!(matches!(report.status, FileStatus::Corrupt(_)));
        assert!(unreadable.exists());
    }
}
