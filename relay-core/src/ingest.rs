//! Ingestion scanner
//!
//! Walks every agent's cache files under a common root, decodes them and
//! surfaces the active ones for a storage writer. Unlike purge, there is no
//! fingerprint filter here, and nothing is ever deleted or delivered:
//! acknowledging an ingested file is the writer's job.

use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::batch::PolledBatch;
use crate::codec;
use crate::error::IngestError;

/// A decoded cache file and where it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScannedRecord {
    pub origin: PathBuf,
    pub batch: PolledBatch,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub records: Vec<ScannedRecord>,
    /// Not a valid batch
    pub corrupt: Vec<PathBuf>,
    /// Valid but carrying no device data
    pub inactive: Vec<PathBuf>,
    /// Could not be read (or walked)
    pub unreadable: Vec<PathBuf>,
}

/// Decode every `*.json` cache file under `root`
///
/// Bad files are skipped and reported; they never abort the scan.
pub fn scan(root: &Path) -> ScanReport {
    let mut report = ScanReport::default();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable path under {}: {}", root.display(), e);
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                report.unreadable.push(path);
                continue;
            }
        };

        if !entry.file_type().is_file() || !is_cache_file(entry.path()) {
            continue;
        }

        let path = entry.into_path();
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Cannot read cache file {}: {}", path.display(), e);
                report.unreadable.push(path);
                continue;
            }
        };

        match codec::decode(&bytes) {
            Ok(batch) if batch.is_active() => {
                debug!("Ingest candidate {}", path.display());
                report.records.push(ScannedRecord { origin: path, batch });
            }
            Ok(_) => {
                debug!("Skipping inactive batch {}", path.display());
                report.inactive.push(path);
            }
            Err(e) => {
                error!("Corrupt cache file {}: {}", path.display(), e);
                report.corrupt.push(path);
            }
        }
    }

    report
}

fn is_cache_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(true);
    !hidden && path.extension().and_then(|e| e.to_str()) == Some("json")
}

/// Hand-off seam to the storage writer
pub trait RecordSink {
    fn write(&mut self, record: &ScannedRecord) -> Result<(), IngestError>;
}

/// Writes one `{"origin": ..., "batch": ...}` JSON line per record
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn write(&mut self, record: &ScannedRecord) -> Result<(), IngestError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub handed_off: usize,
    pub sink_failures: usize,
    pub corrupt: usize,
    pub inactive: usize,
    pub unreadable: usize,
}

/// Scan `root` and feed every active record to `sink`
pub fn ingest(root: &Path, sink: &mut dyn RecordSink) -> IngestSummary {
    let report = scan(root);
    let mut summary = IngestSummary {
        corrupt: report.corrupt.len(),
        inactive: report.inactive.len(),
        unreadable: report.unreadable.len(),
        ..Default::default()
    };

    for record in &report.records {
        match sink.write(record) {
            Ok(()) => summary.handed_off += 1,
            Err(e) => {
                error!("Failed to hand off {}: {}", record.origin.display(), e);
                summary.sink_failures += 1;
            }
        }
    }

    info!(
        "Ingestion of {}: {} handed off, {} sink failures, {} corrupt, {} inactive, {} unreadable",
        root.display(),
        summary.handed_off,
        summary.sink_failures,
        summary.corrupt,
        summary.inactive,
        summary.unreadable
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BatchBuilder, DataType, DataVariable};

    fn active(ts: i64, agent: &str) -> PolledBatch {
        let mut b = BatchBuilder::new(ts, agent, "relay-agent", "h1");
        b.push(DataVariable::numeric("h1", "uptime", "0", DataType::Counter64, 1u64))
            .unwrap();
        b.finish()
    }

    fn put(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_scan_across_agents_and_subdirectories() {
        let root = tempfile::tempdir().unwrap();
        let a = put(
            &root.path().join("relay-agent"),
            "100_a_ff.json",
            &codec::encode(&active(100, "a")).unwrap(),
        );
        let b = put(
            &root.path().join("snmp-agent"),
            "100_b_ee.json",
            &codec::encode(&active(100, "b")).unwrap(),
        );
        put(root.path(), "README.txt", b"not a cache file");
        put(root.path(), ".100_a_ff.json.1.tmp", b"partial");

        let report = scan(root.path());
        let origins: Vec<_> = report.records.iter().map(|r| r.origin.clone()).collect();
        assert_eq!(origins, vec![a, b]);
        assert!(report.corrupt.is_empty());
    }

    #[test]
    fn test_corrupt_and_inactive_skipped() {
        let root = tempfile::tempdir().unwrap();
        put(root.path(), "1_a_ff.json", &codec::encode(&active(1, "a")).unwrap());
        let bad = put(root.path(), "2_a_ff.json", b"{oops");
        let empty = BatchBuilder::new(3, "a", "relay-agent", "h1").finish();
        let idle = put(root.path(), "3_a_ff.json", &codec::encode(&empty).unwrap());

        let report = scan(root.path());
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.corrupt, vec![bad.clone()]);
        assert_eq!(report.inactive, vec![idle]);
        assert!(bad.exists());
    }

    #[test]
    fn test_missing_root_is_reported_not_fatal() {
        let root = tempfile::tempdir().unwrap();
        let report = scan(&root.path().join("nope"));
        assert!(report.records.is_empty());
        assert_eq!(report.unreadable.len(), 1);
    }

    struct FailingSink;

    impl RecordSink for FailingSink {
        fn write(&mut self, record: &ScannedRecord) -> Result<(), IngestError> {
            Err(IngestError::Sink {
                origin: record.origin.clone(),
                reason: "database down".into(),
            })
        }
    }

    #[test]
    fn test_ingest_to_json_lines() {
        let root = tempfile::tempdir().unwrap();
        put(root.path(), "1_a_ff.json", &codec::encode(&active(1, "a")).unwrap());
        put(root.path(), "2_a_ff.json", &codec::encode(&active(2, "a")).unwrap());
        put(root.path(), "3_a_ff.json", b"[]");

        let mut sink = JsonLinesSink::new(Vec::new());
        let summary = ingest(root.path(), &mut sink);
        assert_eq!(summary.handed_off, 2);
        assert_eq!(summary.corrupt, 1);

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["batch"]["timestamp"], 1);
        assert!(lines[1]["origin"].as_str().unwrap().ends_with("2_a_ff.json"));
    }

    #[test]
    fn test_sink_failures_counted() {
        let root = tempfile::tempdir().unwrap();
        put(root.path(), "1_a_ff.json", &codec::encode(&active(1, "a")).unwrap());
        let summary = ingest(root.path(), &mut FailingSink);
        assert_eq!(summary.handed_off, 0);
        assert_eq!(summary.sink_failures, 1);
    }
}
