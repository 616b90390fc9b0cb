//! Telemetry Relay Ingester - one-shot scan of every agent's cache
//!
//! Decodes all cache files under the ingester root (`ingester.cache_directory`,
//! defaulting to `main.cache_directory`), keeps the
//! active batches and writes them as JSON lines to stdout for the storage
//! writer. Files are left in place; acknowledging them is the writer's job.

use anyhow::{bail, Context, Result};
use relay_core::ingest::{self, IngestSummary, JsonLinesSink};
use relay_core::logging::init_logging;
use relay_core::RelayConfig;
use std::path::Path;
use tracing::{info, warn};

fn run(root: &Path) -> Result<IngestSummary> {
    if !root.is_dir() {
        bail!("Cache root {} is not a directory", root.display());
    }

    info!("Scanning {} for cached batches", root.display());
    let stdout = std::io::stdout();
    let mut sink = JsonLinesSink::new(stdout.lock());
    let summary = ingest::ingest(root, &mut sink);

    if summary.corrupt > 0 {
        warn!(
            "{} corrupt cache file(s) under {} need attention",
            summary.corrupt,
            root.display()
        );
    }
    Ok(summary)
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = RelayConfig::load().context("Failed to load configuration")?;
    init_logging(&config.main.log_level);

    let summary = run(config.ingester_root()).context("Ingestion failed")?;
    if summary.sink_failures > 0 {
        bail!("{} record(s) could not be handed off", summary.sink_failures);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(&dir.path().join("absent")).is_err());
    }

    #[test]
    fn test_empty_root_scans_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let summary = run(dir.path()).unwrap();
        assert_eq!(summary, IngestSummary::default());
    }
}
