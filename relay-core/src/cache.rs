//! Durable cache store
//!
//! One JSON file per undelivered batch, named
//! `{timestamp}_{agent_id}_{fingerprint}.json`. The directory works as a
//! crude write-ahead log:
//! - every undelivered batch has exactly one file
//! - every delivered batch has none
//!
//! Writes go through a hidden temp file and an atomic rename, removes are a
//! single unlink, so the invariant holds after every completed operation even
//! if the process dies right after. Several agents may share one directory:
//! a store only lists files carrying its own `_{agent_id}_{fingerprint}.json`
//! suffix.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::batch::PolledBatch;
use crate::codec;
use crate::error::CacheError;
use crate::fingerprint::{fingerprint, HashAlgorithm};

/// `{timestamp}_{agent_id}_{fingerprint}.json`
pub fn cache_filename(timestamp: i64, agent_id: &str, fingerprint: &str) -> String {
    format!("{timestamp}_{agent_id}_{fingerprint}.json")
}

/// Cache directory view scoped to one agent on one host
#[derive(Debug, Clone)]
pub struct CacheStore {
    directory: PathBuf,
    algorithm: HashAlgorithm,
    suffix: String,
}

impl CacheStore {
    /// Open (and create if needed) the cache directory for this agent
    pub fn open(
        directory: impl Into<PathBuf>,
        agent_id: &str,
        hostname: &str,
        algorithm: HashAlgorithm,
    ) -> Result<Self, CacheError> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|e| CacheError::io(&directory, e))?;

        let suffix = format!("_{}_{}.json", agent_id, fingerprint(hostname, algorithm));
        debug!("Cache store at {} (suffix {})", directory.display(), suffix);

        Ok(Self {
            directory,
            algorithm,
            suffix,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Filename suffix shared by every file this agent owns
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Path the given batch is cached under
    pub fn path_for(&self, batch: &PolledBatch) -> PathBuf {
        let fp = fingerprint(&batch.agent_hostname, self.algorithm);
        self.directory
            .join(cache_filename(batch.timestamp, &batch.agent_id, &fp))
    }

    /// Persist a batch, replacing any file with the same name
    pub fn write(&self, batch: &PolledBatch) -> Result<PathBuf, CacheError> {
        let path = self.path_for(batch);
        if !self.owns(&path) {
            warn!(
                "Caching batch from agent {} outside this store's partition: {}",
                batch.agent_id,
                path.display()
            );
        }

        let bytes = codec::encode(batch)?;
        self.write_atomic(&path, &bytes)?;
        debug!("Cached batch at {}", path.display());
        Ok(path)
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
        write_file_atomic(&self.directory, path, bytes).map_err(|e| CacheError::io(path, e))
    }

    /// This agent's cache files, sorted by name
    pub fn list(&self) -> Result<Vec<PathBuf>, CacheError> {
        let entries = fs::read_dir(&self.directory).map_err(|e| CacheError::io(&self.directory, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::io(&self.directory, e))?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            let path = entry.path();
            if is_file && self.owns(&path) {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    pub fn read(&self, path: &Path) -> Result<Vec<u8>, CacheError> {
        fs::read(path).map_err(|e| CacheError::io(path, e))
    }

    /// Delete one cache file (only after a confirmed delivery)
    pub fn remove(&self, path: &Path) -> Result<(), CacheError> {
        fs::remove_file(path).map_err(|e| CacheError::io(path, e))
    }

    /// `<digits>` + own suffix, nothing else
    fn owns(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        match name.strip_suffix(self.suffix.as_str()) {
            Some(ts) => !ts.is_empty() && ts.bytes().all(|b| b.is_ascii_digit() || b == b'-'),
            None => false,
        }
    }
}

/// Write `bytes` to `path` via a hidden temp file in `directory` and a rename
///
/// Readers see either the old content or the complete new content.
pub(crate) fn write_file_atomic(
    directory: &Path,
    path: &Path,
    bytes: &[u8],
) -> std::io::Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp_path = directory.join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()));

    let result = (|| {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    // Make the rename itself durable
    #[cfg(unix)]
    {
        if let Ok(dir) = File::open(directory) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BatchBuilder, DataType, DataVariable};

    fn batch(ts: i64, agent: &str, host: &str) -> PolledBatch {
        let mut b = BatchBuilder::new(ts, agent, "relay-agent", host);
        b.push(DataVariable::numeric(host, "uptime", "0", DataType::Counter64, 42u64))
            .unwrap();
        b.finish()
    }

    #[test]
    fn test_filename_format() {
        assert_eq!(
            cache_filename(1_700_000_000, "abc123", "ff00"),
            "1700000000_abc123_ff00.json"
        );
    }

    #[test]
    fn test_write_read_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path(), "abc123", "h1", HashAlgorithm::Sha1).unwrap();
        let b = batch(100, "abc123", "h1");

        let path = store.write(&b).unwrap();
        assert!(path.exists());
        assert_eq!(store.list().unwrap(), vec![path.clone()]);
        assert_eq!(codec::decode(&store.read(&path).unwrap()).unwrap(), b);

        store.remove(&path).unwrap();
        assert!(store.list().unwrap().is_empty());
        assert!(store.remove(&path).is_err());
    }

    #[test]
    fn test_same_name_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path(), "abc123", "h1", HashAlgorithm::Sha1).unwrap();
        store.write(&batch(100, "abc123", "h1")).unwrap();
        store.write(&batch(100, "abc123", "h1")).unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
        // no temp files left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_list_ignores_foreign_and_stray_files() {
        let dir = tempfile::tempdir().unwrap();
        let mine = CacheStore::open(dir.path(), "abc123", "h1", HashAlgorithm::Sha1).unwrap();
        let other = CacheStore::open(dir.path(), "def456", "h1", HashAlgorithm::Sha1).unwrap();

        mine.write(&batch(100, "abc123", "h1")).unwrap();
        other.write(&batch(100, "def456", "h1")).unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::write(dir.path().join(format!(".tmp{}", mine.suffix())), "x").unwrap();
        fs::create_dir(dir.path().join(format!("200{}", mine.suffix()))).unwrap();

        assert_eq!(mine.list().unwrap().len(), 1);
        assert_eq!(other.list().unwrap().len(), 1);
        assert_ne!(mine.list().unwrap(), other.list().unwrap());
    }

    #[test]
    fn test_open_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        CacheStore::open(&nested, "abc123", "h1", HashAlgorithm::Sha1).unwrap();
        assert!(nested.is_dir());
    }
}
