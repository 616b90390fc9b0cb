//! Error types for the relay subsystem
//!
//! Delivery failures are not errors: they are reported as
//! [`crate::delivery::DeliveryOutcome`] values and degrade to a cache write.
//! Everything here is a local failure (filesystem, payload shape, config).

use std::path::PathBuf;

/// Record codec failures
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Payload is not a well-formed batch. The cache file stays on disk.
    #[error("corrupt batch payload: {0}")]
    Corrupt(String),
    #[error("failed to encode batch: {0}")]
    Encode(#[source] serde_json::Error),
    /// JSON has no NaN or infinity; such a batch would not decode again.
    #[error("label '{label}' on device '{device}' has a non-finite value")]
    NonFinite { device: String, label: String },
}

/// Durable cache store failures
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Encode(#[from] CodecError),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Configuration loading failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Agent identity failures
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("agent ID file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("agent ID file {0} is empty")]
    Empty(PathBuf),
    #[error("agent program name must not be empty")]
    EmptyProgram,
}

/// Batch builder failures
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("label '{label}' on device '{device}' has a non-finite value")]
    NonFiniteValue { device: String, label: String },
    #[error("label '{label}' on device '{device}' mixes numeric and text samples")]
    MixedLabel { device: String, label: String },
    #[error("label '{label}' on device '{device}' already has a different numeric type")]
    ConflictingType { device: String, label: String },
    #[error("empty device or label name")]
    EmptyName,
}

/// Errors surfaced by the [`crate::relay::Relay`] facade
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("a purge pass is already running for agent {0}")]
    PurgeInProgress(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Ingestion hand-off failures
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("record sink failed for {origin}: {reason}")]
    Sink { origin: PathBuf, reason: String },
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sink serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
