//! Telemetry Relay core - durable delivery of polled batches
//!
//! Agents hand a finished [`PolledBatch`] to a [`Relay`]:
//! - delivered on HTTP 200, or
//! - written to this agent's cache directory for a later purge pass.
//!
//! The ingester side walks every agent's cache with [`ingest::scan`] and
//! hands the decoded batches to a [`ingest::RecordSink`].

pub mod batch;
pub mod cache;
pub mod codec;
pub mod config;
pub mod delivery;
pub mod error;
pub mod fingerprint;
pub mod identity;
pub mod ingest;
pub mod logging;
pub mod purge;
pub mod relay;

pub use batch::{BatchBuilder, DataType, DataVariable, NumericValue, PolledBatch, Sample};
pub use cache::CacheStore;
pub use config::RelayConfig;
pub use delivery::{DeliveryClient, DeliveryOutcome};
pub use fingerprint::{fingerprint, HashAlgorithm};
pub use identity::AgentIdentity;
pub use purge::PurgeSummary;
pub use relay::{Relay, SubmitOutcome};
