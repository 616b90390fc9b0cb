//! Relay facade for one agent instance
//!
//! Ties together the delivery client, the agent's cache store and its
//! collector endpoint:
//! - `submit` : post a fresh batch, cache it if the post fails
//! - `purge`  : replay the cache, one pass at a time per instance

use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::batch::PolledBatch;
use crate::cache::CacheStore;
use crate::delivery::{DeliveryClient, DeliveryOutcome};
use crate::error::{CacheError, RelayError};
use crate::purge::{self, PurgeSummary};

/// Result of submitting a fresh batch
#[derive(Debug)]
pub enum SubmitOutcome {
    Delivered,
    /// Delivery failed, batch is safe in the cache
    Cached {
        outcome: DeliveryOutcome,
        path: std::path::PathBuf,
    },
    /// Delivery failed and the cache write failed too: the batch is gone
    Lost {
        outcome: DeliveryOutcome,
        error: CacheError,
    },
}

pub struct Relay {
    agent_id: String,
    endpoint: String,
    client: DeliveryClient,
    store: CacheStore,
    purge_lock: Mutex<()>,
}

impl Relay {
    pub fn new(
        agent_id: impl Into<String>,
        endpoint: impl Into<String>,
        client: DeliveryClient,
        store: CacheStore,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            endpoint: endpoint.into(),
            client,
            store,
            purge_lock: Mutex::new(()),
        }
    }

    /// Convenience constructor building the HTTP client from a timeout
    pub fn with_timeout(
        agent_id: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
        store: CacheStore,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self::new(agent_id, endpoint, DeliveryClient::new(timeout)?, store))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Deliver a batch now, or persist it for the next purge pass
    pub async fn submit(&self, batch: &PolledBatch) -> SubmitOutcome {
        let outcome = self.client.post(&self.endpoint, batch).await;
        if outcome.is_delivered() {
            return SubmitOutcome::Delivered;
        }

        match self.store.write(batch) {
            Ok(path) => {
                warn!(
                    "Batch {} cached at {} for later delivery",
                    batch.timestamp,
                    path.display()
                );
                SubmitOutcome::Cached { outcome, path }
            }
            Err(e) => {
                error!(
                    "DATA LOSS: batch {} from agent {} could not be delivered nor cached: {}",
                    batch.timestamp, batch.agent_id, e
                );
                SubmitOutcome::Lost { outcome, error: e }
            }
        }
    }

    /// Run one purge pass; refuses to overlap with a pass already running
    pub async fn purge(&self) -> Result<PurgeSummary, RelayError> {
        let _guard = self
            .purge_lock
            .try_lock()
            .map_err(|_| RelayError::PurgeInProgress(self.agent_id.clone()))?;

        Ok(purge::purge(&self.store, &self.client, &self.endpoint).await?)
    }
}
