//! Delivery client: one HTTP POST of a batch to the collector
//!
//! A single attempt, bounded by the configured timeout. No retries, no disk
//! access; the caller decides what to do with a failed outcome.

use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::batch::PolledBatch;
use crate::codec;

/// Result of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Collector answered 200
    Delivered,
    /// Collector answered with any other status
    Rejected { status: u16 },
    /// No response: connection error, timeout, unencodable body
    Unreachable { reason: String },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryClient {
    http: reqwest::Client,
}

impl DeliveryClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("relay-core/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    /// POST `batch` to `endpoint` and classify the result
    pub async fn post(&self, endpoint: &str, batch: &PolledBatch) -> DeliveryOutcome {
        let body = match codec::encode(batch) {
            Ok(body) => body,
            Err(e) => {
                return DeliveryOutcome::Unreachable {
                    reason: e.to_string(),
                }
            }
        };

        debug!("Posting {} bytes to {}", body.len(), endpoint);
        let result = self
            .http
            .post(endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await;

        match result {
            Ok(response) if response.status() == StatusCode::OK => {
                info!(
                    "Agent \"{}\" delivered batch {} to {}",
                    batch.agent_program, batch.timestamp, endpoint
                );
                DeliveryOutcome::Delivered
            }
            Ok(response) => {
                let status = response.status().as_u16();
                warn!(
                    "Agent \"{}\" batch {} rejected by {} (HTTP {})",
                    batch.agent_program, batch.timestamp, endpoint, status
                );
                DeliveryOutcome::Rejected { status }
            }
            Err(e) => {
                warn!(
                    "Agent \"{}\" failed to contact {}: {}",
                    batch.agent_program, endpoint, e
                );
                DeliveryOutcome::Unreachable {
                    reason: e.to_string(),
                }
            }
        }
    }
}
