//! Telemetry Relay Agent - polls the local host and delivers durably
//!
//! Every polling interval the agent:
//! - Collects host metrics into one batch
//! - Posts it to the collector (cached on disk if that fails)
//! - Replays whatever is still waiting in its cache directory

mod metrics;

use anyhow::{Context, Result};
use chrono::Utc;
use relay_core::batch::{normalized_timestamp, BatchBuilder};
use relay_core::identity::local_hostname;
use relay_core::logging::init_logging;
use relay_core::{AgentIdentity, CacheStore, PolledBatch, Relay, RelayConfig, SubmitOutcome};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const AGENT_PROGRAM: &str = "relay-agent";

/// Main agent state
struct Agent {
    config: RelayConfig,
    identity: AgentIdentity,
    relay: Relay,
}

impl Agent {
    /// Create new agent instance
    fn new(config: RelayConfig, hostname: &str) -> Result<Self> {
        let identity =
            AgentIdentity::load_or_create(&config.main.daemon_directory, AGENT_PROGRAM, hostname)
                .context("Failed to load agent identity")?;

        let store = CacheStore::open(
            config.agent_cache_directory(AGENT_PROGRAM),
            &identity.agent_id,
            &identity.hostname,
            config.agent.fingerprint,
        )
        .context("Failed to open cache directory")?;

        let relay = Relay::with_timeout(
            identity.agent_id.clone(),
            config.collector_url(&identity.agent_id),
            config.delivery_timeout(),
            store,
        )
        .context("Failed to build HTTP client")?;

        info!(
            "Agent initialized - ID: {}, Hostname: {}, Collector: {}",
            identity.agent_id,
            identity.hostname,
            relay.endpoint()
        );

        Ok(Agent {
            config,
            identity,
            relay,
        })
    }

    /// Start agent main loop
    async fn run(&self) -> Result<()> {
        info!(
            "Starting agent main loop (every {}s)...",
            self.config.agent.polling_interval
        );

        let mut poll_timer = interval(self.config.polling_interval());
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = poll_timer.tick() => {
                    self.cycle().await;
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested, exiting");
                    return Ok(());
                }
            }
        }
    }

    /// One poll: submit a fresh batch, then replay the cache
    async fn cycle(&self) {
        let batch = match self.poll().await {
            Ok(batch) => batch,
            Err(e) => {
                error!("Failed to build batch: {:#}", e);
                return;
            }
        };

        match self.relay.submit(&batch).await {
            SubmitOutcome::Delivered => debug!("Batch {} delivered", batch.timestamp),
            SubmitOutcome::Cached { .. } => {}
            SubmitOutcome::Lost { error, .. } => {
                error!("Cache directory unusable, check disk space and permissions: {}", error);
            }
        }

        match self.relay.purge().await {
            Ok(summary) => debug!("Purge summary: {:?}", summary),
            Err(e) => warn!("Purge skipped: {}", e),
        }
    }

    /// Build this cycle's batch from host metrics
    async fn poll(&self) -> Result<PolledBatch> {
        let timestamp = normalized_timestamp(Utc::now(), self.config.agent.polling_interval);
        let mut builder = BatchBuilder::for_identity(&self.identity, timestamp)
            .with_descriptions(metrics::label_descriptions());

        builder
            .extend(metrics::collect(&self.identity.hostname).await)
            .context("Invalid host sample")?;
        Ok(builder.finish())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = RelayConfig::load().context("Failed to load configuration")?;
    init_logging(&config.main.log_level);

    info!("Telemetry Relay Agent starting...");

    let agent = Agent::new(config, &local_hostname()).context("Failed to create agent")?;
    agent.run().await.context("Agent execution failed")?;

    Ok(())
}
