//! Relay configuration
//!
//! Loaded from a YAML file whose path comes from `RELAY_CONFIG` (default
//! `relay.yaml`). A missing file means first run: defaults are used. Every
//! section and field is optional in the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::fingerprint::HashAlgorithm;

pub const CONFIG_ENV_VAR: &str = "RELAY_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "relay.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub main: MainConfig,
    pub collector: CollectorConfig,
    pub agent: AgentSettings,
    pub ingester: IngesterConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MainConfig {
    /// Root of per-program cache directories
    pub cache_directory: PathBuf,
    /// Where agent ID files live
    pub daemon_directory: PathBuf,
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub ip_address: String,
    pub ip_bind_port: u16,
    pub path: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub polling_interval: u64,
    pub fingerprint: HashAlgorithm,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngesterConfig {
    /// Root scanned by the ingester; unset means `main.cache_directory`
    pub cache_directory: Option<PathBuf>,
}

fn base_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("telemetry-relay")
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            cache_directory: base_directory().join("cache"),
            daemon_directory: base_directory().join("daemon"),
            log_level: "info".to_string(),
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            ip_address: "127.0.0.1".to_string(),
            ip_bind_port: 20201,
            path: "/relay/api/v1/agent/receive".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            polling_interval: 300,
            fingerprint: HashAlgorithm::Sha1,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            main: MainConfig::default(),
            collector: CollectorConfig::default(),
            agent: AgentSettings::default(),
            ingester: IngesterConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Load from `$RELAY_CONFIG` or `./relay.yaml`
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&text).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
                path: PathBuf::new(),
                source,
            })?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.main.cache_directory.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("main.cache_directory is empty".into()));
        }
        if self.main.daemon_directory.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("main.daemon_directory is empty".into()));
        }
        if self
            .ingester
            .cache_directory
            .as_ref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            return Err(ConfigError::Invalid("ingester.cache_directory is empty".into()));
        }
        if self.collector.ip_address.trim().is_empty() {
            return Err(ConfigError::Invalid("collector.ip_address is empty".into()));
        }
        if self.collector.timeout_secs == 0 {
            return Err(ConfigError::Invalid("collector.timeout_secs must be > 0".into()));
        }
        if self.agent.polling_interval == 0 {
            return Err(ConfigError::Invalid("agent.polling_interval must be > 0".into()));
        }
        Ok(())
    }

    /// Cache directory for one agent program
    pub fn agent_cache_directory(&self, agent_program: &str) -> PathBuf {
        self.main.cache_directory.join(agent_program)
    }

    /// Root the ingester walks, covering every agent's cache directory
    pub fn ingester_root(&self) -> &Path {
        self.ingester
            .cache_directory
            .as_deref()
            .unwrap_or(&self.main.cache_directory)
    }

    /// Collector endpoint for one agent ID
    pub fn collector_url(&self, agent_id: &str) -> String {
        let host = if self.collector.ip_address.contains(':') {
            format!("[{}]", self.collector.ip_address)
        } else {
            self.collector.ip_address.clone()
        };
        let path = self.collector.path.trim_end_matches('/');
        let path = if path.starts_with('/') || path.is_empty() {
            path.to_string()
        } else {
            format!("/{path}")
        };
        format!(
            "http://{}:{}{}/{}",
            host, self.collector.ip_bind_port, path, agent_id
        )
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.collector.timeout_secs)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.agent.polling_interval)
    }
}
