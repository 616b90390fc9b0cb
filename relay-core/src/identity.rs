//! Agent identification
//!
//! Each agent program gets a stable agent ID, generated once and persisted
//! under the daemon directory as `{program}.agent_id`. The ID ends up in
//! every cache filename and in the collector URL, so it must survive
//! restarts.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::cache::write_file_atomic;
use crate::error::IdentityError;

/// `AI_CANONNAME` has the same value on Linux, the BSDs, macOS and Windows
const AI_CANONNAME: i32 = 0x0002;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    pub agent_id: String,
    pub agent_program: String,
    pub hostname: String,
}

impl AgentIdentity {
    /// Load the persisted agent ID for `program`, creating it on first run
    pub fn load_or_create(
        daemon_dir: &Path,
        program: &str,
        hostname: &str,
    ) -> Result<Self, IdentityError> {
        if program.is_empty() {
            return Err(IdentityError::EmptyProgram);
        }

        let path = Self::id_file_path(daemon_dir, program);
        let agent_id = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|source| IdentityError::Io {
                path: path.clone(),
                source,
            })?;
            let id = content.trim().to_string();
            if id.is_empty() {
                return Err(IdentityError::Empty(path));
            }
            debug!("Loaded agent ID for {} from {}", program, path.display());
            id
        } else {
            let id = generate_agent_id(program, hostname);
            std::fs::create_dir_all(daemon_dir).map_err(|source| IdentityError::Io {
                path: daemon_dir.to_path_buf(),
                source,
            })?;
            write_file_atomic(daemon_dir, &path, id.as_bytes()).map_err(|source| {
                IdentityError::Io {
                    path: path.clone(),
                    source,
                }
            })?;
            info!("Generated agent ID {} for {}", id, program);
            id
        };

        Ok(Self {
            agent_id,
            agent_program: program.to_string(),
            hostname: hostname.to_string(),
        })
    }

    pub fn id_file_path(daemon_dir: &Path, program: &str) -> PathBuf {
        daemon_dir.join(format!("{program}.agent_id"))
    }
}

fn generate_agent_id(program: &str, hostname: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(program.as_bytes());
    hasher.update(hostname.as_bytes());
    hasher.update(uuid::Uuid::new_v4().as_bytes());
    hex::encode(hasher.finalize())
}

/// Fully-qualified name of this host, used as `agent_hostname`
///
/// The OS hostname is resolved to its canonical name; when that fails or
/// yields nothing better the OS hostname is used as-is.
pub fn local_hostname() -> String {
    let short = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "localhost".to_string());
    let canonical = canonical_name(&short);
    pick_fqdn(short, canonical)
}

fn canonical_name(host: &str) -> Option<String> {
    let hints = dns_lookup::AddrInfoHints {
        flags: AI_CANONNAME,
        ..Default::default()
    };
    let addrs = match dns_lookup::getaddrinfo(Some(host), None, Some(hints)) {
        Ok(addrs) => addrs,
        Err(e) => {
            warn!("Could not resolve canonical name for {}: {:?}", host, e);
            return None;
        }
    };
    addrs
        .filter_map(Result::ok)
        .find_map(|info| info.canonname)
}

fn pick_fqdn(short: String, canonical: Option<String>) -> String {
    match canonical {
        Some(name)
            if name.contains('.')
                && !name.starts_with("localhost")
                && name.split('.').next() == short.split('.').next() =>
        {
            name
        }
        _ => short,
    }
}
