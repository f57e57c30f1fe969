//! Configuration loading for the tracker daemon
//!
//! A JSON file supplies every setting; each has a default, so `{}` is a
//! valid configuration. `FGTRACKER_HOST`, `FGTRACKER_PORT` and
//! `FGTRACKER_DB` override the file.

use std::collections::HashSet;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use fgtracker_core::TrustEntry;
use fgtracker_gateway::{ProtocolSpec, TransportConfig};
use fgtracker_store::StoreTarget;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bootstrap::BindRetry;

/// Store path meaning "private in-memory database"
pub const MEMORY_STORE: &str = ":memory:";

/// Upper bound for interval settings (one day)
const MAX_INTERVAL_SECS: u64 = 86_400;

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub server: ListenConfig,

    /// Silence before an identified peer is pinged
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Sleep between ticks when nothing was accepted
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default)]
    pub store: StoreConfig,

    /// Recognized protocol families
    #[serde(default = "ProtocolSpec::defaults")]
    pub protocols: Vec<ProtocolSpec>,

    /// Trust entries upserted into the store at startup
    #[serde(default)]
    pub trusted_servers: Vec<TrustEntry>,
}

/// Listening socket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Wait between bind attempts
    #[serde(default = "default_bind_retry_secs")]
    pub bind_retry_secs: u64,
    /// Give up after this many failed binds; unlimited when absent
    #[serde(default)]
    pub bind_max_attempts: Option<u32>,
}

/// Relational store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite file, or `:memory:`
    #[serde(default = "default_store_path")]
    pub path: String,
    /// Minimum time between reconnect attempts while the store is down
    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_bind_retry_secs() -> u64 {
    10
}

fn default_ping_interval_secs() -> u64 {
    60
}

fn default_tick_interval_ms() -> u64 {
    200
}

fn default_store_path() -> String {
    "fgtracker.sqlite".to_string()
}

fn default_reconnect_interval_secs() -> u64 {
    60
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bind_retry_secs: default_bind_retry_secs(),
            bind_max_attempts: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            reconnect_interval_secs: default_reconnect_interval_secs(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            server: ListenConfig::default(),
            ping_interval_secs: default_ping_interval_secs(),
            tick_interval_ms: default_tick_interval_ms(),
            store: StoreConfig::default(),
            protocols: ProtocolSpec::defaults(),
            trusted_servers: Vec::new(),
        }
    }
}

impl TrackerConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `FGTRACKER_*` environment overrides
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (environment in production)
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = lookup("FGTRACKER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("FGTRACKER_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("FGTRACKER_PORT={port}")))?;
        }
        if let Some(path) = lookup("FGTRACKER_DB") {
            self.store.path = path;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocols.is_empty() {
            return Err(ConfigError::Invalid("no protocols configured".into()));
        }
        let mut keys = HashSet::new();
        for protocol in &self.protocols {
            if protocol.key.is_empty() || protocol.key.contains(char::is_whitespace) {
                return Err(ConfigError::Invalid(format!(
                    "bad protocol key {:?}",
                    protocol.key
                )));
            }
            if !keys.insert(protocol.key.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate protocol {}",
                    protocol.key
                )));
            }
        }
        if self.ping_interval_secs == 0 || self.ping_interval_secs > MAX_INTERVAL_SECS {
            return Err(ConfigError::Invalid(format!(
                "ping_interval_secs must be within 1..={MAX_INTERVAL_SECS}"
            )));
        }
        if self.store.reconnect_interval_secs > MAX_INTERVAL_SECS {
            return Err(ConfigError::Invalid(format!(
                "reconnect_interval_secs must be at most {MAX_INTERVAL_SECS}"
            )));
        }
        if self.store.path.is_empty() {
            return Err(ConfigError::Invalid("store path is empty".into()));
        }
        Ok(())
    }

    /// Resolve the listen host and port
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let target = (self.server.host.as_str(), self.server.port);
        target
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "cannot resolve listen address {}:{}",
                    self.server.host, self.server.port
                ))
            })
    }

    pub fn store_target(&self) -> StoreTarget {
        if self.store.path == MEMORY_STORE {
            StoreTarget::Memory
        } else {
            StoreTarget::File(PathBuf::from(&self.store.path))
        }
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig::default().with_ping_interval(seconds(self.ping_interval_secs))
    }

    pub fn bind_retry(&self) -> BindRetry {
        BindRetry {
            backoff: Duration::from_secs(self.server.bind_retry_secs),
            max_attempts: self.server.bind_max_attempts,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn reconnect_interval(&self) -> chrono::Duration {
        seconds(self.store.reconnect_interval_secs)
    }
}

fn seconds(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_INTERVAL_SECS) as i64)
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
