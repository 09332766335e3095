//! Configuration types for ShardMeta
//!
//! This module defines configuration structures used across components.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for ShardMeta
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Repository configuration
    pub repository: RepositoryConfig,
    /// Cluster coordination configuration
    pub cluster: ClusterConfig,
    /// Data source pool teardown configuration
    pub pool: PoolConfig,
    /// Logging configuration
    pub log: LogConfig,
}

/// Backend holding the hierarchical configuration tree
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryBackend {
    /// Process-local tree, lost on restart
    Memory,
    /// redb file on local disk
    #[default]
    Redb,
}

/// Repository configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Which backend to use
    pub backend: RepositoryBackend,
    /// Path of the redb file (ignored by the memory backend)
    pub path: PathBuf,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            backend: RepositoryBackend::Redb,
            path: PathBuf::from("/var/lib/shardmeta/meta.redb"),
        }
    }
}

/// Cluster coordination configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Upper bound on waiting for another component to install a rebuilt
    /// generation after a rule change (milliseconds)
    pub reload_timeout_ms: u64,
}

impl ClusterConfig {
    #[must_use]
    pub const fn reload_timeout(&self) -> Duration {
        Duration::from_millis(self.reload_timeout_ms)
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            reload_timeout_ms: 3000,
        }
    }
}

/// Data source pool teardown configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// How often a retiring pool is checked for in-flight connections (milliseconds)
    pub drain_poll_interval_ms: u64,
    /// Maximum time to wait for in-flight connections before closing anyway (milliseconds)
    pub drain_timeout_ms: u64,
}

impl PoolConfig {
    #[must_use]
    pub const fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain_poll_interval_ms)
    }

    #[must_use]
    pub const fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            drain_poll_interval_ms: 10,
            drain_timeout_ms: 30_000,
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.repository.backend, RepositoryBackend::Redb);
        assert_eq!(config.cluster.reload_timeout(), Duration::from_secs(3));
        assert_eq!(config.pool.drain_poll_interval(), Duration::from_millis(10));
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"repository": {"backend": "memory"}, "cluster": {"reload_timeout_ms": 500}}"#)
                .unwrap();
        assert_eq!(config.repository.backend, RepositoryBackend::Memory);
        assert_eq!(config.cluster.reload_timeout_ms, 500);
        assert_eq!(config.pool.drain_timeout_ms, 30_000);
    }
}
