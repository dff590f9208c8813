use crate::error::{MemoryError, Result};
use crate::{key, paths};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

/// Which key-value store backs the shared memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Process-local map. Nothing is shared across processes.
    Memory,
    /// Embedded redb file, shared by processes on one host.
    Redb {
        #[serde(default = "default_db_path")]
        path: PathBuf,
        /// How long to wait for another process to release the file lock.
        #[serde(default = "default_busy_timeout_ms")]
        busy_timeout_ms: u64,
    },
    /// Networked Redis server. Requires the `redis` cargo feature.
    Redis {
        #[serde(default = "default_redis_host")]
        host: String,
        #[serde(default = "default_redis_port")]
        port: u16,
        #[serde(default)]
        password: Option<String>,
        #[serde(default)]
        db: i64,
    },
}

fn default_db_path() -> PathBuf {
    PathBuf::from(paths::DEFAULT_DB_FILE)
}

fn default_busy_timeout_ms() -> u64 {
    2_000
}

fn default_redis_host() -> String {
    "localhost".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Redb {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl StoreConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redb { .. } => "redb",
            Self::Redis { .. } => "redis",
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryConfig
// ---------------------------------------------------------------------------

/// Deployment settings, stored at `.agentmem/config.yaml`.
///
/// Every field has a default so a missing or partial file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryConfig {
    /// Key prefix isolating this deployment's records.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Record lifetime in seconds. Signed so a negative value in the file is
    /// reported instead of failing to parse.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: i64,
    /// Interval between polls in `wait_for`.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Default per-dependency timeout for the resolver and the CLI `wait`.
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
    #[serde(default)]
    pub store: StoreConfig,
    /// Agent id → role label, shown in the status view.
    #[serde(default)]
    pub roles: BTreeMap<String, String>,
}

fn default_namespace() -> String {
    "ai_collaboration".to_string()
}

fn default_ttl_seconds() -> i64 {
    3600
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_wait_timeout_ms() -> u64 {
    30_000
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            ttl_seconds: default_ttl_seconds(),
            poll_interval_ms: default_poll_interval_ms(),
            wait_timeout_ms: default_wait_timeout_ms(),
            store: StoreConfig::default(),
            roles: BTreeMap::new(),
        }
    }
}

impl MemoryConfig {
    /// In-memory store with defaults; what tests and demos start from.
    pub fn in_memory() -> Self {
        Self {
            store: StoreConfig::Memory,
            ..Self::default()
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds.max(0) as u64)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn role_of(&self, agent_id: &str) -> Option<&str> {
        self.roles.get(agent_id).map(String::as_str)
    }

    /// Load `.agentmem/config.yaml` under `root`, or defaults if it is absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: MemoryConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Result<()> {
        key::validate_namespace(&self.namespace)?;

        if self.ttl_seconds <= 0 {
            return Err(MemoryError::InvalidConfig(format!(
                "ttl_seconds must be a positive number of seconds, got {}",
                self.ttl_seconds
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(MemoryError::InvalidConfig(
                "poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.wait_timeout_ms == 0 {
            return Err(MemoryError::InvalidConfig(
                "wait_timeout_ms must be greater than zero".into(),
            ));
        }

        match &self.store {
            StoreConfig::Memory => {}
            StoreConfig::Redb { path, .. } => {
                if path.as_os_str().is_empty() {
                    return Err(MemoryError::InvalidConfig("store.path is empty".into()));
                }
            }
            StoreConfig::Redis { host, port, .. } => {
                if host.trim().is_empty() {
                    return Err(MemoryError::InvalidConfig("store.host is empty".into()));
                }
                if *port == 0 {
                    return Err(MemoryError::InvalidConfig("store.port must not be 0".into()));
                }
            }
        }

        for agent_id in self.roles.keys() {
            key::validate_id(agent_id)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        let cfg = MemoryConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.namespace, "ai_collaboration");
        assert_eq!(cfg.ttl(), Duration::from_secs(3600));
        assert_eq!(cfg.poll_interval(), Duration::from_millis(500));
        assert_eq!(cfg.store.kind(), "redb");
    }

    #[test]
    fn non_positive_ttl_is_rejected() {
        for ttl in [0, -5] {
            let cfg = MemoryConfig {
                ttl_seconds: ttl,
                ..MemoryConfig::default()
            };
            let err = cfg.validate().unwrap_err();
            assert!(matches!(err, MemoryError::InvalidConfig(_)), "ttl {ttl}");
        }
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let cfg = MemoryConfig {
            poll_interval_ms: 0,
            ..MemoryConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bad_namespace_is_rejected() {
        let cfg = MemoryConfig {
            namespace: "a:b".into(),
            ..MemoryConfig::default()
        };
        assert!(matches!(
            cfg.validate().unwrap_err(),
            MemoryError::InvalidConfig(_)
        ));
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "namespace: team\nstore:\n  type: redis\n  host: cache.internal\nroles:\n  kilo: frontend_development\n";
        let cfg: MemoryConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.namespace, "team");
        assert_eq!(cfg.ttl_seconds, 3600);
        assert_eq!(
            cfg.store,
            StoreConfig::Redis {
                host: "cache.internal".into(),
                port: 6379,
                password: None,
                db: 0,
            }
        );
        assert_eq!(cfg.role_of("kilo"), Some("frontend_development"));
        assert_eq!(cfg.role_of("roo"), None);
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = MemoryConfig::load(dir.path()).unwrap();
        assert_eq!(cfg, MemoryConfig::default());
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = TempDir::new().unwrap();
        let mut cfg = MemoryConfig::default();
        cfg.ttl_seconds = 120;
        cfg.roles.insert("roo".into(), "backend_integration".into());
        cfg.save(dir.path()).unwrap();

        let loaded = MemoryConfig::load(dir.path()).unwrap();
        assert_eq!(loaded.ttl_seconds, 120);
        assert_eq!(loaded.role_of("roo"), Some("backend_integration"));
    }
}
