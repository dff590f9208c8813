//! Key-value store adapters.
//!
//! The shared-memory service only needs four primitives from the external
//! store: an atomic single-key write with expiry, a read that reports absence
//! instead of failing, a best-effort prefix scan, and a delete. `ActionStore`
//! captures those; each backend maps its own failures to
//! `MemoryError::StoreUnavailable`.

pub mod memory;
pub mod redb;
#[cfg(feature = "redis")]
pub mod redis;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::config::StoreConfig;
use crate::error::{MemoryError, Result};
use crate::paths;
use crate::record::ActionRecord;

pub use self::memory::InMemoryStore;
pub use self::redb::RedbStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;

#[async_trait]
pub trait ActionStore: Send + Sync {
    /// Write `record` under `key`, replacing any previous value. Readers never
    /// observe a partial write.
    async fn put(&self, key: &str, record: &ActionRecord, ttl: Duration) -> Result<()>;

    /// Absent and expired keys both return `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<ActionRecord>>;

    /// Point-in-time view of every live key starting with `prefix`. May miss
    /// concurrent writes. Entries that fail to decode are skipped.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, ActionRecord)>>;

    /// Returns whether a live entry was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Evict expired entries for backends without native expiry.
    async fn purge_expired(&self) -> Result<usize> {
        Ok(0)
    }

    fn kind(&self) -> &'static str;
}

/// Build the store described by `config`. Relative redb paths resolve
/// against `root`.
pub async fn open_store(config: &StoreConfig, root: &Path) -> Result<Arc<dyn ActionStore>> {
    match config {
        StoreConfig::Memory => Ok(Arc::new(InMemoryStore::new())),
        StoreConfig::Redb {
            path,
            busy_timeout_ms,
        } => {
            let path = paths::resolve_store_path(root, path);
            let store = RedbStore::open(&path, Duration::from_millis(*busy_timeout_ms)).await?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "redis")]
        StoreConfig::Redis {
            host,
            port,
            password,
            db,
        } => {
            let store = RedisStore::connect(host, *port, password.clone(), *db).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redis"))]
        StoreConfig::Redis { .. } => Err(MemoryError::InvalidConfig(
            "store type 'redis' needs agentmem-core built with the `redis` feature".into(),
        )),
    }
}

/// Map any backend error into `StoreUnavailable`.
pub(crate) fn unavailable(err: impl std::fmt::Display) -> MemoryError {
    MemoryError::StoreUnavailable(err.to_string())
}

/// Decode raw scan results, dropping entries that are not valid records.
pub(crate) fn decode_entries(raw: Vec<(String, Vec<u8>)>) -> Vec<(String, ActionRecord)> {
    raw.into_iter()
        .filter_map(|(key, bytes)| match ActionRecord::from_bytes(&key, &bytes) {
            Ok(record) => Some((key, record)),
            Err(e) => {
                warn!(key = %key, error = %e, "skipping undecodable entry");
                None
            }
        })
        .collect()
}
