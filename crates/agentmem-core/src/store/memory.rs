use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{decode_entries, unavailable, ActionStore};
use crate::error::{MemoryError, Result};
use crate::record::ActionRecord;

struct Entry {
    bytes: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Process-local store. Values are kept serialized so reads go through the
/// same decode path as the persistent backends.
///
/// Expiry uses the tokio clock, which tests can pause and advance.
pub struct InMemoryStore {
    entries: Mutex<BTreeMap<String, Entry>>,
    online: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            online: AtomicBool::new(true),
        }
    }

    /// Take the store offline (or bring it back). While offline every
    /// operation fails with `StoreUnavailable`.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        match self.entries.lock() {
            Ok(map) => map.values().filter(|e| e.is_live(now)).count(),
            Err(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> Result<MutexGuard<'_, BTreeMap<String, Entry>>> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(MemoryError::StoreUnavailable(
                "in-memory store is offline".into(),
            ));
        }
        self.entries.lock().map_err(unavailable)
    }
}

#[async_trait]
impl ActionStore for InMemoryStore {
    async fn put(&self, key: &str, record: &ActionRecord, ttl: Duration) -> Result<()> {
        let bytes = record.to_bytes()?;
        let expires_at = Instant::now() + ttl;
        self.entries()?
            .insert(key.to_string(), Entry { bytes, expires_at });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<ActionRecord>> {
        let now = Instant::now();
        let mut map = self.entries()?;
        let bytes = match map.get(key) {
            Some(entry) if entry.is_live(now) => entry.bytes.clone(),
            Some(_) => {
                map.remove(key);
                return Ok(None);
            }
            None => return Ok(None),
        };
        drop(map);
        ActionRecord::from_bytes(key, &bytes).map(Some)
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, ActionRecord)>> {
        let now = Instant::now();
        let raw: Vec<(String, Vec<u8>)> = {
            let map = self.entries()?;
            map.range(prefix.to_string()..)
                .take_while(|(k, _)| k.starts_with(prefix))
                .filter(|(_, e)| e.is_live(now))
                .map(|(k, e)| (k.clone(), e.bytes.clone()))
                .collect()
        };
        Ok(decode_entries(raw))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        Ok(self
            .entries()?
            .remove(key)
            .is_some_and(|e| e.is_live(now)))
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = Instant::now();
        let mut map = self.entries()?;
        let before = map.len();
        map.retain(|_, e| e.is_live(now));
        Ok(before - map.len())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
