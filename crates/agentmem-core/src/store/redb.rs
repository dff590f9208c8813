//! Embedded redb backend.
//!
//! # Table design
//!
//! A single `ACTIONS` table keyed by the full store key
//! (`<namespace>:<agentId>:<actionId>`). redb orders `&str` keys
//! lexicographically, so a prefix scan is one range read starting at the
//! prefix and stopping at the first key that no longer matches.
//!
//! Values carry their own expiry:
//! ```text
//! [ expires_at_ms: u64 big-endian (8 bytes) | JSON-encoded ActionRecord ]
//! ```
//! Expired entries read as absent and are dropped by `purge_expired`.
//!
//! redb takes an exclusive file lock per open `Database`. Each operation
//! opens the file, does one transaction, and closes it again, so several
//! processes can share one file; a contended open is retried until
//! `busy_timeout` elapses.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redb::{Database, DatabaseError, ReadableTable, TableDefinition};
use tracing::debug;

use super::{decode_entries, unavailable, ActionStore};
use crate::error::Result;
use crate::record::ActionRecord;

// ---------------------------------------------------------------------------
// Table definition
// ---------------------------------------------------------------------------

/// Key: store key. Value: expiry header ++ JSON record.
const ACTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("actions");

const HEADER_LEN: usize = 8;
const BUSY_RETRY_INTERVAL: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

fn epoch_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

fn encode_value(json: &[u8], expires_at_ms: u64) -> Vec<u8> {
    let mut value = Vec::with_capacity(HEADER_LEN + json.len());
    value.extend_from_slice(&expires_at_ms.to_be_bytes());
    value.extend_from_slice(json);
    value
}

/// Split a stored value into its JSON body, or `None` if it has expired.
/// Values too short to carry a header are treated as expired.
fn live_body(value: &[u8], now_ms: u64) -> Option<&[u8]> {
    if value.len() < HEADER_LEN {
        return None;
    }
    let (header, body) = value.split_at(HEADER_LEN);
    let mut ms = [0u8; HEADER_LEN];
    ms.copy_from_slice(header);
    (now_ms < u64::from_be_bytes(ms)).then_some(body)
}

// ---------------------------------------------------------------------------
// RedbStore
// ---------------------------------------------------------------------------

pub struct RedbStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl RedbStore {
    /// Open or create the database at `path`, creating the `ACTIONS` table
    /// and evicting anything that expired while no process was running.
    pub async fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(unavailable)?;
        }
        let store = Self {
            path: path.to_path_buf(),
            busy_timeout,
        };
        let purged = store.purge_expired().await?;
        debug!(path = %path.display(), purged, "opened redb store");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against a freshly opened database on the blocking pool.
    async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        let busy_timeout = self.busy_timeout;
        tokio::task::spawn_blocking(move || {
            let db = open_db(&path, busy_timeout)?;
            f(&db)
        })
        .await
        .map_err(unavailable)?
    }
}

fn open_db(path: &Path, busy_timeout: Duration) -> Result<Database> {
    let deadline = std::time::Instant::now() + busy_timeout;
    loop {
        match Database::create(path) {
            Ok(db) => return Ok(db),
            Err(DatabaseError::DatabaseAlreadyOpen) if std::time::Instant::now() < deadline => {
                std::thread::sleep(BUSY_RETRY_INTERVAL);
            }
            Err(e) => {
                return Err(unavailable(format!("{}: {e}", path.display())));
            }
        }
    }
}

#[async_trait]
impl ActionStore for RedbStore {
    async fn put(&self, key: &str, record: &ActionRecord, ttl: Duration) -> Result<()> {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let value = encode_value(&record.to_bytes()?, epoch_ms().saturating_add(ttl_ms));
        let key = key.to_string();
        self.with_db(move |db| {
            let wt = db.begin_write().map_err(unavailable)?;
            {
                let mut table = wt.open_table(ACTIONS).map_err(unavailable)?;
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(unavailable)?;
            }
            wt.commit().map_err(unavailable)?;
            Ok(())
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<ActionRecord>> {
        let key = key.to_string();
        let lookup = key.clone();
        let body = self
            .with_db(move |db| {
                let rt = db.begin_read().map_err(unavailable)?;
                let table = rt.open_table(ACTIONS).map_err(unavailable)?;
                let found = table.get(lookup.as_str()).map_err(unavailable)?;
                Ok(found.and_then(|v| live_body(v.value(), epoch_ms()).map(<[u8]>::to_vec)))
            })
            .await?;
        body.map(|bytes| ActionRecord::from_bytes(&key, &bytes))
            .transpose()
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, ActionRecord)>> {
        let prefix = prefix.to_string();
        let raw = self
            .with_db(move |db| {
                let rt = db.begin_read().map_err(unavailable)?;
                let table = rt.open_table(ACTIONS).map_err(unavailable)?;
                let now = epoch_ms();

                let mut raw = Vec::new();
                for entry in table.range(prefix.as_str()..).map_err(unavailable)? {
                    let (k, v) = entry.map_err(unavailable)?;
                    let key = k.value();
                    if !key.starts_with(prefix.as_str()) {
                        break;
                    }
                    if let Some(body) = live_body(v.value(), now) {
                        raw.push((key.to_string(), body.to_vec()));
                    }
                }
                Ok(raw)
            })
            .await?;
        Ok(decode_entries(raw))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let key = key.to_string();
        self.with_db(move |db| {
            let now = epoch_ms();
            let wt = db.begin_write().map_err(unavailable)?;
            let removed = {
                let mut table = wt.open_table(ACTIONS).map_err(unavailable)?;
                let old = table.remove(key.as_str()).map_err(unavailable)?;
                old.is_some_and(|v| live_body(v.value(), now).is_some())
            };
            wt.commit().map_err(unavailable)?;
            Ok(removed)
        })
        .await
    }

    async fn purge_expired(&self) -> Result<usize> {
        self.with_db(|db| {
            let now = epoch_ms();
            let wt = db.begin_write().map_err(unavailable)?;
            let purged = {
                let mut table = wt.open_table(ACTIONS).map_err(unavailable)?;
                let mut expired = Vec::new();
                for entry in table.iter().map_err(unavailable)? {
                    let (k, v) = entry.map_err(unavailable)?;
                    if live_body(v.value(), now).is_none() {
                        expired.push(k.value().to_string());
                    }
                }
                for key in &expired {
                    table.remove(key.as_str()).map_err(unavailable)?;
                }
                expired.len()
            };
            wt.commit().map_err(unavailable)?;
            Ok(purged)
        })
        .await
    }

    fn kind(&self) -> &'static str {
        "redb"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
