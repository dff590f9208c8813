//! Redis backend, enabled by the `redis` cargo feature.
//!
//! Records are stored as plain JSON strings with a native `EX` expiry, which
//! keeps the keyspace readable by any other Redis client.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use tracing::debug;

use super::{decode_entries, unavailable, ActionStore};
use crate::error::Result;
use crate::record::ActionRecord;

pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(host: &str, port: u16, password: Option<String>, db: i64) -> Result<Self> {
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(host.to_string(), port),
            redis: RedisConnectionInfo {
                db,
                password,
                ..Default::default()
            },
        };
        let client = redis::Client::open(info).map_err(unavailable)?;
        let conn = ConnectionManager::new(client).await.map_err(unavailable)?;
        debug!(host, port, db, "connected to redis");
        Ok(Self { conn })
    }
}

/// Escape `SCAN MATCH` glob metacharacters so a prefix matches literally.
fn escape_glob(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('*');
    out
}

#[async_trait]
impl ActionStore for RedisStore {
    async fn put(&self, key: &str, record: &ActionRecord, ttl: Duration) -> Result<()> {
        let bytes = record.to_bytes()?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, bytes, ttl.as_secs().max(1))
            .await
            .map_err(unavailable)
    }

    async fn get(&self, key: &str) -> Result<Option<ActionRecord>> {
        let mut conn = self.conn.clone();
        let bytes: Option<Vec<u8>> = conn.get(key).await.map_err(unavailable)?;
        bytes
            .map(|b| ActionRecord::from_bytes(key, &b))
            .transpose()
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, ActionRecord)>> {
        let mut conn = self.conn.clone();
        let mut keys = Vec::new();
        {
            let mut iter = conn
                .scan_match::<_, String>(escape_glob(prefix))
                .await
                .map_err(unavailable)?;
            while let Some(key) = iter.next_item().await {
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        keys.dedup();

        let mut raw = Vec::with_capacity(keys.len());
        for key in keys {
            // Keys can expire between SCAN and GET.
            let bytes: Option<Vec<u8>> = conn.get(&key).await.map_err(unavailable)?;
            if let Some(bytes) = bytes {
                raw.push((key, bytes));
            }
        }
        Ok(decode_entries(raw))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(key).await.map_err(unavailable)?;
        Ok(removed > 0)
    }

    fn kind(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_escape_keeps_prefix_literal() {
        assert_eq!(escape_glob("ns:roo:"), "ns:roo:*");
        assert_eq!(escape_glob("a*b?[c]"), "a\\*b\\?\\[c\\]*");
    }
}
