//! The shared-memory service agents talk to.
//!
//! `SharedMemory` is a thin protocol over an [`ActionStore`]: it owns no state
//! beyond the store handle and immutable settings, so any number of handles
//! (in one process or many) can point at the same store.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::MemoryConfig;
use crate::error::{MemoryError, Result};
use crate::key;
use crate::record::{now_ms, ActionRecord, ActionRef, ActionStatus, NewAction, Payload};
use crate::store::{self, ActionStore};
use crate::summary::StatusSummary;

pub struct SharedMemory {
    store: Arc<dyn ActionStore>,
    namespace: String,
    ttl: Duration,
    poll_interval: Duration,
    wait_timeout: Duration,
    roles: BTreeMap<String, String>,
}

impl SharedMemory {
    /// Wrap an existing store. Fails with `InvalidConfig` if `config` does not
    /// validate.
    pub fn new(store: Arc<dyn ActionStore>, config: &MemoryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            namespace: config.namespace.clone(),
            ttl: config.ttl(),
            poll_interval: config.poll_interval(),
            wait_timeout: config.wait_timeout(),
            roles: config.roles.clone(),
        })
    }

    /// Validate `config`, connect to the store it names, and wrap it.
    pub async fn open(config: &MemoryConfig, root: &Path) -> Result<Self> {
        config.validate()?;
        let store = store::open_store(&config.store, root).await?;
        Self::new(store, config)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Default timeout for dependency waits.
    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    pub fn store_kind(&self) -> &'static str {
        self.store.kind()
    }

    fn key(&self, agent_id: &str, action_id: &str) -> Result<String> {
        key::encode(&self.namespace, agent_id, action_id)
    }

    /// Current record for a write guard. An undecodable value is treated as
    /// absent so its owner can overwrite it.
    async fn current(&self, key: &str) -> Result<Option<ActionRecord>> {
        match self.store.get(key).await {
            Err(MemoryError::CorruptRecord { key, source }) => {
                warn!(key = %key, error = %source, "overwriting undecodable record");
                Ok(None)
            }
            other => other,
        }
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Create or overwrite the caller's own action record.
    ///
    /// Only `pending` and `in_progress` may be published; terminal states go
    /// through [`complete`](Self::complete) or [`fail`](Self::fail). Moving a
    /// record backward or overwriting a terminal one fails with
    /// `InvalidTransition`.
    pub async fn publish(
        &self,
        agent_id: &str,
        action_id: &str,
        action: NewAction,
    ) -> Result<ActionRecord> {
        let key = self.key(agent_id, action_id)?;
        for dep in &action.dependencies {
            key::validate_id(&dep.agent_id)?;
            key::validate_id(&dep.action_id)?;
        }
        let target = ActionRef::new(agent_id, action_id);
        if action.status.is_terminal() {
            return Err(MemoryError::InvalidTransition {
                target,
                from: "publish".into(),
                to: action.status,
            });
        }
        if let Some(current) = self.current(&key).await? {
            if !current.status.can_move_to(action.status) {
                return Err(MemoryError::InvalidTransition {
                    target,
                    from: current.status.to_string(),
                    to: action.status,
                });
            }
        }

        let record = ActionRecord::from_new(agent_id, action_id, action, now_ms());
        self.store.put(&key, &record, self.ttl).await?;
        info!(
            agent_id,
            action_id,
            status = %record.status,
            action_type = %record.action_type,
            "published action"
        );
        Ok(record)
    }

    /// Mark an action `completed` with `result`.
    pub async fn complete(
        &self,
        agent_id: &str,
        action_id: &str,
        result: Payload,
    ) -> Result<ActionRecord> {
        self.finish(agent_id, action_id, ActionStatus::Completed, result)
            .await
    }

    /// Mark an action `failed` with `result` (typically an error description).
    pub async fn fail(&self, agent_id: &str, action_id: &str, result: Payload) -> Result<ActionRecord> {
        self.finish(agent_id, action_id, ActionStatus::Failed, result)
            .await
    }

    async fn finish(
        &self,
        agent_id: &str,
        action_id: &str,
        status: ActionStatus,
        result: Payload,
    ) -> Result<ActionRecord> {
        let key = self.key(agent_id, action_id)?;
        let result = normalize_result(status, result);
        let now = now_ms();

        let mut record = match self.current(&key).await? {
            Some(existing) if existing.is_terminal() => {
                if existing.status != status || existing.result.as_ref() != Some(&result) {
                    warn!(
                        agent_id,
                        action_id,
                        stored = %existing.status,
                        requested = %status,
                        "action already finished; keeping stored outcome"
                    );
                }
                return Ok(existing);
            }
            Some(existing) => existing,
            None => {
                debug!(agent_id, action_id, "finishing unpublished action");
                ActionRecord::synthesized(agent_id, action_id, now)
            }
        };

        record.status = status;
        record.result = Some(result);
        record.updated_at = now;
        self.store.put(&key, &record, self.ttl).await?;
        info!(agent_id, action_id, status = %status, "finished action");
        Ok(record)
    }

    /// Remove an action record. Returns whether a live record was removed.
    pub async fn delete(&self, agent_id: &str, action_id: &str) -> Result<bool> {
        let key = self.key(agent_id, action_id)?;
        let removed = self.store.delete(&key).await?;
        info!(agent_id, action_id, removed, "deleted action");
        Ok(removed)
    }

    /// Delete every record in the namespace whose `updatedAt` is older than
    /// `max_age`, after evicting expired entries. Returns the number deleted.
    pub async fn cleanup_older_than(&self, max_age: Duration) -> Result<usize> {
        let purged = self.store.purge_expired().await?;
        let cutoff = cutoff(max_age);

        let mut deleted = 0;
        for (key, record) in self.scan(&key::namespace_prefix(&self.namespace)).await? {
            if record.updated_at < cutoff && self.store.delete(&key).await? {
                deleted += 1;
            }
        }
        info!(
            namespace = %self.namespace,
            max_age_secs = max_age.as_secs(),
            purged,
            deleted,
            "cleanup finished"
        );
        Ok(deleted)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Non-blocking read. `Ok(None)` means not published, deleted, or expired.
    pub async fn read(&self, agent_id: &str, action_id: &str) -> Result<Option<ActionRecord>> {
        let key = self.key(agent_id, action_id)?;
        let record = self.store.get(&key).await?;
        debug!(
            agent_id,
            action_id,
            status = record.as_ref().map(|r| r.status.as_str()),
            "read action"
        );
        Ok(record)
    }

    /// Block until the action is `completed` or `failed`, polling every
    /// `poll_interval`.
    ///
    /// Fails with `WaitTimeout` once `timeout` has elapsed without a terminal
    /// status; the error carries the last record seen. Store errors end the
    /// wait immediately. Dropping the future cancels the wait.
    pub async fn wait_for(
        &self,
        agent_id: &str,
        action_id: &str,
        timeout: Duration,
    ) -> Result<ActionRecord> {
        let key = self.key(agent_id, action_id)?;
        let started = Instant::now();
        let deadline = started
            .checked_add(timeout)
            .unwrap_or_else(|| started + FAR_FUTURE);
        let mut last_seen: Option<ActionRecord> = None;

        loop {
            if let Some(record) = self.store.get(&key).await? {
                if record.is_terminal() {
                    info!(
                        agent_id,
                        action_id,
                        status = %record.status,
                        waited_ms = started.elapsed().as_millis() as u64,
                        "wait resolved"
                    );
                    return Ok(record);
                }
                last_seen = Some(record);
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    agent_id,
                    action_id,
                    waited_ms = started.elapsed().as_millis() as u64,
                    last_status = last_seen.as_ref().map(|r| r.status.as_str()),
                    "wait timed out"
                );
                return Err(MemoryError::WaitTimeout {
                    target: ActionRef::new(agent_id, action_id),
                    timeout_ms: timeout.as_millis() as u64,
                    last_seen: last_seen.map(Box::new),
                });
            }

            debug!(agent_id, action_id, "action not finished, polling");
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// Every `pending` or `in_progress` record in the namespace.
    pub async fn list_active(&self) -> Result<Vec<ActionRecord>> {
        let records = self.scan_records(&key::namespace_prefix(&self.namespace)).await?;
        Ok(records.into_iter().filter(|r| r.status.is_active()).collect())
    }

    /// Every live record owned by `agent_id`, any status.
    pub async fn list_agent(&self, agent_id: &str) -> Result<Vec<ActionRecord>> {
        let prefix = key::agent_prefix(&self.namespace, agent_id)?;
        self.scan_records(&prefix).await
    }

    /// Active records not updated within `max_age`: agents that crashed or
    /// stalled mid-action.
    pub async fn list_stale(&self, max_age: Duration) -> Result<Vec<ActionRecord>> {
        let cutoff = cutoff(max_age);
        Ok(self
            .list_active()
            .await?
            .into_iter()
            .filter(|r| r.updated_at < cutoff)
            .collect())
    }

    /// One namespace scan grouped by agent.
    pub async fn aggregate_status(&self) -> Result<StatusSummary> {
        let records = self.scan_records(&key::namespace_prefix(&self.namespace)).await?;
        Ok(StatusSummary::build(records, &self.roles, now_ms()))
    }

    async fn scan_records(&self, prefix: &str) -> Result<Vec<ActionRecord>> {
        Ok(self.scan(prefix).await?.into_iter().map(|(_, r)| r).collect())
    }

    /// Prefix scan restricted to keys this namespace's codec produced.
    async fn scan(&self, prefix: &str) -> Result<Vec<(String, ActionRecord)>> {
        let entries = self.store.scan_prefix(prefix).await?;
        Ok(entries
            .into_iter()
            .filter(|(k, _)| {
                let ok = key::decode(&self.namespace, k).is_some();
                if !ok {
                    warn!(key = %k, "skipping malformed key");
                }
                ok
            })
            .collect())
    }
}

fn normalize_result(status: ActionStatus, result: Payload) -> Payload {
    if !result.is_empty() {
        return result;
    }
    let mut outcome = Payload::new();
    outcome.insert("outcome".into(), Value::String(status.as_str().into()));
    outcome
}

/// Deadline used when `started + timeout` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Oldest `updatedAt` still considered fresh. Ages reaching past chrono's
/// range clamp to the earliest representable instant.
fn cutoff(max_age: Duration) -> chrono::DateTime<chrono::Utc> {
    chrono::Duration::from_std(max_age)
        .ok()
        .and_then(|age| now_ms().checked_sub_signed(age))
        .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    fn memory() -> (Arc<InMemoryStore>, SharedMemory) {
        let store = Arc::new(InMemoryStore::new());
        let mut config = MemoryConfig::in_memory();
        config
            .roles
            .insert("roo".into(), "backend_integration".into());
        let memory = SharedMemory::new(store.clone(), &config).unwrap();
        (store, memory)
    }

    #[test]
    fn rejects_invalid_config() {
        let config = MemoryConfig {
            ttl_seconds: 0,
            ..MemoryConfig::in_memory()
        };
        let err = SharedMemory::new(Arc::new(InMemoryStore::new()), &config)
            .err()
            .unwrap();
        assert!(matches!(err, MemoryError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn read_after_publish_returns_published_state() {
        let (_, mem) = memory();
        let action = NewAction::new("code_generation")
            .in_progress()
            .with_payload(payload(json!({"progress": "10%", "nested": {"a": [1, 2]}})));
        mem.publish("roo", "demo1", action).await.unwrap();

        let read = mem.read("roo", "demo1").await.unwrap().unwrap();
        assert_eq!(read.status, ActionStatus::InProgress);
        assert_eq!(read.payload["progress"], json!("10%"));
        assert_eq!(read.payload["nested"], json!({"a": [1, 2]}));
        assert!(read.result.is_none());
    }

    #[tokio::test]
    async fn payload_round_trips_in_insertion_order() {
        let (_, mem) = memory();
        let action = NewAction::new("x")
            .with_field("zeta", 1)
            .with_field("alpha", 2);
        mem.publish("roo", "a1", action).await.unwrap();
        let record = mem.read("roo", "a1").await.unwrap().unwrap();
        let keys: Vec<&String> = record.payload.keys().collect();
        assert_eq!(keys, ["zeta", "alpha"]);
    }

    #[tokio::test]
    async fn read_of_unknown_action_is_absent() {
        let (_, mem) = memory();
        assert!(mem.read("roo", "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn identifiers_with_separator_are_rejected() {
        let (_, mem) = memory();
        let err = mem
            .publish("ro:o", "demo1", NewAction::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::InvalidIdentifier { .. }));
        let bad_dep = NewAction::new("x").depends_on(ActionRef::new("a:b", "c"));
        assert!(mem.publish("roo", "demo1", bad_dep).await.is_err());
    }

    #[tokio::test]
    async fn publish_cannot_move_backward_or_reopen() {
        let (_, mem) = memory();
        mem.publish("roo", "a1", NewAction::new("x").in_progress())
            .await
            .unwrap();
        let err = mem
            .publish("roo", "a1", NewAction::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::InvalidTransition { .. }));

        mem.complete("roo", "a1", payload(json!({"success": true})))
            .await
            .unwrap();
        let err = mem
            .publish("roo", "a1", NewAction::new("x").in_progress())
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::InvalidTransition { .. }));
        assert_eq!(
            mem.read("roo", "a1").await.unwrap().unwrap().status,
            ActionStatus::Completed
        );
    }

    #[tokio::test]
    async fn publish_refuses_terminal_status() {
        let (_, mem) = memory();
        let err = mem
            .publish(
                "roo",
                "a1",
                NewAction::new("x").with_status(ActionStatus::Completed),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::InvalidTransition { .. }));
        assert!(mem.read("roo", "a1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn complete_keeps_created_at_and_sets_result() {
        let (_, mem) = memory();
        let published = mem
            .publish("roo", "a1", NewAction::new("code_generation").in_progress())
            .await
            .unwrap();
        let done = mem
            .complete("roo", "a1", payload(json!({"success": true})))
            .await
            .unwrap();
        assert_eq!(done.status, ActionStatus::Completed);
        assert_eq!(done.created_at, published.created_at);
        assert_eq!(done.action_type, "code_generation");
        assert_eq!(done.result.unwrap()["success"], json!(true));
    }

    #[tokio::test]
    async fn complete_without_publish_synthesizes_record() {
        let (_, mem) = memory();
        let done = mem.complete("roo", "ghost", Payload::new()).await.unwrap();
        assert_eq!(done.action_type, "unknown");
        assert!(done.payload.is_empty());
        assert_eq!(done.result.unwrap()["outcome"], json!("completed"));
    }

    #[tokio::test]
    async fn completing_twice_is_idempotent() {
        let (_, mem) = memory();
        let first = mem
            .complete("roo", "a1", payload(json!({"success": true})))
            .await
            .unwrap();
        let second = mem
            .complete("roo", "a1", payload(json!({"success": true})))
            .await
            .unwrap();
        assert_eq!(first, second);

        // A conflicting outcome does not overwrite the stored one either.
        let third = mem
            .fail("roo", "a1", payload(json!({"error": "late"})))
            .await
            .unwrap();
        assert_eq!(third.status, ActionStatus::Completed);
        assert_eq!(third.result, first.result);
    }

    #[tokio::test]
    async fn fail_records_error_result() {
        let (_, mem) = memory();
        mem.publish("roo", "a1", NewAction::new("x")).await.unwrap();
        let failed = mem
            .fail("roo", "a1", payload(json!({"error": "compile error"})))
            .await
            .unwrap();
        assert_eq!(failed.status, ActionStatus::Failed);
        assert_eq!(failed.result.unwrap()["error"], json!("compile error"));
    }

    #[tokio::test]
    async fn list_active_excludes_terminal_records() {
        let (_, mem) = memory();
        mem.publish("roo", "a1", NewAction::new("x")).await.unwrap();
        mem.publish("kilo", "b1", NewAction::new("x").in_progress())
            .await
            .unwrap();
        mem.complete("roo", "a2", Payload::new()).await.unwrap();
        mem.fail("kilo", "b2", Payload::new()).await.unwrap();

        let active = mem.list_active().await.unwrap();
        assert_eq!(active.len(), 2);
        assert!(active.iter().all(|r| !r.is_terminal()));
    }

    #[tokio::test]
    async fn list_agent_returns_only_that_agent() {
        let (_, mem) = memory();
        mem.publish("roo", "a1", NewAction::new("x")).await.unwrap();
        mem.complete("roo", "a2", Payload::new()).await.unwrap();
        mem.publish("rook", "a1", NewAction::new("x")).await.unwrap();

        let roo = mem.list_agent("roo").await.unwrap();
        let ids: Vec<&str> = roo.iter().map(|r| r.action_id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2"]);
    }

    #[tokio::test]
    async fn namespaces_are_isolated() {
        let store = Arc::new(InMemoryStore::new());
        let a = SharedMemory::new(store.clone(), &MemoryConfig::in_memory()).unwrap();
        let b = SharedMemory::new(
            store.clone(),
            &MemoryConfig {
                namespace: "other".into(),
                ..MemoryConfig::in_memory()
            },
        )
        .unwrap();
        a.publish("roo", "a1", NewAction::new("x")).await.unwrap();
        assert!(b.read("roo", "a1").await.unwrap().is_none());
        assert!(b.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn aggregate_status_groups_by_agent_with_roles() {
        let (_, mem) = memory();
        mem.publish("roo", "a1", NewAction::new("x").in_progress())
            .await
            .unwrap();
        mem.complete("roo", "a2", Payload::new()).await.unwrap();
        mem.publish("kilo", "t1", NewAction::new("testing"))
            .await
            .unwrap();

        let summary = mem.aggregate_status().await.unwrap();
        assert_eq!(summary.total_active, 2);
        let roo = &summary.agents["roo"];
        assert_eq!(roo.role.as_deref(), Some("backend_integration"));
        assert_eq!(roo.counts.in_progress, 1);
        assert_eq!(roo.counts.completed, 1);
        assert_eq!(summary.agents["kilo"].counts.pending, 1);
    }

    #[tokio::test]
    async fn list_stale_and_cleanup_use_updated_at() {
        let (store, mem) = memory();
        mem.publish("roo", "fresh", NewAction::new("x").in_progress())
            .await
            .unwrap();

        // Records another process wrote two hours ago.
        let old = now_ms() - chrono::Duration::hours(2);
        let stale = ActionRecord::from_new("kilo", "stuck", NewAction::new("x").in_progress(), old);
        store
            .put("ai_collaboration:kilo:stuck", &stale, mem.ttl())
            .await
            .unwrap();
        let mut finished = ActionRecord::from_new("kilo", "done", NewAction::new("x"), old);
        finished.status = ActionStatus::Completed;
        finished.result = Some(payload(json!({"ok": true})));
        store
            .put("ai_collaboration:kilo:done", &finished, mem.ttl())
            .await
            .unwrap();

        let stale_list = mem.list_stale(Duration::from_secs(3600)).await.unwrap();
        assert_eq!(stale_list.len(), 1);
        assert_eq!(stale_list[0].action_id, "stuck");

        let deleted = mem
            .cleanup_older_than(Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert!(mem.read("roo", "fresh").await.unwrap().is_some());
        assert!(mem.read("kilo", "stuck").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn max_age_beyond_calendar_range_matches_nothing() {
        let (_, mem) = memory();
        mem.publish("roo", "a1", NewAction::new("x").in_progress())
            .await
            .unwrap();

        let stale = mem
            .list_stale(Duration::from_secs(10_000_000_000_000))
            .await
            .unwrap();
        assert!(stale.is_empty());

        let deleted = mem
            .cleanup_older_than(Duration::from_secs(3_000_000_000 * 3600))
            .await
            .unwrap();
        assert_eq!(deleted, 0);
        assert_eq!(mem.cleanup_older_than(Duration::MAX).await.unwrap(), 0);
        assert!(mem.read("roo", "a1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let (_, mem) = memory();
        mem.publish("roo", "a1", NewAction::new("x")).await.unwrap();
        assert!(mem.delete("roo", "a1").await.unwrap());
        assert!(!mem.delete("roo", "a1").await.unwrap());
        assert!(mem.read("roo", "a1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn store_outage_surfaces_as_unavailable() {
        let (store, mem) = memory();
        store.set_online(false);
        assert!(mem.read("roo", "a1").await.unwrap_err().is_store_unavailable());
        assert!(mem
            .publish("roo", "a1", NewAction::new("x"))
            .await
            .unwrap_err()
            .is_store_unavailable());
        assert!(mem
            .wait_for("roo", "a1", Duration::from_secs(1))
            .await
            .unwrap_err()
            .is_store_unavailable());
        assert!(mem.list_active().await.unwrap_err().is_store_unavailable());
    }

    #[tokio::test]
    async fn corrupt_record_is_reported_on_read() {
        let mem = SharedMemory::new(
            Arc::new(CorruptOnce::default()),
            &MemoryConfig::in_memory(),
        )
        .unwrap();
        assert!(matches!(
            mem.read("roo", "a1").await.unwrap_err(),
            MemoryError::CorruptRecord { .. }
        ));
    }

    #[tokio::test]
    async fn corrupt_record_can_be_overwritten_by_owner() {
        let mem = SharedMemory::new(
            Arc::new(CorruptOnce::default()),
            &MemoryConfig::in_memory(),
        )
        .unwrap();
        mem.publish("roo", "a1", NewAction::new("x").in_progress())
            .await
            .unwrap();
        let read = mem.read("roo", "a1").await.unwrap().unwrap();
        assert_eq!(read.status, ActionStatus::InProgress);
        assert_eq!(mem.store_kind(), "corrupt-once");
    }

    /// Store whose first `get` fails to decode.
    #[derive(Default)]
    struct CorruptOnce {
        inner: InMemoryStore,
        served: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl ActionStore for CorruptOnce {
        async fn put(&self, key: &str, record: &ActionRecord, ttl: Duration) -> Result<()> {
            self.inner.put(key, record, ttl).await
        }
        async fn get(&self, key: &str) -> Result<Option<ActionRecord>> {
            if !self.served.swap(true, std::sync::atomic::Ordering::SeqCst) {
                return ActionRecord::from_bytes(key, b"garbage").map(Some);
            }
            self.inner.get(key).await
        }
        async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, ActionRecord)>> {
            self.inner.scan_prefix(prefix).await
        }
        async fn delete(&self, key: &str) -> Result<bool> {
            self.inner.delete(key).await
        }
        fn kind(&self) -> &'static str {
            "corrupt-once"
        }
    }

    // -----------------------------------------------------------------------
    // wait_for timing (paused clock)
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn roo_code_handoff() {
        let (_, mem) = memory();
        let mem = Arc::new(mem);

        mem.publish(
            "roo",
            "demo1",
            NewAction::new("code_generation")
                .in_progress()
                .with_field("progress", "10%"),
        )
        .await
        .unwrap();

        let seen = mem.read("roo", "demo1").await.unwrap().unwrap();
        assert_eq!(seen.payload["progress"], json!("10%"));

        let producer = {
            let mem = Arc::clone(&mem);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(1200)).await;
                mem.complete("roo", "demo1", payload(json!({"success": true})))
                    .await
            })
        };

        let started = Instant::now();
        let done = mem
            .wait_for("roo", "demo1", Duration::from_millis(5000))
            .await
            .unwrap();
        let waited = started.elapsed();
        producer.await.unwrap().unwrap();

        assert_eq!(done.status, ActionStatus::Completed);
        assert_eq!(done.result.unwrap()["success"], json!(true));
        assert!(waited >= Duration::from_millis(1200));
        assert!(waited <= Duration::from_millis(1200) + mem.poll_interval());
    }

    #[tokio::test(start_paused = true)]
    async fn kilo_wait_on_unpublished_action_times_out() {
        let (_, mem) = memory();
        let started = Instant::now();
        let err = mem
            .wait_for("code", "task_chain_1", Duration::from_millis(2000))
            .await
            .unwrap_err();
        let waited = started.elapsed();

        assert!(err.is_timeout());
        match err {
            MemoryError::WaitTimeout {
                target,
                timeout_ms,
                last_seen,
            } => {
                assert_eq!(target, ActionRef::new("code", "task_chain_1"));
                assert_eq!(timeout_ms, 2000);
                assert!(last_seen.is_none());
            }
            other => panic!("expected WaitTimeout, got {other:?}"),
        }
        assert!(waited >= Duration::from_millis(2000));
        assert!(waited <= Duration::from_millis(2000) + mem.poll_interval());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_carries_last_seen_record() {
        let (_, mem) = memory();
        mem.publish("roo", "slow", NewAction::new("x").in_progress())
            .await
            .unwrap();
        let err = mem
            .wait_for("roo", "slow", Duration::from_millis(1300))
            .await
            .unwrap_err();
        match err {
            MemoryError::WaitTimeout { last_seen, .. } => {
                assert_eq!(last_seen.unwrap().status, ActionStatus::InProgress);
            }
            other => panic!("expected WaitTimeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn wait_on_terminal_record_returns_immediately() {
        let (_, mem) = memory();
        mem.fail("roo", "a1", payload(json!({"error": "boom"})))
            .await
            .unwrap();
        let started = Instant::now();
        let record = mem
            .wait_for("roo", "a1", Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(record.status, ActionStatus::Failed);
        assert!(started.elapsed() < mem.poll_interval());
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_timeout_does_not_overflow_deadline() {
        let (_, mem) = memory();
        mem.complete("roo", "a1", payload(json!({"ok": true})))
            .await
            .unwrap();
        let record = mem.wait_for("roo", "a1", Duration::MAX).await.unwrap();
        assert_eq!(record.status, ActionStatus::Completed);

        mem.publish("roo", "a2", NewAction::new("x").in_progress())
            .await
            .unwrap();
        let waited = tokio::time::timeout(
            Duration::from_secs(5),
            mem.wait_for("roo", "a2", Duration::MAX),
        )
        .await;
        assert!(waited.is_err(), "wait should still be polling");
    }

    #[tokio::test(start_paused = true)]
    async fn records_expire_after_ttl() {
        let store = Arc::new(InMemoryStore::new());
        let config = MemoryConfig {
            ttl_seconds: 1,
            ..MemoryConfig::in_memory()
        };
        let mem = SharedMemory::new(store, &config).unwrap();
        mem.publish("roo", "short", NewAction::new("x")).await.unwrap();
        assert!(mem.read("roo", "short").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(mem.read("roo", "short").await.unwrap().is_none());
        assert!(mem.list_active().await.unwrap().is_empty());
    }
}
