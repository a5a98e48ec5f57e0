//! Background reconciliation between the offline store and the remote store.
//!
//! Per record: `clean` -> local mutation -> `dirty, timer armed` -> timer
//! fires and the upsert succeeds -> `clean`. A mutation inside the debounce
//! window re-arms the timer. A failed upsert leaves the record dirty and
//! queues a retry with exponential backoff, up to `max_attempts`; after that
//! the record waits for the next mutation or a force sync.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::error::LifelockError;
use crate::models::{EntityKind, Envelope, RecordKey, SyncStats, SyncedRecord};
use crate::remote::{RemoteFilter, RemoteStore, RECORD_KEY_COLUMNS};
use crate::slots::SlotBackend;
use crate::store::OfflineStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub debounce: Duration,
    pub retry: RetryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(2000),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Flushed,
    AlreadyClean,
    Offline,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub flushed: usize,
    pub failed: usize,
    pub skipped: usize,
}

struct Timer {
    generation: u64,
    handle: JoinHandle<()>,
}

struct Retry {
    attempts: u32,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct SyncState {
    next_generation: u64,
    timers: HashMap<RecordKey, Timer>,
    retries: HashMap<RecordKey, Retry>,
    last_sync_at: Option<DateTime<Utc>>,
}

pub struct SyncEngine {
    store: Arc<OfflineStore>,
    remote: Option<Arc<dyn RemoteStore>>,
    config: SyncConfig,
    online: AtomicBool,
    disposed: AtomicBool,
    state: Mutex<SyncState>,
}

impl SyncEngine {
    /// Without a remote the engine stays offline and records simply accumulate as dirty.
    pub fn new(
        store: Arc<OfflineStore>,
        remote: Option<Arc<dyn RemoteStore>>,
        config: SyncConfig,
    ) -> Arc<Self> {
        let online = remote.is_some();
        Arc::new(Self {
            store,
            remote,
            config,
            online: AtomicBool::new(online),
            disposed: AtomicBool::new(false),
            state: Mutex::new(SyncState::default()),
        })
    }

    pub fn store(&self) -> &Arc<OfflineStore> {
        &self.store
    }

    pub fn is_online(&self) -> bool {
        self.remote.is_some() && self.online.load(Ordering::SeqCst)
    }

    /// Arm timers for records left dirty by a previous session.
    pub fn init(self: &Arc<Self>) -> Result<usize, LifelockError> {
        let dirty = self.store.dirty_records()?;
        if self.is_online() {
            for record in &dirty {
                self.arm_timer(record.key());
            }
        }
        tracing::info!(pending = dirty.len(), online = self.is_online(), "sync engine started");
        Ok(dirty.len())
    }

    /// Cancel all timers and flush whatever is still dirty.
    pub async fn dispose(self: &Arc<Self>) -> SyncReport {
        let report = self.force_sync().await;
        self.disposed.store(true, Ordering::SeqCst);
        self.cancel_all();
        tracing::info!(flushed = report.flushed, failed = report.failed, "sync engine stopped");
        report
    }

    /// Local write always wins: store the payload dirty, then schedule a flush.
    pub fn save(self: &Arc<Self>, key: &RecordKey, payload: Value) -> Result<SyncedRecord, LifelockError> {
        let record = self.store.put(key, payload, true)?;
        self.notify_dirty(key);
        Ok(record)
    }

    /// (Re)start the debounce timer for `key` and reset its retry budget.
    pub fn notify_dirty(self: &Arc<Self>, key: &RecordKey) {
        if let Some(retry) = self.state.lock().retries.remove(key) {
            if let Some(handle) = retry.handle {
                handle.abort();
            }
        }
        if self.is_online() {
            self.arm_timer(key.clone());
        }
    }

    fn arm_timer(self: &Arc<Self>, key: RecordKey) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(record = %key, "no async runtime, flush deferred to force sync");
            return;
        };

        let mut state = self.state.lock();
        state.next_generation += 1;
        let generation = state.next_generation;
        let engine = Arc::clone(self);
        let timer_key = key.clone();
        let debounce = self.config.debounce;
        let handle = runtime.spawn(async move {
            tokio::time::sleep(debounce).await;
            // Detach before flushing so a newer mutation cannot abort an in-flight upsert.
            {
                let mut state = engine.state.lock();
                if state.timers.get(&timer_key).map(|t| t.generation) != Some(generation) {
                    return;
                }
                state.timers.remove(&timer_key);
            }
            engine.flush_key(&timer_key).await;
        });
        if let Some(previous) = state.timers.insert(key, Timer { generation, handle }) {
            previous.handle.abort();
        }
    }

    /// Push the current local state of one record. Reads the record at flush
    /// time, so the latest mutation is what gets sent.
    pub async fn flush_key(self: &Arc<Self>, key: &RecordKey) -> FlushOutcome {
        let outcome = self.flush_once(key).await;
        match outcome {
            FlushOutcome::Failed => self.schedule_retry(key.clone()),
            FlushOutcome::Flushed | FlushOutcome::AlreadyClean => {
                self.state.lock().retries.remove(key);
            }
            FlushOutcome::Offline => {}
        }
        outcome
    }

    async fn flush_once(&self, key: &RecordKey) -> FlushOutcome {
        let Some(remote) = self.remote.as_ref().filter(|_| self.is_online()) else {
            return FlushOutcome::Offline;
        };
        let record = match self.store.find(key) {
            Ok(Some(record)) if record.dirty => record,
            Ok(_) => return FlushOutcome::AlreadyClean,
            Err(e) => {
                tracing::warn!(record = %key, error = %e, "cannot read record for sync");
                return FlushOutcome::Failed;
            }
        };

        let table = record.entity.remote_table();
        match remote.upsert(table, RECORD_KEY_COLUMNS, &record.to_remote_row()).await {
            Ok(()) => {
                let now = Utc::now();
                match self.store.mark_clean(&record, now) {
                    Ok(true) => tracing::debug!(record = %key, "record synced"),
                    Ok(false) => tracing::debug!(record = %key, "record changed during sync, still dirty"),
                    Err(e) => tracing::warn!(record = %key, error = %e, "synced but could not clear dirty flag"),
                }
                self.state.lock().last_sync_at = Some(now);
                FlushOutcome::Flushed
            }
            Err(e) => {
                tracing::warn!(record = %key, table, error = %e, "remote sync failed, record stays dirty");
                FlushOutcome::Failed
            }
        }
    }

    fn schedule_retry(self: &Arc<Self>, key: RecordKey) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let mut state = self.state.lock();
        let attempts = state.retries.get(&key).map_or(0, |r| r.attempts) + 1;
        if attempts > self.config.retry.max_attempts {
            state.retries.remove(&key);
            tracing::warn!(record = %key, attempts = attempts - 1, "retry budget exhausted, waiting for next change");
            return;
        }
        let delay = self.config.retry.delay_for(attempts);
        let engine = Arc::clone(self);
        let retry_key = key.clone();
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(retry) = engine.state.lock().retries.get_mut(&retry_key) {
                retry.handle = None;
            }
            engine.flush_key(&retry_key).await;
        });
        tracing::debug!(record = %key, attempts, ?delay, "retry scheduled");
        if let Some(previous) = state.retries.insert(key, Retry { attempts, handle: Some(handle) }) {
            if let Some(handle) = previous.handle {
                handle.abort();
            }
        }
    }

    /// Flush every dirty record now, bypassing debounce.
    pub async fn force_sync(self: &Arc<Self>) -> SyncReport {
        self.cancel_all();
        let mut report = SyncReport::default();
        let dirty = match self.store.dirty_records() {
            Ok(dirty) => dirty,
            Err(e) => {
                tracing::warn!(error = %e, "cannot list dirty records");
                return report;
            }
        };
        if !self.is_online() {
            report.skipped = dirty.len();
            return report;
        }
        for record in dirty {
            match self.flush_key(&record.key()).await {
                FlushOutcome::Flushed => report.flushed += 1,
                FlushOutcome::Failed => report.failed += 1,
                FlushOutcome::AlreadyClean | FlushOutcome::Offline => report.skipped += 1,
            }
        }
        report
    }

    /// Read a record. Online, the remote copy wins, but only after any
    /// unflushed local edit has been pushed; if that push fails the local
    /// copy is returned untouched.
    pub async fn load(self: &Arc<Self>, key: &RecordKey) -> Result<SyncedRecord, LifelockError> {
        let Some(remote) = self.remote.as_ref().filter(|_| self.is_online()) else {
            return self.store.get(key);
        };

        let local = self.store.find(key)?;
        if local.as_ref().is_some_and(|r| r.dirty) {
            if self.flush_key(key).await != FlushOutcome::Flushed {
                tracing::info!(record = %key, "keeping unflushed local copy");
                return self.store.get(key);
            }
        }

        let filter = RemoteFilter::new()
            .eq("user_id", key.user_id.as_str())
            .eq("date", key.date.as_str());
        let rows = match remote.query(key.entity.remote_table(), &filter).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(record = %key, error = %e, "remote fetch failed, using local copy");
                return self.store.get(key);
            }
        };
        let Some(row) = rows.first() else {
            return self.store.get(key);
        };

        // A mutation may have landed while the query was in flight.
        if self.store.find(key)?.is_some_and(|r| r.dirty) {
            return self.store.get(key);
        }
        let pulled = SyncedRecord::from_remote_row(key, row);
        self.store.save(&pulled, false)
    }

    /// Going online arms a flush for every dirty record; going offline cancels timers.
    pub fn set_online(self: &Arc<Self>, online: bool) -> Result<(), LifelockError> {
        self.online.store(online, Ordering::SeqCst);
        if !self.is_online() {
            self.cancel_all();
            return Ok(());
        }
        for record in self.store.dirty_records()? {
            self.notify_dirty(&record.key());
        }
        Ok(())
    }

    pub fn stats(&self) -> Result<SyncStats, LifelockError> {
        let counts = self.store.counts()?;
        let state = self.state.lock();
        Ok(SyncStats {
            local_records: counts.total,
            pending_sync: counts.dirty,
            last_sync_at: state.last_sync_at.max(counts.last_synced_at),
            online: self.is_online(),
            retrying: state.retries.len(),
        })
    }

    /// Number of armed debounce timers.
    pub fn pending_timers(&self) -> usize {
        self.state.lock().timers.len()
    }

    fn cancel_all(&self) {
        let mut state = self.state.lock();
        for (_, timer) in state.timers.drain() {
            timer.handle.abort();
        }
        for (_, retry) in state.retries.drain() {
            if let Some(handle) = retry.handle {
                handle.abort();
            }
        }
    }
}

/// Redundancy slot that stores the task snapshot as a dirty record, so the
/// engine carries a copy to the remote store.
pub struct RemoteSlot {
    engine: Arc<SyncEngine>,
    user_id: String,
}

impl RemoteSlot {
    pub fn new(engine: Arc<SyncEngine>, user_id: &str) -> Self {
        Self {
            engine,
            user_id: user_id.to_string(),
        }
    }

    fn key(&self) -> Result<RecordKey, LifelockError> {
        RecordKey::for_day(&self.user_id, EntityKind::TaskSnapshot, Local::now().date_naive())
    }
}

impl SlotBackend for RemoteSlot {
    fn label(&self) -> String {
        format!("remote:{}", EntityKind::TaskSnapshot.remote_table())
    }

    fn save(&self, raw: &str) -> Result<(), LifelockError> {
        let envelope = Envelope::decode(raw)?;
        self.engine.save(&self.key()?, envelope.data)?;
        Ok(())
    }

    fn load(&self) -> Result<Option<String>, LifelockError> {
        let Some(record) = self.engine.store().find(&self.key()?)? else {
            return Ok(None);
        };
        Ok(Some(Envelope::wrap(record.payload, "remote").encode()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use serde_json::json;

    fn engine_with(remote: &Arc<MemoryRemote>) -> Arc<SyncEngine> {
        let store = Arc::new(OfflineStore::in_memory("test").unwrap());
        let remote: Arc<dyn RemoteStore> = remote.clone();
        SyncEngine::new(store, Some(remote), SyncConfig::default())
    }

    fn key(date: &str) -> RecordKey {
        RecordKey::new("u1", EntityKind::Tasks, date).unwrap()
    }

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(5));
        assert_eq!(policy.delay_for(40), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutations_within_window_coalesce() {
        let remote = Arc::new(MemoryRemote::new());
        let engine = engine_with(&remote);
        let k = key("2026-04-01");

        engine.save(&k, json!([{"title": "first"}])).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        engine.save(&k, json!([{"title": "second"}])).unwrap();
        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert!(remote.upsert_calls().is_empty());

        tokio::time::sleep(Duration::from_millis(1000)).await;
        let calls = remote.upsert_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].table, "daily_tasks");
        assert_eq!(calls[0].row["payload"][0]["title"], "second");
        assert!(!engine.store().get(&k).unwrap().dirty);
        assert_eq!(engine.pending_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_record_syncs_once_after_going_online() {
        let remote = Arc::new(MemoryRemote::new());
        let engine = engine_with(&remote);
        engine.set_online(false).unwrap();
        let k = key("2026-04-02");

        engine.save(&k, json!([{"title": "made offline"}])).unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(remote.upsert_calls().is_empty());
        assert!(engine.store().get(&k).unwrap().dirty);

        engine.set_online(true).unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(remote.upsert_calls().len(), 1);
        assert!(!engine.store().get(&k).unwrap().dirty);
        assert!(engine.stats().unwrap().last_sync_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_flush_keeps_dirty_and_retries_with_backoff() {
        let remote = Arc::new(MemoryRemote::new());
        let engine = engine_with(&remote);
        let k = key("2026-04-03");
        remote.fail_next(2);

        engine.save(&k, json!([1])).unwrap();
        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(remote.upsert_calls().len(), 1);
        assert!(engine.store().get(&k).unwrap().dirty);
        assert_eq!(engine.stats().unwrap().retrying, 1);

        // First retry after 1s fails, second after a further 2s succeeds.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(remote.upsert_calls().len(), 2);
        assert!(engine.store().get(&k).unwrap().dirty);

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(remote.upsert_calls().len(), 3);
        assert!(!engine.store().get(&k).unwrap().dirty);
        assert_eq!(engine.stats().unwrap().retrying, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_is_bounded() {
        let remote = Arc::new(MemoryRemote::new());
        let store = Arc::new(OfflineStore::in_memory("test").unwrap());
        let dyn_remote: Arc<dyn RemoteStore> = remote.clone();
        let config = SyncConfig {
            debounce: Duration::from_millis(100),
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(100),
                max_delay: Duration::from_secs(1),
            },
        };
        let engine = SyncEngine::new(store, Some(dyn_remote), config);
        remote.set_unreachable(true);

        engine.save(&key("2026-04-04"), json!([])).unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        // Initial attempt plus two retries, then it waits.
        assert_eq!(remote.upsert_calls().len(), 3);
        assert_eq!(engine.stats().unwrap().pending_sync, 1);
        assert_eq!(engine.stats().unwrap().retrying, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_sync_skips_unreadable_record() {
        let remote = Arc::new(MemoryRemote::new());
        let engine = engine_with(&remote);
        engine.save(&key("2026-04-01"), json!([{"title": "healthy"}])).unwrap();
        engine.save(&key("2026-04-02"), json!([{"title": "damaged"}])).unwrap();
        engine
            .store()
            .connection()
            .lock()
            .execute_batch("UPDATE records SET payload = '{corrupt' WHERE date = '2026-04-02';")
            .unwrap();

        let report = engine.force_sync().await;
        assert_eq!(report.flushed, 1);
        assert_eq!(report.failed, 0);
        let calls = remote.upsert_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].row["payload"][0]["title"], "healthy");
        assert_eq!(engine.stats().unwrap().pending_sync, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_sync_time_is_read_from_storage() {
        let remote = Arc::new(MemoryRemote::new());
        let first = engine_with(&remote);
        let k = key("2026-04-01");
        first.save(&k, json!([1])).unwrap();
        first.dispose().await;
        let synced_at = first.store().get(&k).unwrap().remote_updated_at;
        assert!(synced_at.is_some());

        let remote_store: Arc<dyn RemoteStore> = remote.clone();
        let second = SyncEngine::new(first.store().clone(), Some(remote_store), SyncConfig::default());
        let stats = second.stats().unwrap();
        assert_eq!(stats.pending_sync, 0);
        assert_eq!(stats.last_sync_at, synced_at);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_sync_flushes_everything_immediately() {
        let remote = Arc::new(MemoryRemote::new());
        let engine = engine_with(&remote);
        engine.save(&key("2026-04-05"), json!([1])).unwrap();
        engine.save(&key("2026-04-06"), json!([2])).unwrap();

        let report = engine.force_sync().await;
        assert_eq!(report.flushed, 2);
        assert_eq!(remote.upsert_calls().len(), 2);
        assert_eq!(engine.pending_timers(), 0);

        // Cancelled timers must not fire a second round.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(remote.upsert_calls().len(), 2);
        assert_eq!(engine.stats().unwrap().pending_sync, 0);
    }

    #[tokio::test]
    async fn test_load_prefers_remote_copy() {
        let remote = Arc::new(MemoryRemote::new());
        let engine = engine_with(&remote);
        let k = key("2026-04-07");
        let cached = engine.store().put(&k, json!([{"title": "cached"}]), true).unwrap();
        engine.store().mark_clean(&cached, Utc::now()).unwrap();
        remote.insert_row(
            "daily_tasks",
            json!({
                "id": cached.id,
                "user_id": "u1",
                "date": "2026-04-07",
                "payload": [{"title": "from another device"}],
                "updated_at": "2026-04-07T12:00:00Z"
            }),
        );

        let loaded = engine.load(&k).await.unwrap();
        assert_eq!(loaded.payload[0]["title"], "from another device");
        assert!(!loaded.dirty);
        assert_eq!(engine.store().get(&k).unwrap().payload, loaded.payload);
    }

    #[tokio::test]
    async fn test_load_flushes_dirty_record_before_pulling() {
        let remote = Arc::new(MemoryRemote::new());
        let engine = engine_with(&remote);
        let k = key("2026-04-08");
        remote.insert_row(
            "daily_tasks",
            json!({"user_id": "u1", "date": "2026-04-08", "payload": ["stale"]}),
        );
        engine.store().put(&k, json!(["offline edit"]), true).unwrap();

        let loaded = engine.load(&k).await.unwrap();
        assert_eq!(loaded.payload, json!(["offline edit"]));
        assert_eq!(remote.rows("daily_tasks")[0]["payload"], json!(["offline edit"]));
    }

    #[tokio::test]
    async fn test_load_keeps_local_edit_when_flush_fails() {
        let remote = Arc::new(MemoryRemote::new());
        let engine = engine_with(&remote);
        let k = key("2026-04-09");
        remote.insert_row(
            "daily_tasks",
            json!({"user_id": "u1", "date": "2026-04-09", "payload": ["remote"]}),
        );
        engine.store().put(&k, json!(["local"]), true).unwrap();
        remote.fail_next(1);

        let loaded = engine.load(&k).await.unwrap();
        assert_eq!(loaded.payload, json!(["local"]));
        assert!(loaded.dirty);
    }

    #[tokio::test]
    async fn test_offline_load_reads_local_value() {
        let remote = Arc::new(MemoryRemote::new());
        let engine = engine_with(&remote);
        engine.set_online(false).unwrap();
        let k = key("2026-04-10");
        remote.insert_row(
            "daily_tasks",
            json!({"user_id": "u1", "date": "2026-04-10", "payload": ["remote"]}),
        );
        engine.save(&k, json!(["written offline"])).unwrap();
        assert_eq!(engine.load(&k).await.unwrap().payload, json!(["written offline"]));
    }

    #[tokio::test]
    async fn test_remote_slot_records_snapshot_for_sync() {
        let remote = Arc::new(MemoryRemote::new());
        let engine = engine_with(&remote);
        let slot = RemoteSlot::new(engine.clone(), "u1");
        let raw = Envelope::wrap(json!([{"title": "snap"}]), "mobile").encode().unwrap();

        slot.save(&raw).unwrap();
        let loaded = Envelope::decode(&slot.load().unwrap().unwrap()).unwrap();
        assert_eq!(loaded.data[0]["title"], "snap");

        let report = engine.force_sync().await;
        assert_eq!(report.flushed, 1);
        assert_eq!(remote.rows("task_snapshots").len(), 1);
    }

    #[tokio::test]
    async fn test_dispose_flushes_and_stops_scheduling() {
        let remote = Arc::new(MemoryRemote::new());
        let engine = engine_with(&remote);
        engine.save(&key("2026-04-11"), json!([])).unwrap();
        let report = engine.dispose().await;
        assert_eq!(report.flushed, 1);

        engine.save(&key("2026-04-12"), json!([])).unwrap();
        assert_eq!(engine.pending_timers(), 0);
    }
}
