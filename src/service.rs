//! Application context. Constructed explicitly and passed to callers; owns
//! the record store, the sync engine and the redundant task store.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use parking_lot::RwLock;
use serde_json::Value;

use crate::config::Config;
use crate::db::{self, SharedConnection};
use crate::error::LifelockError;
use crate::models::{sort_by_priority, EntityKind, Priority, RecordKey, SyncStats, SyncedRecord, Task, WorkKind};
use crate::redundant::{RedundantStore, SaveReport, SlotLayout};
use crate::remote::{RemoteStore, RestRemote};
use crate::slots::{FileKv, KeyValueStore, MemoryKv, SlotBackend, SqliteKv};
use crate::store::OfflineStore;
use crate::sync::{RemoteSlot, SyncEngine, SyncReport};
use crate::views::{self, DaySummary};

/// Create the data directory, database and config file.
pub fn init_storage(config: &Config) -> Result<PathBuf, LifelockError> {
    let db_path = db::init_db(&config.data_dir)?;
    config.write()?;
    Ok(db_path)
}

pub struct Lifelock {
    config: Config,
    records: Arc<OfflineStore>,
    sync: Arc<SyncEngine>,
    tasks: RedundantStore,
    current: RwLock<Vec<Task>>,
    /// The in-memory list differs from what the slots last confirmed.
    unsaved: AtomicBool,
}

impl Lifelock {
    /// Open an initialised data directory. A configured remote URL enables sync.
    pub fn open(config: Config) -> Result<Self, LifelockError> {
        let conn = db::shared(db::open_db(&config.data_dir)?);
        let remote: Option<Arc<dyn RemoteStore>> = match &config.remote.url {
            Some(url) => Some(Arc::new(RestRemote::new(url, config.remote.api_key.as_deref())?)),
            None => None,
        };
        Self::with_connection(config, conn, remote)
    }

    pub fn with_connection(
        config: Config,
        conn: SharedConnection,
        remote: Option<Arc<dyn RemoteStore>>,
    ) -> Result<Self, LifelockError> {
        let records = Arc::new(OfflineStore::new(conn.clone(), &config.device));
        let sync = SyncEngine::new(records.clone(), remote.clone(), config.sync_config());

        let remote_slot = remote.map(|_| {
            Arc::new(RemoteSlot::new(sync.clone(), &config.user_id)) as Arc<dyn SlotBackend>
        });
        let primary: Arc<dyn KeyValueStore> = Arc::new(SqliteKv::new(conn));
        let backups: Arc<dyn KeyValueStore> = Arc::new(FileKv::new(db::slots_dir(&config.data_dir)));
        let session: Arc<dyn KeyValueStore> = Arc::new(MemoryKv::new("session"));
        let layout = SlotLayout {
            primary,
            backups,
            session,
            backup_slots: config.backup_slots,
            remote: remote_slot,
        };
        let tasks = RedundantStore::standard(layout, config.save_quorum, &config.device)
            .with_keywords(config.recovery_keywords.clone())
            .with_export_dir(db::backups_dir(&config.data_dir));

        Ok(Self {
            config,
            records,
            sync,
            tasks,
            current: RwLock::new(Vec::new()),
            unsaved: AtomicBool::new(false),
        })
    }

    /// Load the task list from the redundant slots and arm sync for pending records.
    pub fn init(&self) -> Result<(), LifelockError> {
        let mut loaded = self.tasks.load_tasks();
        for task in &mut loaded {
            task.normalize();
        }
        tracing::info!(tasks = loaded.len(), slots = self.tasks.slot_count(), "task list loaded");
        *self.current.write() = loaded;
        self.sync.init()?;
        Ok(())
    }

    /// Save the task list if it changed since the last save, then flush
    /// pending records.
    pub async fn dispose(&self) -> SyncReport {
        if self.unsaved.load(Ordering::SeqCst) {
            self.checkpoint();
        }
        self.sync.dispose().await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn records(&self) -> &Arc<OfflineStore> {
        &self.records
    }

    pub fn sync_engine(&self) -> &Arc<SyncEngine> {
        &self.sync
    }

    /// Current tasks, most urgent first.
    pub fn tasks(&self) -> Vec<Task> {
        let mut tasks = self.current.read().clone();
        sort_by_priority(&mut tasks);
        tasks
    }

    pub fn add_task(
        &self,
        title: &str,
        description: Option<&str>,
        kind: WorkKind,
        priority: Priority,
    ) -> Result<(Task, SaveReport), LifelockError> {
        let task = Task::new(title, description, kind, priority)?;
        self.current.write().push(task.clone());
        let report = self.persist(&task);
        Ok((task, report))
    }

    pub fn toggle_task(&self, reference: &str) -> Result<(Task, SaveReport), LifelockError> {
        let task = {
            let mut current = self.current.write();
            let index = resolve_task(&current, reference)?;
            current[index].toggle(Utc::now());
            current[index].clone()
        };
        let report = self.persist(&task);
        Ok((task, report))
    }

    /// Redundant save of the current list; used by auto-save and lifecycle signals.
    pub fn save_now(&self) -> SaveReport {
        let snapshot = self.current.read().clone();
        let report = self.tasks.save_tasks(&snapshot);
        self.unsaved.store(!report.ok, Ordering::SeqCst);
        report
    }

    /// Like [`save_now`](Self::save_now), but never overwrites the slots with
    /// an empty list: an empty list here means nothing was loadable, and the
    /// old slots are what recovery scans.
    pub fn checkpoint(&self) -> Option<SaveReport> {
        if self.current.read().is_empty() {
            tracing::debug!("no tasks loaded, checkpoint skipped");
            return None;
        }
        Some(self.save_now())
    }

    /// Scavenge every local slot and adopt what was found.
    pub fn recover(&self) -> Vec<Task> {
        let recovered = self.tasks.emergency_recovery();
        if !recovered.is_empty() {
            *self.current.write() = recovered.clone();
            self.unsaved.store(true, Ordering::SeqCst);
        }
        recovered
    }

    /// Stamp, save redundantly, then record the changed task's day for sync.
    fn persist(&self, changed: &Task) -> SaveReport {
        let now = Utc::now();
        let day = changed.created_at.with_timezone(&Local).date_naive();
        let day_tasks: Vec<Task> = {
            let mut current = self.current.write();
            for task in current.iter_mut().filter(|t| t.id == changed.id) {
                task.saved_at = Some(now);
            }
            current
                .iter()
                .filter(|t| t.created_at.with_timezone(&Local).date_naive() == day)
                .cloned()
                .collect()
        };

        let report = self.save_now();
        if let Err(e) = self.write_day(day, &day_tasks) {
            tracing::warn!(%day, error = %e, "daily task record not written");
        }
        report
    }

    fn write_day(&self, day: NaiveDate, tasks: &[Task]) -> Result<(), LifelockError> {
        let key = RecordKey::for_day(&self.config.user_id, EntityKind::Tasks, day)?;
        self.sync.save(&key, serde_json::to_value(tasks)?)?;
        Ok(())
    }

    pub fn record_key(&self, entity: EntityKind, date: &str) -> Result<RecordKey, LifelockError> {
        RecordKey::new(&self.config.user_id, entity, date)
    }

    /// Remote copy when online (after flushing local edits), local copy otherwise.
    pub async fn get_record(&self, entity: EntityKind, date: &str) -> Result<SyncedRecord, LifelockError> {
        let key = self.record_key(entity, date)?;
        self.sync.load(&key).await
    }

    pub fn put_record(&self, entity: EntityKind, date: &str, payload: Value) -> Result<SyncedRecord, LifelockError> {
        let key = self.record_key(entity, date)?;
        self.sync.save(&key, payload)
    }

    pub fn list_records(
        &self,
        entity: EntityKind,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SyncedRecord>, LifelockError> {
        self.records.query(&self.config.user_id, entity, from, to)
    }

    pub async fn force_sync(&self) -> SyncReport {
        self.sync.force_sync().await
    }

    pub fn sync_stats(&self) -> Result<SyncStats, LifelockError> {
        self.sync.stats()
    }

    pub fn week_summary(&self, start: NaiveDate) -> Result<Vec<DaySummary>, LifelockError> {
        views::week_summary(&self.records, &self.config.user_id, start)
    }

    pub fn completion_streak(&self, today: NaiveDate) -> Result<u32, LifelockError> {
        views::completion_streak(&self.records, &self.config.user_id, today)
    }
}

/// Exact id first, then a unique case-insensitive id prefix.
fn resolve_task(tasks: &[Task], reference: &str) -> Result<usize, LifelockError> {
    if let Some(index) = tasks.iter().position(|t| t.id == reference) {
        return Ok(index);
    }
    let prefix = reference.to_uppercase();
    let matches: Vec<usize> = tasks
        .iter()
        .enumerate()
        .filter(|(_, t)| t.id.to_uppercase().starts_with(&prefix))
        .map(|(i, _)| i)
        .collect();
    match matches.as_slice() {
        [] => Err(LifelockError::task_not_found(reference)),
        [index] => Ok(*index),
        _ => {
            let candidates: Vec<String> = matches
                .iter()
                .map(|&i| format!("{} ({})", tasks[i].title, tasks[i].id))
                .collect();
            Err(LifelockError::ambiguous_ref(reference, &candidates))
        }
    }
}

/// Day ranges for the CLI: `from..=to`, defaulting to the last week.
pub fn default_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> (NaiveDate, NaiveDate) {
    let to = to.unwrap_or_else(|| Local::now().date_naive());
    let from = from.unwrap_or(to - chrono::Duration::days(6));
    (from, to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use serde_json::json;
    use tempfile::TempDir;

    fn app(dir: &TempDir, remote: Option<Arc<dyn RemoteStore>>) -> Lifelock {
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        init_storage(&config).unwrap();
        let conn = db::shared(db::open_db(&config.data_dir).unwrap());
        let app = Lifelock::with_connection(config, conn, remote).unwrap();
        app.init().unwrap();
        app
    }

    #[test]
    fn test_tasks_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let first = app(&dir, None);
        first.add_task("Plan week", None, WorkKind::Deep, Priority::High).unwrap();
        let (added, report) = first
            .add_task("Stretch", Some("10 minutes"), WorkKind::Morning, Priority::Low)
            .unwrap();
        assert!(report.ok);
        assert!(report.backup_path.is_some());
        first.toggle_task(&added.id).unwrap();
        drop(first);

        let second = app(&dir, None);
        let tasks = second.tasks();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].title, "Plan week");
        assert!(tasks[1].completed);
        assert!(tasks[1].completed_at.is_some());
    }

    #[test]
    fn test_mutations_write_dirty_daily_record() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir, None);
        let (task, _) = app.add_task("Write", None, WorkKind::Deep, Priority::Medium).unwrap();
        let day = task.created_at.with_timezone(&Local).date_naive();

        let key = RecordKey::for_day("local", EntityKind::Tasks, day).unwrap();
        let record = app.records().get(&key).unwrap();
        assert!(record.dirty);
        assert_eq!(record.payload[0]["title"], "Write");
        assert_eq!(app.sync_stats().unwrap().pending_sync, 1);
        assert!(!app.sync_stats().unwrap().online);
    }

    #[test]
    fn test_toggle_unknown_task() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir, None);
        let err = app.toggle_task("ZZZZ").unwrap_err();
        assert_eq!(err.code.as_str(), "TASK_NOT_FOUND");
    }

    #[test]
    fn test_recover_restores_from_backups_after_primary_loss() {
        let dir = TempDir::new().unwrap();
        let first = app(&dir, None);
        first.add_task("Keep me", None, WorkKind::Light, Priority::Medium).unwrap();
        first
            .records()
            .connection()
            .lock()
            .execute_batch("DELETE FROM kv_slots;")
            .unwrap();
        drop(first);

        let second = app(&dir, None);
        let recovered = second.recover();
        assert_eq!(recovered.len(), 1);
        assert_eq!(second.tasks()[0].title, "Keep me");
    }

    #[tokio::test]
    async fn test_dispose_pushes_tasks_and_snapshot() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(MemoryRemote::new());
        let app = app(&dir, Some(remote.clone()));
        app.add_task("Sync me", None, WorkKind::Deep, Priority::Urgent).unwrap();
        app.put_record(EntityKind::AlcoholTracker, "2026-04-01", json!([{"drinks": 0}]))
            .unwrap();

        let report = app.dispose().await;
        assert_eq!(report.failed, 0);
        assert_eq!(remote.rows("daily_tasks").len(), 1);
        assert_eq!(remote.rows("task_snapshots").len(), 1);
        assert_eq!(remote.rows("alcohol_entries").len(), 1);
        assert_eq!(app.sync_stats().unwrap().pending_sync, 0);
    }

    fn slot_values(app: &Lifelock) -> Vec<String> {
        let conn = app.records().connection();
        let guard = conn.lock();
        let mut stmt = guard.prepare("SELECT value FROM kv_slots ORDER BY key").unwrap();
        let values = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<String>, _>>()
            .unwrap();
        values
    }

    #[tokio::test]
    async fn test_dispose_without_changes_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(MemoryRemote::new());
        let first = app(&dir, Some(remote.clone()));
        first.add_task("Read only", None, WorkKind::Light, Priority::Low).unwrap();
        first.dispose().await;
        let before = slot_values(&first);
        let upserts = remote.upsert_calls().len();
        drop(first);

        let second = app(&dir, Some(remote.clone()));
        assert_eq!(second.tasks().len(), 1);
        let report = second.dispose().await;
        assert_eq!(report.flushed, 0);
        assert_eq!(remote.upsert_calls().len(), upserts);
        assert_eq!(slot_values(&second), before);
    }

    #[tokio::test]
    async fn test_dispose_saves_recovered_list() {
        let dir = TempDir::new().unwrap();
        let first = app(&dir, None);
        first.add_task("Lost", None, WorkKind::Deep, Priority::High).unwrap();
        first
            .records()
            .connection()
            .lock()
            .execute_batch("DELETE FROM kv_slots;")
            .unwrap();
        drop(first);

        let second = app(&dir, None);
        assert_eq!(second.recover().len(), 1);
        second.dispose().await;
        assert!(!slot_values(&second).is_empty());
    }

    #[test]
    fn test_record_rebuild_keeps_task_slots() {
        let dir = TempDir::new().unwrap();
        let lifelock = app(&dir, None);
        lifelock.add_task("Survive", None, WorkKind::Deep, Priority::Medium).unwrap();
        let before = slot_values(&lifelock);
        assert!(!before.is_empty());

        lifelock.records().connection().lock().execute_batch("DROP TABLE records;").unwrap();
        let key = lifelock.record_key(EntityKind::TimeBlocks, "2026-04-01").unwrap();
        assert_eq!(lifelock.records().get(&key).unwrap().payload, json!([]));

        assert_eq!(slot_values(&lifelock), before);
        drop(lifelock);
        let reopened = app(&dir, None);
        assert_eq!(reopened.tasks()[0].title, "Survive");
    }

    #[test]
    fn test_resolve_task_ambiguous_prefix() {
        let mut a = Task::new("a", None, WorkKind::Deep, Priority::Low).unwrap();
        let mut b = Task::new("b", None, WorkKind::Deep, Priority::Low).unwrap();
        a.id = "01ABC".into();
        b.id = "01ABD".into();
        let tasks = vec![a, b];
        assert_eq!(resolve_task(&tasks, "01abd").unwrap(), 1);
        assert_eq!(resolve_task(&tasks, "01AB").unwrap_err().code.as_str(), "AMBIGUOUS_REF");
    }
}
