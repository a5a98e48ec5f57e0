//! Offline-first record store.
//!
//! The local SQLite database is the source of truth while offline. Every
//! write is visible to the next read on the same store; remote sync happens
//! elsewhere and only flips the dirty flag.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::Connection;
use serde_json::Value;

use crate::db::record_repo::{self, RecordCounts};
use crate::db::{self, migrations, SharedConnection};
use crate::error::LifelockError;
use crate::models::{EntityKind, RecordKey, SyncedRecord};

pub struct OfflineStore {
    conn: SharedConnection,
    device: String,
    remote_only: AtomicBool,
}

impl OfflineStore {
    pub fn new(conn: SharedConnection, device: &str) -> Self {
        Self {
            conn,
            device: device.to_string(),
            remote_only: AtomicBool::new(false),
        }
    }

    pub fn open(data_dir: &Path, device: &str) -> Result<Self, LifelockError> {
        Ok(Self::new(db::shared(db::open_db(data_dir)?), device))
    }

    pub fn in_memory(device: &str) -> Result<Self, LifelockError> {
        Ok(Self::new(db::shared(db::open_in_memory()?), device))
    }

    pub fn connection(&self) -> SharedConnection {
        self.conn.clone()
    }

    /// Set once a schema rebuild failed; callers should go to the remote store.
    pub fn is_remote_only(&self) -> bool {
        self.remote_only.load(Ordering::SeqCst)
    }

    /// Point lookup. A missing record is first use, not an error: the
    /// entity's default document is returned (unsaved, clean).
    pub fn get(&self, key: &RecordKey) -> Result<SyncedRecord, LifelockError> {
        Ok(self
            .find(key)?
            .unwrap_or_else(|| SyncedRecord::default_for(key)))
    }

    pub fn find(&self, key: &RecordKey) -> Result<Option<SyncedRecord>, LifelockError> {
        self.with_schema_retry(|conn| record_repo::get_record(conn, key))
    }

    /// Upsert `record` at its key. With `mark_dirty` the record is stamped
    /// with a fresh `updated_at` and flagged for sync; without it the record
    /// is stored as a mirror of the remote copy.
    pub fn save(&self, record: &SyncedRecord, mark_dirty: bool) -> Result<SyncedRecord, LifelockError> {
        let mut stored = record.clone();
        stored.dirty = mark_dirty;
        if mark_dirty {
            stored.updated_at = next_timestamp(record.updated_at);
        }
        self.with_schema_retry(|conn| record_repo::upsert_record(conn, &stored, &self.device))?;
        Ok(stored)
    }

    /// Replace the payload at `key`, keeping the existing record id.
    pub fn put(&self, key: &RecordKey, payload: Value, mark_dirty: bool) -> Result<SyncedRecord, LifelockError> {
        let mut record = self.get(key)?;
        record.payload = payload;
        self.save(&record, mark_dirty)
    }

    /// Records for a user and entity with dates in `[from, to]`.
    pub fn query(
        &self,
        user_id: &str,
        entity: EntityKind,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SyncedRecord>, LifelockError> {
        if from > to {
            return Err(LifelockError::validation(format!(
                "Invalid date range: {from} is after {to}"
            )));
        }
        let from = from.format("%Y-%m-%d").to_string();
        let to = to.format("%Y-%m-%d").to_string();
        self.with_schema_retry(|conn| record_repo::query_range(conn, user_id, entity, &from, &to))
    }

    pub fn query_where<F>(
        &self,
        user_id: &str,
        entity: EntityKind,
        predicate: F,
    ) -> Result<Vec<SyncedRecord>, LifelockError>
    where
        F: Fn(&SyncedRecord) -> bool,
    {
        let records = self.with_schema_retry(|conn| record_repo::list_by_entity(conn, user_id, entity))?;
        Ok(records.into_iter().filter(|r| predicate(r)).collect())
    }

    pub fn dirty_records(&self) -> Result<Vec<SyncedRecord>, LifelockError> {
        self.with_schema_retry(record_repo::dirty_records)
    }

    /// Clear the dirty flag after a confirmed remote write of `record`.
    /// A newer local write since `record` was read keeps the flag set.
    pub fn mark_clean(&self, record: &SyncedRecord, remote_at: DateTime<Utc>) -> Result<bool, LifelockError> {
        self.with_schema_retry(|conn| {
            record_repo::mark_clean(conn, &record.key(), &record.updated_at, &remote_at)
        })
    }

    pub fn delete(&self, key: &RecordKey) -> Result<(), LifelockError> {
        self.with_schema_retry(|conn| record_repo::delete_record(conn, key))
    }

    pub fn counts(&self) -> Result<RecordCounts, LifelockError> {
        self.with_schema_retry(record_repo::record_counts)
    }

    /// Run `op`; on a schema mismatch rebuild the local database once and retry.
    fn with_schema_retry<T, F>(&self, op: F) -> Result<T, LifelockError>
    where
        F: Fn(&Connection) -> Result<T, LifelockError>,
    {
        let guard = self.conn.lock();
        let conn: &Connection = &guard;
        match op(conn) {
            Err(e) if e.is_schema_mismatch() => {
                tracing::warn!(error = %e, "local schema mismatch, reinitializing database");
                if let Err(rebuild_err) = migrations::rebuild(conn) {
                    self.remote_only.store(true, Ordering::SeqCst);
                    return Err(LifelockError::schema_mismatch(format!(
                        "Local database rebuild failed: {rebuild_err}"
                    )));
                }
                op(conn).map_err(|retry_err| {
                    if retry_err.is_schema_mismatch() {
                        self.remote_only.store(true, Ordering::SeqCst);
                    }
                    retry_err
                })
            }
            other => other,
        }
    }
}

/// `now`, nudged forward if needed so every local write gets a distinct stamp.
fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> OfflineStore {
        OfflineStore::in_memory("test").unwrap()
    }

    fn key(entity: EntityKind, date: &str) -> RecordKey {
        RecordKey::new("u1", entity, date).unwrap()
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_get_absent_returns_default_document() {
        let store = store();
        let record = store.get(&key(EntityKind::MorningRoutine, "2026-04-01")).unwrap();
        assert!(!record.dirty);
        assert_eq!(record.payload["items"].as_array().unwrap().len(), 6);
        assert_eq!(store.counts().unwrap().total, 0);
    }

    #[test]
    fn test_save_is_immediately_visible() {
        let store = store();
        let k = key(EntityKind::Tasks, "2026-04-01");
        store.put(&k, json!([{"title": "offline edit"}]), true).unwrap();
        let read = store.get(&k).unwrap();
        assert!(read.dirty);
        assert_eq!(read.payload[0]["title"], "offline edit");
    }

    #[test]
    fn test_dirty_flag_follows_mark_dirty() {
        let store = store();
        let k = key(EntityKind::Tasks, "2026-04-01");
        let saved = store.put(&k, json!([]), true).unwrap();
        assert!(store.get(&k).unwrap().dirty);

        assert!(store.mark_clean(&saved, Utc::now()).unwrap());
        assert!(!store.get(&k).unwrap().dirty);

        store.put(&k, json!([1]), false).unwrap();
        assert!(!store.get(&k).unwrap().dirty);
    }

    #[test]
    fn test_put_keeps_record_id() {
        let store = store();
        let k = key(EntityKind::TimeBlocks, "2026-04-01");
        let first = store.put(&k, json!([]), true).unwrap();
        let second = store.put(&k, json!([{"start": "09:00"}]), true).unwrap();
        assert_eq!(first.id, second.id);
        assert!(second.updated_at > first.updated_at);
    }

    #[test]
    fn test_query_by_date_range_and_predicate() {
        let store = store();
        for date in ["2026-04-01", "2026-04-02", "2026-04-05"] {
            store.put(&key(EntityKind::AlcoholTracker, date), json!([{"drinks": 1}]), true).unwrap();
        }
        store.put(&key(EntityKind::Tasks, "2026-04-02"), json!([]), true).unwrap();

        let found = store
            .query("u1", EntityKind::AlcoholTracker, day("2026-04-01"), day("2026-04-03"))
            .unwrap();
        assert_eq!(found.len(), 2);

        let late = store
            .query_where("u1", EntityKind::AlcoholTracker, |r| r.date.as_str() > "2026-04-01")
            .unwrap();
        assert_eq!(late.len(), 2);

        assert!(store
            .query("u1", EntityKind::Tasks, day("2026-04-05"), day("2026-04-01"))
            .is_err());
    }

    #[test]
    fn test_missing_table_triggers_rebuild_and_retry() {
        let store = store();
        let k = key(EntityKind::Tasks, "2026-04-01");
        store.put(&k, json!([1]), true).unwrap();
        store.connection().lock().execute_batch("DROP TABLE records;").unwrap();

        let record = store.get(&k).unwrap();
        assert_eq!(record.payload, json!([]));
        assert!(!store.is_remote_only());

        store.put(&k, json!([2]), true).unwrap();
        assert_eq!(store.get(&k).unwrap().payload, json!([2]));
    }
}
