//! Local persistence substrate and the slot backends built on it.
//!
//! A [`KeyValueStore`] is one independent place bytes can live (the SQLite
//! `kv_slots` table, a directory of files, process memory). A [`SlotBackend`]
//! is one destination the redundant store writes a snapshot to; several slots
//! usually share a store under different keys.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Local, NaiveDate};
use parking_lot::Mutex;

use crate::db::{slot_repo, SharedConnection};
use crate::error::LifelockError;

pub trait KeyValueStore: Send + Sync {
    fn name(&self) -> &str;
    fn get(&self, key: &str) -> Result<Option<String>, LifelockError>;
    fn set(&self, key: &str, value: &str) -> Result<(), LifelockError>;
    fn delete(&self, key: &str) -> Result<(), LifelockError>;
    fn keys(&self) -> Result<Vec<String>, LifelockError>;
}

/// Slots kept in the local SQLite database.
pub struct SqliteKv {
    conn: SharedConnection,
}

impl SqliteKv {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

impl KeyValueStore for SqliteKv {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn get(&self, key: &str) -> Result<Option<String>, LifelockError> {
        slot_repo::get_slot(&self.conn.lock(), key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LifelockError> {
        slot_repo::set_slot(&self.conn.lock(), key, value)
    }

    fn delete(&self, key: &str) -> Result<(), LifelockError> {
        slot_repo::delete_slot(&self.conn.lock(), key)
    }

    fn keys(&self) -> Result<Vec<String>, LifelockError> {
        slot_repo::list_slot_keys(&self.conn.lock())
    }
}

/// One JSON file per key, independent of the database file.
pub struct FileKv {
    dir: PathBuf,
}

impl FileKv {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, LifelockError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(LifelockError::validation(format!("Invalid slot key '{key}'")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileKv {
    fn name(&self) -> &str {
        "files"
    }

    fn get(&self, key: &str) -> Result<Option<String>, LifelockError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LifelockError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;
        // Write-then-rename so a crash never leaves a half-written slot.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), LifelockError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, LifelockError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut keys = Vec::new();
        for entry in entries {
            let name = entry?.file_name().to_string_lossy().to_string();
            if let Some(key) = name.strip_suffix(".json") {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Process-lifetime storage, the analogue of a session-scoped slot.
/// An optional byte quota makes writes fail the way a full browser store does.
pub struct MemoryKv {
    name: String,
    entries: Mutex<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryKv {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Mutex::new(BTreeMap::new()),
            quota_bytes: None,
        }
    }

    pub fn with_quota(name: &str, quota_bytes: usize) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::new(name)
        }
    }
}

impl KeyValueStore for MemoryKv {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Result<Option<String>, LifelockError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LifelockError> {
        let mut entries = self.entries.lock();
        if let Some(quota) = self.quota_bytes {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(LifelockError::storage(format!(
                    "{}: quota of {quota} bytes exceeded",
                    self.name
                )));
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), LifelockError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, LifelockError> {
        Ok(self.entries.lock().keys().cloned().collect())
    }
}

/// One destination for a redundant snapshot write.
pub trait SlotBackend: Send + Sync {
    fn label(&self) -> String;
    fn save(&self, raw: &str) -> Result<(), LifelockError>;
    fn load(&self) -> Result<Option<String>, LifelockError>;
}

/// A fixed key inside a store.
pub struct KeySlot {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl KeySlot {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }
}

impl SlotBackend for KeySlot {
    fn label(&self) -> String {
        format!("{}:{}", self.store.name(), self.key)
    }

    fn save(&self, raw: &str) -> Result<(), LifelockError> {
        self.store.set(&self.key, raw)
    }

    fn load(&self) -> Result<Option<String>, LifelockError> {
        self.store.get(&self.key)
    }
}

/// A key stamped with a local calendar day, `days_back` days before today.
pub struct DatedSlot {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
    days_back: i64,
}

impl DatedSlot {
    pub fn today(store: Arc<dyn KeyValueStore>, prefix: &str) -> Self {
        Self::days_back(store, prefix, 0)
    }

    pub fn days_back(store: Arc<dyn KeyValueStore>, prefix: &str, days_back: i64) -> Self {
        Self {
            store,
            prefix: prefix.to_string(),
            days_back,
        }
    }

    pub fn key_for(prefix: &str, day: NaiveDate) -> String {
        format!("{prefix}_{}", day.format("%Y-%m-%d"))
    }

    fn current_key(&self) -> String {
        let day = Local::now().date_naive() - Duration::days(self.days_back);
        Self::key_for(&self.prefix, day)
    }
}

impl SlotBackend for DatedSlot {
    fn label(&self) -> String {
        format!("{}:{}", self.store.name(), self.current_key())
    }

    fn save(&self, raw: &str) -> Result<(), LifelockError> {
        self.store.set(&self.current_key(), raw)
    }

    fn load(&self) -> Result<Option<String>, LifelockError> {
        self.store.get(&self.current_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::open_in_memory;

    #[test]
    fn test_memory_quota_rejects_large_writes() {
        let kv = MemoryKv::with_quota("session", 16);
        assert!(kv.set("k", "small").is_ok());
        let err = kv.set("k2", "this value is far too large").unwrap_err();
        assert_eq!(err.code.as_str(), "STORAGE_ERROR");
        // Overwriting an existing key only counts the new value.
        assert!(kv.set("k", "replacement").is_ok());
    }

    #[test]
    fn test_file_kv_round_trip_and_keys() {
        let dir = tempfile::TempDir::new().unwrap();
        let kv = FileKv::new(dir.path().join("slots"));
        assert!(kv.keys().unwrap().is_empty());
        kv.set("lifelock_tasks_backup_1", "{}").unwrap();
        kv.set("other", "[]").unwrap();
        assert_eq!(kv.get("other").unwrap().as_deref(), Some("[]"));
        assert_eq!(
            kv.keys().unwrap(),
            vec!["lifelock_tasks_backup_1".to_string(), "other".to_string()]
        );
        kv.delete("other").unwrap();
        assert!(kv.get("other").unwrap().is_none());
    }

    #[test]
    fn test_file_kv_rejects_path_like_keys() {
        let dir = tempfile::TempDir::new().unwrap();
        let kv = FileKv::new(dir.path());
        assert!(kv.set("../escape", "x").is_err());
        assert!(kv.set("", "x").is_err());
    }

    #[test]
    fn test_sqlite_kv_through_slot() {
        let conn = crate::db::shared(open_in_memory().unwrap());
        let store: Arc<dyn KeyValueStore> = Arc::new(SqliteKv::new(conn));
        let slot = KeySlot::new(store.clone(), "lifelock_tasks");
        slot.save("payload").unwrap();
        assert_eq!(slot.load().unwrap().as_deref(), Some("payload"));
        assert_eq!(slot.label(), "sqlite:lifelock_tasks");
    }

    #[test]
    fn test_dated_slot_uses_calendar_key() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKv::new("mem"));
        DatedSlot::today(store.clone(), "lifelock_tasks").save("today").unwrap();
        let yesterday = Local::now().date_naive() - Duration::days(1);
        store
            .set(&DatedSlot::key_for("lifelock_tasks", yesterday), "yesterday")
            .unwrap();

        let slot = DatedSlot::days_back(store.clone(), "lifelock_tasks", 1);
        assert_eq!(slot.load().unwrap().as_deref(), Some("yesterday"));
        assert_eq!(store.keys().unwrap().len(), 2);
    }
}
