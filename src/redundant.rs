//! Redundant local store for the task list.
//!
//! Every save writes the same snapshot to all configured slots; a save counts
//! as successful once `quorum` of them took the write. Loads walk a separate
//! priority list and return the first readable, non-empty snapshot.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::error::LifelockError;
use crate::models::{decode_tasks, Envelope, Task};
use crate::slots::{DatedSlot, KeySlot, KeyValueStore, SlotBackend};

pub const PRIMARY_KEY: &str = "lifelock_tasks";
pub const SESSION_KEY: &str = "lifelock_tasks_session";
pub const DATED_PREFIX: &str = "lifelock_tasks";

pub fn backup_key(index: usize) -> String {
    format!("lifelock_tasks_backup_{index}")
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: Vec<String>,
    pub ok: bool,
    pub saved_at: DateTime<Utc>,
    pub backup_path: Option<PathBuf>,
}

/// Where the standard slot set lives.
pub struct SlotLayout {
    pub primary: Arc<dyn KeyValueStore>,
    pub backups: Arc<dyn KeyValueStore>,
    pub session: Arc<dyn KeyValueStore>,
    pub backup_slots: usize,
    pub remote: Option<Arc<dyn SlotBackend>>,
}

pub struct RedundantStore {
    writers: Vec<Arc<dyn SlotBackend>>,
    readers: Vec<Arc<dyn SlotBackend>>,
    scan_stores: Vec<Arc<dyn KeyValueStore>>,
    quorum: usize,
    device: String,
    keywords: Vec<String>,
    export_dir: Option<PathBuf>,
}

impl RedundantStore {
    pub fn new(quorum: usize, device: &str) -> Self {
        Self {
            writers: Vec::new(),
            readers: Vec::new(),
            scan_stores: Vec::new(),
            quorum,
            device: device.to_string(),
            keywords: vec!["task".into(), "lifelock".into(), "focus".into(), "life".into()],
            export_dir: None,
        }
    }

    /// Primary, `backup_slots` backups, session, today's dated slot and the
    /// optional remote slot for writes; reads fall back through yesterday too.
    pub fn standard(layout: SlotLayout, quorum: usize, device: &str) -> Self {
        let primary: Arc<dyn SlotBackend> = Arc::new(KeySlot::new(layout.primary.clone(), PRIMARY_KEY));
        let backups: Vec<Arc<dyn SlotBackend>> = (1..=layout.backup_slots)
            .map(|i| Arc::new(KeySlot::new(layout.backups.clone(), backup_key(i))) as Arc<dyn SlotBackend>)
            .collect();
        let session: Arc<dyn SlotBackend> = Arc::new(KeySlot::new(layout.session.clone(), SESSION_KEY));
        let today: Arc<dyn SlotBackend> = Arc::new(DatedSlot::today(layout.primary.clone(), DATED_PREFIX));
        let yesterday: Arc<dyn SlotBackend> =
            Arc::new(DatedSlot::days_back(layout.primary.clone(), DATED_PREFIX, 1));

        let mut store = Self::new(quorum, device)
            .with_writer(primary.clone())
            .with_reader(primary);
        for backup in backups {
            store = store.with_writer(backup.clone()).with_reader(backup);
        }
        store = store
            .with_writer(session.clone())
            .with_writer(today.clone())
            .with_reader(today)
            .with_reader(yesterday)
            .with_reader(session);
        if let Some(remote) = layout.remote {
            store = store.with_writer(remote);
        }

        store
            .with_scan_store(layout.primary)
            .with_scan_store(layout.backups)
            .with_scan_store(layout.session)
    }

    pub fn with_writer(mut self, slot: Arc<dyn SlotBackend>) -> Self {
        self.writers.push(slot);
        self
    }

    pub fn with_reader(mut self, slot: Arc<dyn SlotBackend>) -> Self {
        self.readers.push(slot);
        self
    }

    pub fn with_scan_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.scan_stores.push(store);
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = Some(dir.into());
        self
    }

    pub fn slot_count(&self) -> usize {
        self.writers.len()
    }

    /// Write the snapshot to every slot. Individual slot failures are logged
    /// and counted, never returned.
    pub fn save_tasks(&self, tasks: &[Task]) -> SaveReport {
        let envelope = match Envelope::for_tasks(tasks, &self.device) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "failed to build task snapshot");
                return SaveReport {
                    attempted: 0,
                    succeeded: 0,
                    failed: Vec::new(),
                    ok: false,
                    saved_at: Utc::now(),
                    backup_path: None,
                };
            }
        };
        let saved_at = envelope.saved_at;
        let raw = match envelope.encode() {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize task snapshot");
                return SaveReport {
                    attempted: 0,
                    succeeded: 0,
                    failed: Vec::new(),
                    ok: false,
                    saved_at,
                    backup_path: None,
                };
            }
        };

        let mut succeeded = 0;
        let mut failed = Vec::new();
        for slot in &self.writers {
            match slot.save(&raw) {
                Ok(()) => {
                    succeeded += 1;
                    tracing::debug!(slot = %slot.label(), "slot saved");
                }
                Err(e) => {
                    tracing::warn!(slot = %slot.label(), error = %e, "slot write failed");
                    failed.push(slot.label());
                }
            }
        }

        let required = self.quorum.min(self.writers.len()).max(1);
        let ok = succeeded >= required;
        if !ok {
            tracing::warn!(succeeded, required, "task snapshot below save quorum");
        }

        let backup_path = if succeeded > 0 {
            match self.export_backup(&raw) {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!(error = %e, "backup export failed");
                    None
                }
            }
        } else {
            None
        };

        SaveReport {
            attempted: self.writers.len(),
            succeeded,
            failed,
            ok,
            saved_at,
            backup_path,
        }
    }

    /// First non-empty, parseable snapshot in priority order, or an empty list.
    pub fn load_tasks(&self) -> Vec<Task> {
        for slot in &self.readers {
            let raw = match slot.load() {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!(slot = %slot.label(), error = %e, "slot unreadable");
                    continue;
                }
            };
            match decode_tasks(&raw) {
                Ok(tasks) if !tasks.is_empty() => {
                    tracing::debug!(slot = %slot.label(), count = tasks.len(), "loaded tasks");
                    return tasks;
                }
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(slot = %slot.label(), error = %e, "skipping corrupt slot");
                }
            }
        }
        Vec::new()
    }

    /// Scavenge every matching key in every store, merge, deduplicate and
    /// re-save the result through [`save_tasks`](Self::save_tasks).
    pub fn emergency_recovery(&self) -> Vec<Task> {
        let mut found = Vec::new();
        let mut scanned = 0;

        // Priority slots first so the freshest copy of a duplicate wins.
        for slot in &self.readers {
            if let Ok(Some(raw)) = slot.load() {
                scanned += 1;
                if let Ok(tasks) = decode_tasks(&raw) {
                    found.extend(tasks);
                }
            }
        }

        for store in &self.scan_stores {
            let keys = match store.keys() {
                Ok(keys) => keys,
                Err(e) => {
                    tracing::warn!(store = store.name(), error = %e, "cannot list store keys");
                    continue;
                }
            };
            for key in keys.iter().filter(|k| self.matches_keywords(k)) {
                let raw = match store.get(key) {
                    Ok(Some(raw)) => raw,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::debug!(store = store.name(), key = %key, error = %e, "read failed");
                        continue;
                    }
                };
                scanned += 1;
                match decode_tasks(&raw) {
                    Ok(tasks) => found.extend(tasks),
                    Err(e) => tracing::debug!(store = store.name(), key = %key, error = %e, "not a task snapshot"),
                }
            }
        }

        let recovered = dedup_tasks(found);
        tracing::info!(scanned, recovered = recovered.len(), "emergency recovery finished");
        if !recovered.is_empty() {
            self.save_tasks(&recovered);
        }
        recovered
    }

    fn matches_keywords(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.keywords.iter().any(|kw| key.contains(&kw.to_lowercase()))
    }

    fn export_backup(&self, raw: &str) -> Result<Option<PathBuf>, LifelockError> {
        let Some(dir) = &self.export_dir else {
            return Ok(None);
        };
        fs::create_dir_all(dir)?;
        let path = dir.join(format!(
            "lifelock-backup-{}.json",
            Local::now().date_naive().format("%Y-%m-%d")
        ));
        fs::write(&path, raw)?;
        Ok(Some(path))
    }
}

/// Keep the first task seen for each id and for each (title, created_at) pair.
pub fn dedup_tasks(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen_ids = HashSet::new();
    let mut seen_composite = HashSet::new();
    let mut unique = Vec::new();
    for task in tasks {
        let composite = (task.title.clone(), task.created_at);
        if seen_ids.contains(&task.id) || seen_composite.contains(&composite) {
            continue;
        }
        seen_ids.insert(task.id.clone());
        seen_composite.insert(composite);
        unique.push(task);
    }
    unique
}
