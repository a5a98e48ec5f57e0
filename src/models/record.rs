use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::LifelockError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Tasks,
    TimeBlocks,
    MorningRoutine,
    AlcoholTracker,
    Gamification,
    TaskSnapshot,
}

pub const MORNING_ROUTINE_ITEMS: &[&str] = &[
    "wake_up",
    "freshen_up",
    "get_blood_flowing",
    "power_up_brain",
    "plan_day",
    "meditation",
];

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        Self::Tasks,
        Self::TimeBlocks,
        Self::MorningRoutine,
        Self::AlcoholTracker,
        Self::Gamification,
        Self::TaskSnapshot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::TimeBlocks => "time_blocks",
            Self::MorningRoutine => "morning_routine",
            Self::AlcoholTracker => "alcohol_tracker",
            Self::Gamification => "gamification",
            Self::TaskSnapshot => "task_snapshot",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    /// Keyed by calendar day. Gamification progress is keyed by an id instead.
    pub fn is_day_scoped(&self) -> bool {
        !matches!(self, Self::Gamification)
    }

    /// Table name on the remote relational store.
    pub fn remote_table(&self) -> &'static str {
        match self {
            Self::Tasks => "daily_tasks",
            Self::TimeBlocks => "time_blocks",
            Self::MorningRoutine => "morning_routines",
            Self::AlcoholTracker => "alcohol_entries",
            Self::Gamification => "gamification_progress",
            Self::TaskSnapshot => "task_snapshots",
        }
    }

    /// The document handed out on first use of a key.
    pub fn default_payload(&self) -> Value {
        match self {
            Self::MorningRoutine => {
                let items: Vec<Value> = MORNING_ROUTINE_ITEMS
                    .iter()
                    .map(|name| json!({ "name": name, "completed": false }))
                    .collect();
                json!({ "items": items })
            }
            Self::Gamification => json!({ "xp": 0, "level": 1 }),
            Self::Tasks | Self::TimeBlocks | Self::AlcoholTracker | Self::TaskSnapshot => json!([]),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a synced document: (user, entity type, date or id).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub user_id: String,
    pub entity: EntityKind,
    pub date: String,
}

impl RecordKey {
    pub fn new(user_id: &str, entity: EntityKind, date: &str) -> Result<Self, LifelockError> {
        if user_id.trim().is_empty() {
            return Err(LifelockError::validation("User id must not be empty"));
        }
        if date.trim().is_empty() {
            return Err(LifelockError::validation("Record date/id must not be empty"));
        }
        Ok(Self {
            user_id: user_id.to_string(),
            entity,
            date: date.to_string(),
        })
    }

    pub fn for_day(user_id: &str, entity: EntityKind, day: NaiveDate) -> Result<Self, LifelockError> {
        Self::new(user_id, entity, &day.format("%Y-%m-%d").to_string())
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.user_id, self.entity, self.date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedRecord {
    pub id: String,
    pub user_id: String,
    pub entity: EntityKind,
    /// `YYYY-MM-DD` for day-scoped entities, otherwise the entity id.
    pub date: String,
    pub payload: Value,
    pub dirty: bool,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub remote_updated_at: Option<DateTime<Utc>>,
}

impl SyncedRecord {
    pub fn new(key: &RecordKey, payload: Value) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            user_id: key.user_id.clone(),
            entity: key.entity,
            date: key.date.clone(),
            payload,
            dirty: false,
            updated_at: Utc::now(),
            remote_updated_at: None,
        }
    }

    /// Unsaved default document for a key that has never been written.
    pub fn default_for(key: &RecordKey) -> Self {
        Self::new(key, key.entity.default_payload())
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            user_id: self.user_id.clone(),
            entity: self.entity,
            date: self.date.clone(),
        }
    }

    /// Row shape sent to the remote store.
    pub fn to_remote_row(&self) -> Value {
        json!({
            "id": self.id,
            "user_id": self.user_id,
            "date": self.date,
            "payload": self.payload,
            "updated_at": self.updated_at,
        })
    }

    /// Build a clean local record from a remote row. Missing fields fall back to the key.
    pub fn from_remote_row(key: &RecordKey, row: &Value) -> Self {
        let updated_at = row
            .get("updated_at")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        let mut record = Self::new(key, row.get("payload").cloned().unwrap_or(Value::Null));
        if let Some(id) = row.get("id").and_then(Value::as_str) {
            record.id = id.to_string();
        }
        record.updated_at = updated_at;
        record.remote_updated_at = Some(updated_at);
        record
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate, LifelockError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| LifelockError::validation(format!("Invalid date '{s}', expected YYYY-MM-DD")))
}
