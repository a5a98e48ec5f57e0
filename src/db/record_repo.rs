use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::LifelockError;
use crate::models::{EntityKind, Envelope, RecordKey, SyncedRecord};

const RECORD_COLUMNS: &str =
    "id, user_id, entity, date, payload, dirty, updated_at, remote_updated_at";

/// Insert or replace the record stored at its (user, entity, date) key.
pub fn upsert_record(conn: &Connection, record: &SyncedRecord, device: &str) -> Result<(), LifelockError> {
    let payload = Envelope::wrap(record.payload.clone(), device).encode()?;
    conn.execute(
        "INSERT INTO records (id, user_id, entity, date, payload, dirty, updated_at, remote_updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT (user_id, entity, date) DO UPDATE SET
            id = excluded.id,
            payload = excluded.payload,
            dirty = excluded.dirty,
            updated_at = excluded.updated_at,
            remote_updated_at = COALESCE(excluded.remote_updated_at, records.remote_updated_at)",
        params![
            record.id,
            record.user_id,
            record.entity.as_str(),
            record.date,
            payload,
            record.dirty,
            format_ts(&record.updated_at),
            record.remote_updated_at.as_ref().map(format_ts),
        ],
    )?;
    Ok(())
}

pub fn get_record(conn: &Connection, key: &RecordKey) -> Result<Option<SyncedRecord>, LifelockError> {
    let record = conn
        .query_row(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM records
                 WHERE user_id = ?1 AND entity = ?2 AND date = ?3"
            ),
            params![key.user_id, key.entity.as_str(), key.date],
            row_to_record,
        )
        .optional()?;
    Ok(record)
}

/// Records for one user and entity with `from <= date <= to` (inclusive, string order).
pub fn query_range(
    conn: &Connection,
    user_id: &str,
    entity: EntityKind,
    from: &str,
    to: &str,
) -> Result<Vec<SyncedRecord>, LifelockError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM records
         WHERE user_id = ?1 AND entity = ?2 AND date >= ?3 AND date <= ?4
         ORDER BY date ASC"
    ))?;
    let rows = stmt.query_map(params![user_id, entity.as_str(), from, to], row_to_record)?;
    collect_readable(rows)
}

pub fn list_by_entity(
    conn: &Connection,
    user_id: &str,
    entity: EntityKind,
) -> Result<Vec<SyncedRecord>, LifelockError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM records
         WHERE user_id = ?1 AND entity = ?2
         ORDER BY date ASC"
    ))?;
    let rows = stmt.query_map(params![user_id, entity.as_str()], row_to_record)?;
    collect_readable(rows)
}

/// All records with unconfirmed local changes, oldest first.
pub fn dirty_records(conn: &Connection) -> Result<Vec<SyncedRecord>, LifelockError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM records WHERE dirty = 1 ORDER BY updated_at ASC"
    ))?;
    let rows = stmt.query_map([], row_to_record)?;
    collect_readable(rows)
}

/// Clear the dirty flag, but only if nobody wrote the record since `seen_updated_at`.
/// Returns whether the record was cleared.
pub fn mark_clean(
    conn: &Connection,
    key: &RecordKey,
    seen_updated_at: &DateTime<Utc>,
    remote_updated_at: &DateTime<Utc>,
) -> Result<bool, LifelockError> {
    let changed = conn.execute(
        "UPDATE records SET dirty = 0, remote_updated_at = ?1
         WHERE user_id = ?2 AND entity = ?3 AND date = ?4 AND updated_at = ?5",
        params![
            format_ts(remote_updated_at),
            key.user_id,
            key.entity.as_str(),
            key.date,
            format_ts(seen_updated_at),
        ],
    )?;
    Ok(changed > 0)
}

pub fn delete_record(conn: &Connection, key: &RecordKey) -> Result<(), LifelockError> {
    let changed = conn.execute(
        "DELETE FROM records WHERE user_id = ?1 AND entity = ?2 AND date = ?3",
        params![key.user_id, key.entity.as_str(), key.date],
    )?;
    if changed == 0 {
        return Err(LifelockError::record_not_found(&key.to_string()));
    }
    Ok(())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct RecordCounts {
    pub total: i64,
    pub dirty: i64,
    /// Latest confirmed remote write across all records.
    pub last_synced_at: Option<DateTime<Utc>>,
}

pub fn record_counts(conn: &Connection) -> Result<RecordCounts, LifelockError> {
    let counts = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(dirty), 0), MAX(remote_updated_at) FROM records",
        [],
        |row| {
            let last: Option<String> = row.get(2)?;
            Ok(RecordCounts {
                total: row.get(0)?,
                dirty: row.get(1)?,
                last_synced_at: last.map(|s| parse_ts(2, &s)).transpose()?,
            })
        },
    )?;
    Ok(counts)
}

pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Keep the rows that decode. A row whose contents cannot be read is logged
/// and skipped so one bad record does not hide the rest.
fn collect_readable<I>(rows: I) -> Result<Vec<SyncedRecord>, LifelockError>
where
    I: Iterator<Item = rusqlite::Result<SyncedRecord>>,
{
    let mut records = Vec::new();
    for row in rows {
        match row {
            Ok(record) => records.push(record),
            Err(
                e @ (rusqlite::Error::FromSqlConversionFailure(..)
                | rusqlite::Error::InvalidColumnType(..)),
            ) => {
                tracing::warn!(error = %e, "skipping unreadable record row");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(records)
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<SyncedRecord> {
    let entity_str: String = row.get(2)?;
    let entity = EntityKind::from_str(&entity_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            Box::new(LifelockError::serialization(format!("Unknown entity '{entity_str}'"))),
        )
    })?;
    let raw_payload: String = row.get(4)?;
    let payload = Envelope::decode(&raw_payload)
        .and_then(Envelope::migrate)
        .map(|envelope| envelope.data)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    let updated_at: String = row.get(6)?;
    let remote_updated_at: Option<String> = row.get(7)?;

    Ok(SyncedRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        entity,
        date: row.get(3)?,
        payload,
        dirty: row.get(5)?,
        updated_at: parse_ts(6, &updated_at)?,
        remote_updated_at: remote_updated_at.map(|s| parse_ts(7, &s)).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::open_in_memory;
    use serde_json::json;

    fn key(date: &str) -> RecordKey {
        RecordKey::new("u1", EntityKind::Tasks, date).unwrap()
    }

    fn dirty(date: &str, payload: serde_json::Value) -> SyncedRecord {
        let mut record = SyncedRecord::new(&key(date), payload);
        record.dirty = true;
        record
    }

    #[test]
    fn test_upsert_then_get() {
        let conn = open_in_memory().unwrap();
        let record = dirty("2026-05-01", json!([{"title": "a"}]));
        upsert_record(&conn, &record, "test").unwrap();

        let loaded = get_record(&conn, &key("2026-05-01")).unwrap().unwrap();
        assert_eq!(loaded.payload, record.payload);
        assert!(loaded.dirty);
        assert!(get_record(&conn, &key("2026-05-02")).unwrap().is_none());
    }

    #[test]
    fn test_upsert_replaces_same_key() {
        let conn = open_in_memory().unwrap();
        upsert_record(&conn, &dirty("2026-05-01", json!([1])), "test").unwrap();
        upsert_record(&conn, &dirty("2026-05-01", json!([2])), "test").unwrap();
        let counts = record_counts(&conn).unwrap();
        assert_eq!(counts.total, 1);
        let loaded = get_record(&conn, &key("2026-05-01")).unwrap().unwrap();
        assert_eq!(loaded.payload, json!([2]));
    }

    #[test]
    fn test_query_range_is_inclusive_and_ordered() {
        let conn = open_in_memory().unwrap();
        for date in ["2026-05-03", "2026-05-01", "2026-05-02", "2026-05-09"] {
            upsert_record(&conn, &dirty(date, json!([])), "test").unwrap();
        }
        let found = query_range(&conn, "u1", EntityKind::Tasks, "2026-05-01", "2026-05-03").unwrap();
        let dates: Vec<_> = found.iter().map(|r| r.date.as_str()).collect();
        assert_eq!(dates, vec!["2026-05-01", "2026-05-02", "2026-05-03"]);
    }

    #[test]
    fn test_mark_clean_requires_unchanged_timestamp() {
        let conn = open_in_memory().unwrap();
        let record = dirty("2026-05-01", json!([]));
        upsert_record(&conn, &record, "test").unwrap();

        let stale = record.updated_at - chrono::Duration::seconds(5);
        assert!(!mark_clean(&conn, &record.key(), &stale, &Utc::now()).unwrap());
        assert_eq!(record_counts(&conn).unwrap().dirty, 1);

        assert!(mark_clean(&conn, &record.key(), &record.updated_at, &Utc::now()).unwrap());
        assert_eq!(record_counts(&conn).unwrap().dirty, 0);
        assert!(dirty_records(&conn).unwrap().is_empty());
    }

    fn corrupt(conn: &Connection, date: &str) {
        conn.execute(
            "UPDATE records SET payload = '{corrupt' WHERE date = ?1",
            params![date],
        )
        .unwrap();
    }

    #[test]
    fn test_unreadable_row_is_skipped_in_lists() {
        let conn = open_in_memory().unwrap();
        for date in ["2026-05-01", "2026-05-02", "2026-05-03"] {
            upsert_record(&conn, &dirty(date, json!([{"title": date}])), "test").unwrap();
        }
        corrupt(&conn, "2026-05-02");

        let dirty = dirty_records(&conn).unwrap();
        let dates: Vec<_> = dirty.iter().map(|r| r.date.as_str()).collect();
        assert_eq!(dates, vec!["2026-05-01", "2026-05-03"]);

        let ranged = query_range(&conn, "u1", EntityKind::Tasks, "2026-05-01", "2026-05-03").unwrap();
        assert_eq!(ranged.len(), 2);
        assert_eq!(list_by_entity(&conn, "u1", EntityKind::Tasks).unwrap().len(), 2);

        // Point lookups still report the damage.
        assert!(get_record(&conn, &key("2026-05-02")).is_err());
    }

    #[test]
    fn test_counts_report_latest_remote_write() {
        let conn = open_in_memory().unwrap();
        assert_eq!(record_counts(&conn).unwrap().last_synced_at, None);

        let first = dirty("2026-05-01", json!([]));
        let second = dirty("2026-05-02", json!([]));
        upsert_record(&conn, &first, "test").unwrap();
        upsert_record(&conn, &second, "test").unwrap();

        let earlier = Utc::now() - chrono::Duration::minutes(5);
        let later = Utc::now();
        mark_clean(&conn, &first.key(), &first.updated_at, &later).unwrap();
        mark_clean(&conn, &second.key(), &second.updated_at, &earlier).unwrap();

        let counts = record_counts(&conn).unwrap();
        assert_eq!(counts.dirty, 0);
        assert_eq!(counts.last_synced_at, Some(later));
    }

    #[test]
    fn test_delete_missing_record() {
        let conn = open_in_memory().unwrap();
        let err = delete_record(&conn, &key("2026-05-01")).unwrap_err();
        assert_eq!(err.code.as_str(), "RECORD_NOT_FOUND");
    }
}
