use rusqlite::Connection;

use crate::error::LifelockError;

/// Bump when the table layout changes. Older databases are rebuilt.
pub const SCHEMA_VERSION: i64 = 1;

pub fn run_migrations(conn: &Connection) -> Result<(), LifelockError> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version != 0 && version != SCHEMA_VERSION {
        tracing::warn!(found = version, expected = SCHEMA_VERSION, "local schema version mismatch, rebuilding");
        drop_all(conn)?;
    }

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS records (
            id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            entity TEXT NOT NULL,
            date TEXT NOT NULL,
            payload TEXT NOT NULL,
            dirty INTEGER NOT NULL DEFAULT 0 CHECK (dirty IN (0, 1)),
            updated_at TEXT NOT NULL,
            remote_updated_at TEXT,
            PRIMARY KEY (user_id, entity, date)
        );

        CREATE TABLE IF NOT EXISTS kv_slots (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_records_user_entity_date ON records(user_id, entity, date);
        CREATE INDEX IF NOT EXISTS idx_records_dirty ON records(dirty) WHERE dirty = 1;
        ",
    )?;
    conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
    Ok(())
}

/// Throw away the record store and recreate the schema. Slot data in
/// `kv_slots` is left in place.
pub fn rebuild(conn: &Connection) -> Result<(), LifelockError> {
    drop_all(conn)?;
    run_migrations(conn)
}

fn drop_all(conn: &Connection) -> Result<(), LifelockError> {
    conn.execute_batch(
        "DROP TABLE IF EXISTS records;
         PRAGMA user_version = 0;",
    )?;
    Ok(())
}
