use rusqlite::{params, Connection, OptionalExtension};

use crate::error::LifelockError;

pub fn get_slot(conn: &Connection, key: &str) -> Result<Option<String>, LifelockError> {
    let value = conn
        .query_row(
            "SELECT value FROM kv_slots WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn set_slot(conn: &Connection, key: &str, value: &str) -> Result<(), LifelockError> {
    conn.execute(
        "INSERT INTO kv_slots (key, value) VALUES (?1, ?2)
         ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}

pub fn delete_slot(conn: &Connection, key: &str) -> Result<(), LifelockError> {
    conn.execute("DELETE FROM kv_slots WHERE key = ?1", params![key])?;
    Ok(())
}

pub fn list_slot_keys(conn: &Connection) -> Result<Vec<String>, LifelockError> {
    let mut stmt = conn.prepare("SELECT key FROM kv_slots ORDER BY key ASC")?;
    let keys = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::open_in_memory;

    #[test]
    fn test_set_get_delete() {
        let conn = open_in_memory().unwrap();
        assert!(get_slot(&conn, "lifelock_tasks").unwrap().is_none());

        set_slot(&conn, "lifelock_tasks", "one").unwrap();
        set_slot(&conn, "lifelock_tasks", "two").unwrap();
        assert_eq!(get_slot(&conn, "lifelock_tasks").unwrap().as_deref(), Some("two"));
        assert_eq!(list_slot_keys(&conn).unwrap(), vec!["lifelock_tasks".to_string()]);

        delete_slot(&conn, "lifelock_tasks").unwrap();
        assert!(get_slot(&conn, "lifelock_tasks").unwrap().is_none());
    }
}
