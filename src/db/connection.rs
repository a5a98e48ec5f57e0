use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::error::LifelockError;

use super::migrations;

/// Get the path to the lifelock database inside a data directory.
pub fn db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("lifelock.db")
}

/// Directory holding the file-backed redundancy slots.
pub fn slots_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("slots")
}

/// Directory receiving exported backup files.
pub fn backups_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("backups")
}

/// Open a connection to the database. Returns error if not initialized.
pub fn open_db(data_dir: &Path) -> Result<Connection, LifelockError> {
    let path = db_path(data_dir);
    if !path.exists() {
        return Err(LifelockError::not_initialized());
    }
    let conn = Connection::open(&path)?;
    configure_connection(&conn)?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}

/// Initialize the database: create directories, database, and run migrations.
pub fn init_db(data_dir: &Path) -> Result<PathBuf, LifelockError> {
    let path = db_path(data_dir);
    fs::create_dir_all(slots_dir(data_dir))?;
    fs::create_dir_all(backups_dir(data_dir))?;
    let conn = Connection::open(&path)?;
    configure_connection(&conn)?;
    migrations::run_migrations(&conn)?;
    Ok(path)
}

/// In-memory database with the current schema.
pub fn open_in_memory() -> Result<Connection, LifelockError> {
    let conn = Connection::open_in_memory()?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}

fn configure_connection(conn: &Connection) -> Result<(), LifelockError> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA busy_timeout=5000;",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_requires_init() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = open_db(dir.path()).unwrap_err();
        assert_eq!(err.code.as_str(), "NOT_INITIALIZED");
    }

    #[test]
    fn test_init_creates_layout() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = init_db(dir.path()).unwrap();
        assert!(path.exists());
        assert!(slots_dir(dir.path()).is_dir());
        assert!(backups_dir(dir.path()).is_dir());
        assert!(open_db(dir.path()).is_ok());
    }
}
