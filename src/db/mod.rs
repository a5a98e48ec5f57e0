pub mod connection;
pub mod migrations;
pub mod record_repo;
pub mod slot_repo;

use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;

pub use connection::*;

/// One connection shared by the record store and the SQLite slot store.
pub type SharedConnection = Arc<Mutex<Connection>>;

pub fn shared(conn: Connection) -> SharedConnection {
    Arc::new(Mutex::new(conn))
}
