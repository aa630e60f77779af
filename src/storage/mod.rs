// src/storage/mod.rs — Storage manager

pub mod schema;
pub mod store;
pub mod store_server;

pub use store_server::{spawn_store_server, StoreHandle};

use rusqlite::Connection;
use std::path::Path;

/// Central storage manager owning the SQLite connection.
pub struct StorageManager {
    pub store: store::Store,
}

impl StorageManager {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        schema::run_migrations(&conn)?;

        Ok(Self {
            store: store::Store::new(conn),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::run_migrations(&conn)?;
        Ok(Self {
            store: store::Store::new(conn),
        })
    }

    /// Move the store into its background task and return the handle.
    pub fn spawn(self, capacity: usize) -> StoreHandle {
        let (handle, _join) = spawn_store_server(self.store, capacity);
        handle
    }
}
