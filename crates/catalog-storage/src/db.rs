//! SQLite wrapper for the catalog index database.
//!
//! Provides:
//! - Database open with idempotent schema setup
//! - An in-memory variant for tests
//! - Transactions on the shared connection
//! - Small helpers the stores and the rebuild protocol share

use rusqlite::{Connection, Transaction};
use std::path::Path;
use tracing::info;

use crate::error::StorageError;
use crate::schema;

/// Handle to the catalog database.
///
/// The engine is single-threaded and synchronous, so a single shared
/// connection is enough. Callers never hold two transactions at once.
pub struct Db {
    conn: Connection,
}

impl Db {
    /// Open the database at the given path, creating tables if missing.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening catalog database at {:?}", path);
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(schema::CREATE_TABLES)?;
        Ok(())
    }

    /// Reference to the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Start a transaction on the shared connection.
    ///
    /// Uses an unchecked transaction because the connection is shared
    /// behind `&self`; callers uphold the one-transaction-at-a-time
    /// invariant.
    pub fn transaction(&self) -> Result<Transaction<'_>, StorageError> {
        Ok(self.conn.unchecked_transaction()?)
    }

    /// Remove every row from the given table.
    ///
    /// `table` must be one of our schema constants, never user input.
    pub fn truncate(&self, table: &str) -> Result<(), StorageError> {
        self.conn.execute(&format!("DELETE FROM {}", table), [])?;
        Ok(())
    }

    /// Number of rows in the given table.
    pub fn count(&self, table: &str) -> Result<i64, StorageError> {
        let count = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })?;
        Ok(count)
    }
}
