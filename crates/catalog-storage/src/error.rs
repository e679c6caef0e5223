//! Storage layer error types.

use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// SQLite operation failed
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A persisted value could not be interpreted (bad enum code etc.)
    #[error("Invalid stored value: {0}")]
    InvalidValue(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<catalog_types::CatalogError> for StorageError {
    fn from(err: catalog_types::CatalogError) -> Self {
        StorageError::InvalidValue(err.to_string())
    }
}
