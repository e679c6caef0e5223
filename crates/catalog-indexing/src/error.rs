//! Error types for the indexing engine.

use catalog_storage::StorageError;
use thiserror::Error;

/// Errors that can occur while dispatching events or rebuilding tables
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Storage operation failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A run is already in flight for this indexer
    #[error("Reindex already running for {0}")]
    ReindexInProgress(String),

    /// The process is flagged for a full rebuild and refuses incremental work
    #[error("Indexer {0} requires a full reindex")]
    RequiresFullReindex(String),

    /// No indexer registered under this code
    #[error("Unknown indexer: {0}")]
    UnknownIndexer(String),

    /// Generic index operation error
    #[error("Index error: {0}")]
    Index(String),
}

impl From<rusqlite::Error> for IndexingError {
    fn from(err: rusqlite::Error) -> Self {
        IndexingError::Storage(StorageError::from(err))
    }
}
