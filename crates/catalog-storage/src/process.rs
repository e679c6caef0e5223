//! Persistence for per-indexer process rows.
//!
//! One row per registered indexer: mode, status, last run timestamp.
//! Status transitions are guarded UPDATEs so the row itself enforces
//! mutual exclusion for runs.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

use catalog_types::{IndexerMode, ProcessState, ProcessStatus};

use crate::db::Db;
use crate::error::StorageError;

/// Store for `index_process` rows.
pub struct ProcessStore {
    db: Arc<Db>,
}

impl ProcessStore {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    /// Ensure a process row exists for the given indexer.
    ///
    /// An existing row wins: the mode an operator chose earlier survives
    /// restarts, `default_mode` only applies to a fresh installation.
    pub fn register(
        &self,
        code: &str,
        default_mode: IndexerMode,
    ) -> Result<ProcessState, StorageError> {
        self.db.conn().execute(
            "INSERT OR IGNORE INTO index_process (indexer_code, mode, status, last_run_at) \
             VALUES (?1, ?2, ?3, NULL)",
            params![
                code,
                default_mode.as_str(),
                ProcessStatus::Ready.as_str()
            ],
        )?;
        self.load(code)
    }

    /// Load one process row.
    pub fn load(&self, code: &str) -> Result<ProcessState, StorageError> {
        let row = self
            .db
            .conn()
            .query_row(
                "SELECT indexer_code, mode, status, last_run_at \
                 FROM index_process WHERE indexer_code = ?1",
                params![code],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| StorageError::NotFound(format!("process {}", code)))?;
        row_to_state(row)
    }

    /// All process rows, ordered by indexer code.
    pub fn list(&self) -> Result<Vec<ProcessState>, StorageError> {
        let mut stmt = self.db.conn().prepare(
            "SELECT indexer_code, mode, status, last_run_at \
             FROM index_process ORDER BY indexer_code",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(row_to_state).collect()
    }

    /// Change how matched events are applied for this indexer.
    ///
    /// Takes effect for events received after the change only; backlog
    /// rows queued under the old mode stay queued until drained.
    pub fn set_mode(&self, code: &str, mode: IndexerMode) -> Result<(), StorageError> {
        let changed = self.db.conn().execute(
            "UPDATE index_process SET mode = ?1 WHERE indexer_code = ?2",
            params![mode.as_str(), code],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("process {}", code)));
        }
        Ok(())
    }

    /// Record queued work against this indexer.
    ///
    /// Never overrides `running` (the drain re-checks the backlog when it
    /// finishes) or `require_reindex` (queued rows cannot repair a table
    /// that needs a full rebuild). Returns whether the row changed.
    pub fn mark_pending(&self, code: &str) -> Result<bool, StorageError> {
        let changed = self.db.conn().execute(
            "UPDATE index_process SET status = ?1 \
             WHERE indexer_code = ?2 AND status NOT IN (?3, ?4)",
            params![
                ProcessStatus::Pending.as_str(),
                code,
                ProcessStatus::Running.as_str(),
                ProcessStatus::RequireReindex.as_str()
            ],
        )?;
        Ok(changed == 1)
    }

    /// Flag the derived table as untrustworthy until a full rebuild.
    pub fn mark_require_reindex(&self, code: &str) -> Result<(), StorageError> {
        self.db.conn().execute(
            "UPDATE index_process SET status = ?1 WHERE indexer_code = ?2",
            params![ProcessStatus::RequireReindex.as_str(), code],
        )?;
        Ok(())
    }

    /// Try to move this process into `running`.
    ///
    /// The guarded UPDATE is the per-indexer mutual exclusion: a second
    /// caller sees zero changed rows and backs off. Returns false for a
    /// process that is already running (or does not exist; callers load
    /// the row first).
    pub fn try_begin_run(&self, code: &str) -> Result<bool, StorageError> {
        let changed = self.db.conn().execute(
            "UPDATE index_process SET status = ?1 \
             WHERE indexer_code = ?2 AND status != ?1",
            params![ProcessStatus::Running.as_str(), code],
        )?;
        Ok(changed == 1)
    }

    /// Record the outcome of a run.
    ///
    /// `touch_last_run` is set by operations that completed the indexer's
    /// work (a full rebuild, a clean drain), never by failure paths.
    pub fn finish_run(
        &self,
        code: &str,
        status: ProcessStatus,
        touch_last_run: bool,
    ) -> Result<(), StorageError> {
        if touch_last_run {
            self.db.conn().execute(
                "UPDATE index_process SET status = ?1, last_run_at = ?2 \
                 WHERE indexer_code = ?3",
                params![status.as_str(), Utc::now().to_rfc3339(), code],
            )?;
        } else {
            self.db.conn().execute(
                "UPDATE index_process SET status = ?1 WHERE indexer_code = ?2",
                params![status.as_str(), code],
            )?;
        }
        Ok(())
    }
}

fn row_to_state(
    (code, mode, status, last_run): (String, String, String, Option<String>),
) -> Result<ProcessState, StorageError> {
    let last_run_at = match last_run {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(&raw)
                .map_err(|e| StorageError::InvalidValue(format!("last_run_at: {}", e)))?
                .with_timezone(&Utc),
        ),
        None => None,
    };
    Ok(ProcessState {
        indexer_code: code,
        mode: mode.parse()?,
        status: status.parse()?,
        last_run_at,
    })
}
