//! The shadow-table rebuild protocol.
//!
//! A full rebuild never edits the primary table in place. It truncates
//! the scratch twin, runs the aggregation into it, then swaps the result
//! in as one transaction. Readers see the old rows or the new rows,
//! never a mix.

use tracing::{info, warn};

use catalog_storage::{Db, TablePair};

use crate::error::IndexingError;
use crate::indexer::Indexer;

/// Progress of one full rebuild.
#[derive(Debug, Clone, Default)]
pub struct RebuildProgress {
    /// Rows written into the scratch table.
    pub rows_built: u64,
    /// Rows moved into the primary table by the swap.
    pub rows_swapped: u64,
    /// Whether the rebuild ran to completion and swapped.
    pub completed: bool,
}

impl RebuildProgress {
    /// Create a new progress tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record rows written into the scratch table.
    pub fn record_built(&mut self, rows: u64) {
        self.rows_built += rows;
    }

    /// Record rows moved by the swap.
    pub fn record_swapped(&mut self, rows: u64) {
        self.rows_swapped += rows;
    }

    /// Mark the rebuild as swapped and done.
    pub fn mark_completed(&mut self) {
        self.completed = true;
    }
}

/// Scoped disable/enable of an indexer's secondary keys.
///
/// Restores the keys on drop, so a failing bulk load cannot leave the
/// primary table unindexed.
pub struct KeysGuard<'a> {
    indexer: &'a dyn Indexer,
    armed: bool,
}

impl<'a> KeysGuard<'a> {
    /// Drop the indexer's secondary keys and arm the guard.
    pub fn disable(indexer: &'a dyn Indexer) -> Result<Self, IndexingError> {
        indexer.disable_keys()?;
        Ok(Self {
            indexer,
            armed: true,
        })
    }

    /// Restore the keys, surfacing any error to the caller.
    pub fn enable(mut self) -> Result<(), IndexingError> {
        self.armed = false;
        self.indexer.enable_keys()
    }
}

impl Drop for KeysGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.indexer.enable_keys() {
                warn!(
                    indexer = self.indexer.code(),
                    error = %e,
                    "Failed to restore index keys"
                );
            }
        }
    }
}

/// Replace the primary table's content with the scratch twin's.
///
/// One transaction covers the delete and the copy. The scratch table is
/// left truncated for the next run. Returns the number of rows moved.
pub fn swap_scratch_into_primary(db: &Db, pair: &TablePair) -> Result<usize, IndexingError> {
    let tx = db.transaction()?;
    tx.execute(&format!("DELETE FROM {}", pair.primary), [])?;
    let moved = tx.execute(
        &format!(
            "INSERT INTO {} ({cols}) SELECT {cols} FROM {}",
            pair.primary,
            pair.scratch,
            cols = pair.columns
        ),
        [],
    )?;
    tx.execute(&format!("DELETE FROM {}", pair.scratch), [])?;
    tx.commit()?;
    Ok(moved)
}

/// Run one indexer's full rebuild under the shadow-table protocol.
///
/// `build` writes the full aggregation into the freshly truncated
/// scratch table and returns the number of rows it produced. If it
/// fails, the primary table is untouched and the keys guard restores
/// the secondary keys on unwind.
pub fn run_shadow_rebuild<F>(
    db: &Db,
    indexer: &dyn Indexer,
    pair: &TablePair,
    build: F,
) -> Result<RebuildProgress, IndexingError>
where
    F: FnOnce() -> Result<u64, IndexingError>,
{
    let mut progress = RebuildProgress::new();

    db.truncate(pair.scratch)?;

    let guard = KeysGuard::disable(indexer)?;
    let built = build()?;
    progress.record_built(built);

    let moved = swap_scratch_into_primary(db, pair)?;
    progress.record_swapped(moved as u64);

    guard.enable()?;
    progress.mark_completed();

    info!(
        indexer = indexer.code(),
        rows = progress.rows_swapped,
        "Shadow rebuild swapped in"
    );
    Ok(progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::testing::RecordingIndexer;
    use catalog_storage::STOCK_STATUS;
    use std::sync::Arc;

    fn seed_scratch(db: &Db, product_id: i64, status: i64) {
        db.conn()
            .execute(
                "INSERT INTO inventory_stock_status_idx \
                 (product_id, website_id, stock_id, qty, stock_status) \
                 VALUES (?1, 1, 1, 1.0, ?2)",
                rusqlite::params![product_id, status],
            )
            .unwrap();
    }

    fn primary_rows(db: &Db) -> Vec<(i64, i64)> {
        let mut stmt = db
            .conn()
            .prepare(
                "SELECT product_id, stock_status FROM inventory_stock_status \
                 ORDER BY product_id",
            )
            .unwrap();
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_rebuild_progress_counters() {
        let mut progress = RebuildProgress::new();
        progress.record_built(10);
        progress.record_swapped(10);
        assert_eq!(progress.rows_built, 10);
        assert_eq!(progress.rows_swapped, 10);
        assert!(!progress.completed);
        progress.mark_completed();
        assert!(progress.completed);
    }

    #[test]
    fn swap_replaces_primary_and_empties_scratch() {
        let db = Db::open_in_memory().unwrap();
        db.conn()
            .execute(
                "INSERT INTO inventory_stock_status \
                 (product_id, website_id, stock_id, qty, stock_status) \
                 VALUES (99, 1, 1, 0.0, 0)",
                [],
            )
            .unwrap();
        seed_scratch(&db, 1, 1);
        seed_scratch(&db, 2, 0);

        let moved = swap_scratch_into_primary(&db, &STOCK_STATUS).unwrap();
        assert_eq!(moved, 2);
        assert_eq!(primary_rows(&db), vec![(1, 1), (2, 0)]);
        assert_eq!(db.count(STOCK_STATUS.scratch).unwrap(), 0);
    }

    #[test]
    fn shadow_rebuild_runs_protocol_in_order() {
        let db = Arc::new(Db::open_in_memory().unwrap());
        // A leftover from an earlier failed run; the truncate step must
        // wipe it before the build writes.
        seed_scratch(&db, 42, 1);

        let indexer = RecordingIndexer::product_indexer("stock_status");
        let progress = run_shadow_rebuild(&db, &indexer, &STOCK_STATUS, || {
            seed_scratch(&db, 7, 1);
            Ok(1)
        })
        .unwrap();

        assert!(progress.completed);
        assert_eq!(progress.rows_built, 1);
        assert_eq!(progress.rows_swapped, 1);
        assert_eq!(primary_rows(&db), vec![(7, 1)]);
        assert_eq!(indexer.probe.keys_disabled.get(), 1);
        assert_eq!(indexer.probe.keys_enabled.get(), 1);
    }

    #[test]
    fn failed_build_leaves_primary_untouched() {
        let db = Arc::new(Db::open_in_memory().unwrap());
        db.conn()
            .execute(
                "INSERT INTO inventory_stock_status \
                 (product_id, website_id, stock_id, qty, stock_status) \
                 VALUES (5, 1, 1, 2.0, 1)",
                [],
            )
            .unwrap();

        let indexer = RecordingIndexer::product_indexer("stock_status");
        let result = run_shadow_rebuild(&db, &indexer, &STOCK_STATUS, || {
            Err(IndexingError::Index("aggregation blew up".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(primary_rows(&db), vec![(5, 1)]);
    }

    #[test]
    fn keys_are_restored_even_when_build_fails() {
        let db = Arc::new(Db::open_in_memory().unwrap());
        let indexer = RecordingIndexer::product_indexer("stock_status");

        let _ = run_shadow_rebuild(&db, &indexer, &STOCK_STATUS, || {
            Err(IndexingError::Index("boom".to_string()))
        });

        assert_eq!(indexer.probe.keys_disabled.get(), 1);
        assert_eq!(indexer.probe.keys_enabled.get(), 1);
    }
}
