//! Persisted pending work for manual-mode indexers.
//!
//! When an indexer runs in manual mode, matched events are not applied
//! inline. The dispatcher records them here and a later drain replays
//! them in insertion order. Rows survive restarts; the queue is the
//! durable record that a drain is owed.

use chrono::{DateTime, Utc};
use rusqlite::params;
use std::sync::Arc;

use catalog_types::{Entity, EventAction, IndexEvent};

use crate::db::Db;
use crate::error::StorageError;

/// One queued unit of work for one indexer.
#[derive(Debug, Clone, PartialEq)]
pub struct BacklogRow {
    pub backlog_id: i64,
    pub indexer_code: String,
    pub entity: Entity,
    pub action: EventAction,
    pub ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

impl BacklogRow {
    /// Rebuild the event this row was recorded from.
    pub fn to_event(&self) -> IndexEvent {
        IndexEvent {
            entity: self.entity,
            action: self.action,
            ids: self.ids.clone(),
        }
    }
}

/// Store for `index_backlog` rows.
pub struct BacklogStore {
    db: Arc<Db>,
}

impl BacklogStore {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    /// Queue the normalized work units of one matched event.
    ///
    /// `ids` comes from the indexer's `register` step, which may differ
    /// from the raw event payload.
    pub fn enqueue(
        &self,
        code: &str,
        entity: Entity,
        action: EventAction,
        ids: &[i64],
    ) -> Result<i64, StorageError> {
        let ids_json = serde_json::to_string(ids)?;
        self.db.conn().execute(
            "INSERT INTO index_backlog (indexer_code, entity, action, ids, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                code,
                entity.as_str(),
                action.as_str(),
                ids_json,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(self.db.conn().last_insert_rowid())
    }

    /// Oldest queued rows for one indexer past `after_id`, at most
    /// `limit`.
    ///
    /// Does not remove anything; callers delete rows after applying them
    /// so a failed drain leaves its work queued. The cursor lets a drain
    /// step past rows it chose to leave behind.
    pub fn peek_batch(
        &self,
        code: &str,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<BacklogRow>, StorageError> {
        let mut stmt = self.db.conn().prepare(
            "SELECT backlog_id, indexer_code, entity, action, ids, created_at \
             FROM index_backlog WHERE indexer_code = ?1 AND backlog_id > ?2 \
             ORDER BY backlog_id ASC LIMIT ?3",
        )?;
        let raw = stmt
            .query_map(params![code, after_id, limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter().map(row_to_backlog).collect()
    }

    /// Remove rows that were applied.
    pub fn remove(&self, backlog_ids: &[i64]) -> Result<usize, StorageError> {
        let tx = self.db.transaction()?;
        let mut removed = 0;
        for id in backlog_ids {
            removed += tx.execute(
                "DELETE FROM index_backlog WHERE backlog_id = ?1",
                params![id],
            )?;
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Number of queued rows for one indexer.
    pub fn count(&self, code: &str) -> Result<i64, StorageError> {
        let count = self.db.conn().query_row(
            "SELECT COUNT(*) FROM index_backlog WHERE indexer_code = ?1",
            params![code],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Drop every queued row for one indexer.
    ///
    /// A successful full rebuild calls this: the rebuild already saw the
    /// state those rows describe.
    pub fn clear(&self, code: &str) -> Result<usize, StorageError> {
        let removed = self.db.conn().execute(
            "DELETE FROM index_backlog WHERE indexer_code = ?1",
            params![code],
        )?;
        Ok(removed)
    }
}

fn row_to_backlog(
    (backlog_id, indexer_code, entity, action, ids, created_at): (
        i64,
        String,
        String,
        String,
        String,
        String,
    ),
) -> Result<BacklogRow, StorageError> {
    Ok(BacklogRow {
        backlog_id,
        indexer_code,
        entity: entity.parse()?,
        action: action.parse()?,
        ids: serde_json::from_str(&ids)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| StorageError::InvalidValue(format!("created_at: {}", e)))?
            .with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> BacklogStore {
        BacklogStore::new(Arc::new(Db::open_in_memory().unwrap()))
    }

    #[test]
    fn enqueue_and_peek_preserves_order() {
        let store = store();
        store
            .enqueue("stock_status", Entity::Product, EventAction::Save, &[1])
            .unwrap();
        store
            .enqueue("stock_status", Entity::Product, EventAction::Delete, &[2])
            .unwrap();
        store
            .enqueue(
                "stock_status",
                Entity::StockItem,
                EventAction::MassAction,
                &[3, 4],
            )
            .unwrap();

        let rows = store.peek_batch("stock_status", 0, 10).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].ids, vec![1]);
        assert_eq!(rows[1].action, EventAction::Delete);
        assert_eq!(rows[2].entity, Entity::StockItem);
        assert_eq!(rows[2].ids, vec![3, 4]);
    }

    #[test]
    fn peek_respects_limit_and_code() {
        let store = store();
        for id in 0..5 {
            store
                .enqueue("stock_status", Entity::Product, EventAction::Save, &[id])
                .unwrap();
        }
        store
            .enqueue("price", Entity::Product, EventAction::Save, &[99])
            .unwrap();

        let rows = store.peek_batch("stock_status", 0, 2).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ids, vec![0]);

        assert_eq!(store.count("stock_status").unwrap(), 5);
        assert_eq!(store.count("price").unwrap(), 1);
    }

    #[test]
    fn peek_cursor_skips_earlier_rows() {
        let store = store();
        let first = store
            .enqueue("stock_status", Entity::Product, EventAction::Save, &[1])
            .unwrap();
        store
            .enqueue("stock_status", Entity::Product, EventAction::Save, &[2])
            .unwrap();

        let rows = store.peek_batch("stock_status", first, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ids, vec![2]);
    }

    #[test]
    fn peek_does_not_consume() {
        let store = store();
        store
            .enqueue("stock_status", Entity::Product, EventAction::Save, &[7])
            .unwrap();

        store.peek_batch("stock_status", 0, 10).unwrap();
        assert_eq!(store.count("stock_status").unwrap(), 1);
    }

    #[test]
    fn remove_deletes_only_given_rows() {
        let store = store();
        let first = store
            .enqueue("stock_status", Entity::Product, EventAction::Save, &[1])
            .unwrap();
        store
            .enqueue("stock_status", Entity::Product, EventAction::Save, &[2])
            .unwrap();

        let removed = store.remove(&[first]).unwrap();
        assert_eq!(removed, 1);

        let rows = store.peek_batch("stock_status", 0, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ids, vec![2]);
    }

    #[test]
    fn clear_scopes_to_one_indexer() {
        let store = store();
        store
            .enqueue("stock_status", Entity::Product, EventAction::Save, &[1])
            .unwrap();
        store
            .enqueue("price", Entity::Product, EventAction::Save, &[2])
            .unwrap();

        let removed = store.clear("stock_status").unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count("stock_status").unwrap(), 0);
        assert_eq!(store.count("price").unwrap(), 1);
    }

    #[test]
    fn row_round_trips_to_event() {
        let store = store();
        store
            .enqueue(
                "stock_status",
                Entity::StockItem,
                EventAction::MassAction,
                &[10, 20, 30],
            )
            .unwrap();

        let rows = store.peek_batch("stock_status", 0, 1).unwrap();
        let event = rows[0].to_event();
        assert_eq!(event.entity, Entity::StockItem);
        assert_eq!(event.action, EventAction::MassAction);
        assert_eq!(event.ids, vec![10, 20, 30]);
    }
}
