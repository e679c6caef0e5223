//! The indexer contract.
//!
//! An indexer owns one derived table pair and knows how to recompute it,
//! either wholesale through the scratch table or incrementally for an id
//! set. The dispatcher only ever talks to this trait.

use tracing::warn;

use catalog_types::{Entity, EventAction, IndexEvent};

use crate::error::IndexingError;
use crate::matcher::EventMatcher;
use crate::rebuild::RebuildProgress;

/// Result of applying events or incremental recomputation.
#[derive(Debug, Default, Clone)]
pub struct UpdateResult {
    /// Index rows written to the destination table
    pub rows_written: usize,
    /// Index rows removed from the destination table
    pub rows_deleted: usize,
    /// Events ignored (unmatched or empty payload)
    pub skipped: usize,
    /// Entities that failed and were passed over
    pub errors: usize,
}

impl UpdateResult {
    /// Create a new empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record rows written to the destination table.
    pub fn record_rows(&mut self, rows: usize) {
        self.rows_written += rows;
    }

    /// Record rows removed from the destination table.
    pub fn record_deleted(&mut self, rows: usize) {
        self.rows_deleted += rows;
    }

    /// Record an ignored event.
    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    /// Record a failed entity.
    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    /// Merge another result into this one.
    pub fn merge(&mut self, other: &UpdateResult) {
        self.rows_written += other.rows_written;
        self.rows_deleted += other.rows_deleted;
        self.skipped += other.skipped;
        self.errors += other.errors;
    }

    /// Whether the destination table changed at all.
    pub fn has_updates(&self) -> bool {
        self.rows_written > 0 || self.rows_deleted > 0
    }
}

/// A strategy that maintains one derived table from the catalog source
/// tables.
///
/// Implementations hold their own database handle and collaborators,
/// injected at construction.
pub trait Indexer {
    /// Stable code identifying this indexer and its process row.
    fn code(&self) -> &'static str;

    /// Human-readable name for operator listings.
    fn name(&self) -> &'static str;

    /// Longer description for operator listings.
    fn description(&self) -> &'static str {
        ""
    }

    /// Whether operators see this indexer in listings. Never affects
    /// correctness.
    fn is_visible(&self) -> bool {
        true
    }

    /// The entity whose ids key this indexer's derived table.
    fn primary_entity(&self) -> Entity;

    /// The (entity, action) pairs this indexer reacts to.
    fn matcher(&self) -> &EventMatcher;

    /// Work units implied by a matched event, normalized to entity ids.
    ///
    /// This is what gets persisted to the backlog in manual mode. The
    /// default takes the payload ids as-is.
    fn register(&self, event: &IndexEvent) -> Vec<i64> {
        event.ids.clone()
    }

    /// Apply one matched event incrementally against the primary table.
    ///
    /// Must leave all persisted state untouched for events the matcher
    /// rejects.
    fn process_event(&self, event: &IndexEvent) -> Result<UpdateResult, IndexingError>;

    /// Rebuild the whole derived table through the scratch twin.
    ///
    /// Idempotent: two runs with no intervening source changes produce
    /// identical primary-table content.
    fn reindex_all(&self) -> Result<RebuildProgress, IndexingError>;

    /// Recompute rows for an id set directly against the primary table.
    ///
    /// Indexers with a bulk path override this. The default replays the
    /// ids through the event path: as one bulk change when the matcher
    /// accepts mass actions for the primary entity, otherwise one save
    /// at a time with failing entities logged and skipped.
    fn reindex_ids(&self, ids: &[i64]) -> Result<UpdateResult, IndexingError> {
        let entity = self.primary_entity();
        if self.matcher().matches(entity, EventAction::MassAction) {
            return self.process_event(&IndexEvent::mass_action(entity, ids.to_vec()));
        }

        let mut result = UpdateResult::new();
        for &id in ids {
            match self.process_event(&IndexEvent::save(entity, id)) {
                Ok(one) => result.merge(&one),
                Err(e) => {
                    warn!(
                        indexer = self.code(),
                        id,
                        error = %e,
                        "Replay failed, skipping entity"
                    );
                    result.record_error();
                }
            }
        }
        Ok(result)
    }

    /// Drop droppable secondary keys on the primary table before a bulk
    /// load. Indexers without such keys keep the no-op default.
    fn disable_keys(&self) -> Result<(), IndexingError> {
        Ok(())
    }

    /// Restore the keys dropped by [`Indexer::disable_keys`]. Every
    /// disable must eventually be followed by this, failure or not.
    fn enable_keys(&self) -> Result<(), IndexingError> {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Instrumented indexers for dispatcher and contract tests.

    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;

    /// Shared view into a [`RecordingIndexer`]'s call history. Clone it
    /// before moving the indexer into a dispatcher.
    #[derive(Clone, Default)]
    pub(crate) struct Probe {
        pub events: Rc<RefCell<Vec<IndexEvent>>>,
        pub full_rebuilds: Rc<Cell<usize>>,
        pub keys_disabled: Rc<Cell<usize>>,
        pub keys_enabled: Rc<Cell<usize>>,
        pub fail_process: Rc<Cell<bool>>,
        pub fail_rebuild: Rc<Cell<bool>>,
    }

    /// Records every call; never touches the database. `reindex_ids` is
    /// left at the trait default so the replay path is observable.
    pub(crate) struct RecordingIndexer {
        pub code: &'static str,
        pub matcher: EventMatcher,
        pub primary: Entity,
        pub probe: Probe,
    }

    impl RecordingIndexer {
        pub fn new(code: &'static str, matcher: EventMatcher, primary: Entity) -> Self {
            Self {
                code,
                matcher,
                primary,
                probe: Probe::default(),
            }
        }

        pub fn product_indexer(code: &'static str) -> Self {
            let matcher = EventMatcher::new().with_entity(
                Entity::Product,
                &[
                    EventAction::Save,
                    EventAction::Delete,
                    EventAction::MassAction,
                ],
            );
            Self::new(code, matcher, Entity::Product)
        }

        /// Matcher without mass actions, forcing the per-id replay tail.
        pub fn save_only_indexer(code: &'static str) -> Self {
            let matcher =
                EventMatcher::new().with_entity(Entity::Product, &[EventAction::Save]);
            Self::new(code, matcher, Entity::Product)
        }

        pub fn probe(&self) -> Probe {
            self.probe.clone()
        }
    }

    impl Indexer for RecordingIndexer {
        fn code(&self) -> &'static str {
            self.code
        }

        fn name(&self) -> &'static str {
            "Recording"
        }

        fn primary_entity(&self) -> Entity {
            self.primary
        }

        fn matcher(&self) -> &EventMatcher {
            &self.matcher
        }

        fn process_event(&self, event: &IndexEvent) -> Result<UpdateResult, IndexingError> {
            if self.probe.fail_process.get() {
                return Err(IndexingError::Index("induced failure".to_string()));
            }
            let mut result = UpdateResult::new();
            if !self.matcher.matches_event(event) {
                result.record_skip();
                return Ok(result);
            }
            self.probe.events.borrow_mut().push(event.clone());
            result.record_rows(event.ids.len());
            Ok(result)
        }

        fn reindex_all(&self) -> Result<RebuildProgress, IndexingError> {
            if self.probe.fail_rebuild.get() {
                return Err(IndexingError::Index("induced rebuild failure".to_string()));
            }
            self.probe.full_rebuilds.set(self.probe.full_rebuilds.get() + 1);
            let mut progress = RebuildProgress::new();
            progress.mark_completed();
            Ok(progress)
        }

        fn disable_keys(&self) -> Result<(), IndexingError> {
            self.probe.keys_disabled.set(self.probe.keys_disabled.get() + 1);
            Ok(())
        }

        fn enable_keys(&self) -> Result<(), IndexingError> {
            self.probe.keys_enabled.set(self.probe.keys_enabled.get() + 1);
            Ok(())
        }
    }

    /// Overrides `reindex_ids` with a direct bulk path, the way a real
    /// resource with a specialized bulk method does.
    pub(crate) struct BulkIndexer {
        pub inner: RecordingIndexer,
        pub bulk_calls: Rc<RefCell<Vec<Vec<i64>>>>,
    }

    impl BulkIndexer {
        pub fn new(code: &'static str) -> Self {
            Self {
                inner: RecordingIndexer::product_indexer(code),
                bulk_calls: Rc::new(RefCell::new(Vec::new())),
            }
        }
    }

    impl Indexer for BulkIndexer {
        fn code(&self) -> &'static str {
            self.inner.code
        }

        fn name(&self) -> &'static str {
            "Bulk"
        }

        fn primary_entity(&self) -> Entity {
            self.inner.primary
        }

        fn matcher(&self) -> &EventMatcher {
            &self.inner.matcher
        }

        fn process_event(&self, event: &IndexEvent) -> Result<UpdateResult, IndexingError> {
            self.inner.process_event(event)
        }

        fn reindex_all(&self) -> Result<RebuildProgress, IndexingError> {
            self.inner.reindex_all()
        }

        fn reindex_ids(&self, ids: &[i64]) -> Result<UpdateResult, IndexingError> {
            self.bulk_calls.borrow_mut().push(ids.to_vec());
            let mut result = UpdateResult::new();
            result.record_rows(ids.len());
            Ok(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{BulkIndexer, RecordingIndexer};
    use super::*;

    #[test]
    fn test_update_result_record_and_merge() {
        let mut result = UpdateResult::new();
        result.record_rows(3);
        result.record_deleted(1);
        result.record_skip();
        result.record_error();

        let mut other = UpdateResult::new();
        other.record_rows(2);
        other.merge(&result);

        assert_eq!(other.rows_written, 5);
        assert_eq!(other.rows_deleted, 1);
        assert_eq!(other.skipped, 1);
        assert_eq!(other.errors, 1);
        assert!(other.has_updates());
    }

    #[test]
    fn test_update_result_no_updates_when_only_skips() {
        let mut result = UpdateResult::new();
        result.record_skip();
        assert!(!result.has_updates());
    }

    #[test]
    fn default_reindex_ids_replays_as_mass_action() {
        let indexer = RecordingIndexer::product_indexer("mass");

        let result = indexer.reindex_ids(&[1, 2, 3]).unwrap();
        assert_eq!(result.rows_written, 3);

        let events = indexer.probe.events.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, EventAction::MassAction);
        assert_eq!(events[0].ids, vec![1, 2, 3]);
    }

    #[test]
    fn default_reindex_ids_falls_back_to_per_id_saves() {
        let indexer = RecordingIndexer::save_only_indexer("saves");

        indexer.reindex_ids(&[4, 5]).unwrap();

        let events = indexer.probe.events.borrow();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.action == EventAction::Save));
        assert_eq!(events[0].ids, vec![4]);
        assert_eq!(events[1].ids, vec![5]);
    }

    #[test]
    fn bulk_override_wins_over_replay() {
        let indexer = BulkIndexer::new("bulk");

        indexer.reindex_ids(&[7, 8]).unwrap();

        assert_eq!(*indexer.bulk_calls.borrow(), vec![vec![7, 8]]);
        // The event path was never exercised.
        assert!(indexer.inner.probe.events.borrow().is_empty());
    }

    #[test]
    fn per_id_replay_skips_failing_entities() {
        let indexer = RecordingIndexer::save_only_indexer("flaky");
        indexer.probe.fail_process.set(true);

        let result = indexer.reindex_ids(&[1, 2]).unwrap();
        assert_eq!(result.errors, 2);
        assert_eq!(result.rows_written, 0);
    }
}
