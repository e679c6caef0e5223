//! Manual-mode behavior: matched events queue instead of applying, a
//! drain works the queue off, and an invalidated process refuses to
//! drain until a full rebuild has run.

use pretty_assertions::assert_eq;

use catalog_types::{Entity, IndexEvent, IndexerMode, ProcessStatus};
use e2e_tests::TestHarness;

#[test]
fn queued_events_wait_for_a_drain() {
    let harness = TestHarness::new();
    let engine = harness.engine(IndexerMode::Manual);
    harness.seed_simple(1, 10.0, true);
    harness.seed_simple(2, 0.0, false);

    let report = engine.dispatch(&IndexEvent::mass_action(Entity::Product, vec![1, 2]));

    assert_eq!(report.queued, 1);
    assert_eq!(report.applied, 0);
    assert_eq!(harness.status_of(1), None);
    assert_eq!(harness.backlog_count("stock_status"), 1);
    assert_eq!(
        harness.process_state("stock_status").status,
        ProcessStatus::Pending
    );

    let result = engine.drain("stock_status").unwrap();

    assert!(result.has_updates());
    assert_eq!(harness.status_of(1), Some(1));
    assert_eq!(harness.status_of(2), Some(0));
    assert_eq!(harness.backlog_count("stock_status"), 0);

    let state = harness.process_state("stock_status");
    assert_eq!(state.status, ProcessStatus::Ready);
    assert!(state.last_run_at.is_some());
}

#[test]
fn mode_change_affects_only_later_events() {
    let harness = TestHarness::new();
    let engine = harness.engine(IndexerMode::Manual);
    harness.seed_simple(1, 10.0, true);
    harness.seed_simple(2, 10.0, true);

    engine.dispatch(&IndexEvent::save(Entity::Product, 1));
    assert_eq!(harness.status_of(1), None);

    engine.set_mode("stock_status", IndexerMode::RealTime).unwrap();
    engine.dispatch(&IndexEvent::save(Entity::Product, 2));

    // The later event applied inline; the earlier one is still queued.
    assert_eq!(harness.status_of(2), Some(1));
    assert_eq!(harness.status_of(1), None);
    assert_eq!(harness.backlog_count("stock_status"), 1);

    engine.drain("stock_status").unwrap();
    assert_eq!(harness.status_of(1), Some(1));
}

#[test]
fn invalidated_process_refuses_to_drain() {
    let harness = TestHarness::new();
    let engine = harness.engine(IndexerMode::Manual);
    harness.seed_simple(1, 10.0, true);

    engine.dispatch(&IndexEvent::save(Entity::Product, 1));
    engine.invalidate("stock_status").unwrap();
    assert_eq!(
        harness.process_state("stock_status").status,
        ProcessStatus::RequireReindex
    );

    // Draining would clear the invalidation without rebuilding.
    assert!(engine.drain("stock_status").is_err());
    assert_eq!(harness.status_of(1), None);

    engine.reindex_all("stock_status").unwrap();

    assert_eq!(harness.status_of(1), Some(1));
    assert_eq!(harness.backlog_count("stock_status"), 0);
    assert_eq!(
        harness.process_state("stock_status").status,
        ProcessStatus::Ready
    );
}
