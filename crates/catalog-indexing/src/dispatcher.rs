//! Synchronous fan-out of change events to registered indexers.
//!
//! The dispatcher owns the registry of indexers and their process rows.
//! Every matched event is either applied inline (real-time mode) or
//! persisted to the backlog (manual mode) for a later drain. One failing
//! indexer never blocks the others; failures are collected per run.

use std::sync::Arc;

use tracing::{debug, info, warn};

use catalog_storage::{BacklogStore, Db, ProcessStore};
use catalog_types::{Entity, IndexEvent, IndexerMode, ProcessState, ProcessStatus};

use crate::error::IndexingError;
use crate::indexer::{Indexer, UpdateResult};
use crate::rebuild::RebuildProgress;

/// Backlog rows pulled per drain iteration.
const DEFAULT_DRAIN_BATCH: usize = 200;

/// Per-event outcome across the whole registry.
#[derive(Debug, Default, Clone)]
pub struct DispatchReport {
    /// Indexers that applied the event inline
    pub applied: usize,
    /// Indexers that queued the event for a later drain
    pub queued: usize,
    /// Indexers whose matcher declined the event
    pub unmatched: usize,
    /// Codes of indexers that failed on this event
    pub failed: Vec<String>,
    /// Merged result of the inline applications
    pub result: UpdateResult,
}

impl DispatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether every matched indexer handled the event.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of an operation run across every registered indexer.
#[derive(Debug, Default, Clone)]
pub struct RunReport {
    /// Indexers that completed
    pub succeeded: usize,
    /// Codes of indexers that failed
    pub failed: Vec<String>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// One row of the operator-facing status listing.
#[derive(Debug, Clone)]
pub struct ProcessOverview {
    /// Human-readable indexer name
    pub name: &'static str,
    /// Whether operators are meant to see this indexer
    pub visible: bool,
    /// Current process row
    pub state: ProcessState,
    /// Queued backlog rows waiting for a drain
    pub backlog: i64,
}

/// Routes events to indexers and runs their full and incremental rebuilds.
///
/// Single-threaded by design; the process rows still guard against a
/// second engine instance on the same database file.
pub struct Dispatcher {
    processes: ProcessStore,
    backlog: BacklogStore,
    indexers: Vec<Box<dyn Indexer>>,
    drain_batch_size: usize,
}

impl Dispatcher {
    pub fn new(db: Arc<Db>) -> Self {
        Self {
            processes: ProcessStore::new(Arc::clone(&db)),
            backlog: BacklogStore::new(db),
            indexers: Vec::new(),
            drain_batch_size: DEFAULT_DRAIN_BATCH,
        }
    }

    pub fn with_drain_batch_size(mut self, size: usize) -> Self {
        self.drain_batch_size = size.max(1);
        self
    }

    /// Add an indexer to the registry and ensure its process row exists.
    ///
    /// `default_mode` only applies to a fresh row; a mode an operator set
    /// earlier survives restarts.
    pub fn register(
        &mut self,
        indexer: Box<dyn Indexer>,
        default_mode: IndexerMode,
    ) -> Result<ProcessState, IndexingError> {
        let code = indexer.code();
        if self.indexer_by_code(code).is_ok() {
            return Err(IndexingError::Index(format!(
                "Indexer {} already registered",
                code
            )));
        }
        let state = self.processes.register(code, default_mode)?;
        info!(indexer = code, mode = %state.mode, "Registered indexer");
        self.indexers.push(indexer);
        Ok(state)
    }

    /// Fan one event out to every registered indexer.
    ///
    /// Unmatched indexers are passed over without touching their state.
    /// A failing real-time indexer is flagged `require_reindex` and the
    /// loop continues with the rest; inspect the report for failures.
    pub fn dispatch(&self, event: &IndexEvent) -> DispatchReport {
        let mut report = DispatchReport::new();
        if event.is_empty() {
            debug!(%event, "Ignoring event without ids");
            return report;
        }

        for indexer in &self.indexers {
            let code = indexer.code();
            if !indexer.matcher().matches_event(event) {
                report.unmatched += 1;
                continue;
            }

            let state = match self.processes.load(code) {
                Ok(state) => state,
                Err(e) => {
                    warn!(indexer = code, error = %e, "Failed to load process row");
                    report.failed.push(code.to_string());
                    continue;
                }
            };

            match state.mode {
                IndexerMode::RealTime => match indexer.process_event(event) {
                    Ok(result) => {
                        report.result.merge(&result);
                        report.applied += 1;
                    }
                    Err(e) => {
                        warn!(
                            indexer = code,
                            %event,
                            error = %e,
                            "Event processing failed, flagging for full reindex"
                        );
                        report.failed.push(code.to_string());
                        if let Err(me) = self.processes.mark_require_reindex(code) {
                            warn!(indexer = code, error = %me, "Failed to flag process");
                        }
                    }
                },
                IndexerMode::Manual => {
                    match self.queue_event(indexer.as_ref(), event) {
                        Ok(()) => report.queued += 1,
                        Err(e) => {
                            warn!(indexer = code, %event, error = %e, "Failed to queue event");
                            report.failed.push(code.to_string());
                        }
                    }
                }
            }
        }
        report
    }

    fn queue_event(
        &self,
        indexer: &dyn Indexer,
        event: &IndexEvent,
    ) -> Result<(), IndexingError> {
        let code = indexer.code();
        let ids = indexer.register(event);
        if ids.is_empty() {
            debug!(indexer = code, %event, "Event registered no work");
            return Ok(());
        }
        self.backlog.enqueue(code, event.entity, event.action, &ids)?;
        self.processes.mark_pending(code)?;
        Ok(())
    }

    /// Apply one indexer's queued backlog against its primary table.
    ///
    /// Rows are replayed oldest-first; a row whose application fails is
    /// left queued for the next drain. Refuses to run for a process that
    /// needs a full rebuild.
    pub fn drain(&self, code: &str) -> Result<UpdateResult, IndexingError> {
        let indexer = self.indexer_by_code(code)?;
        let state = self.processes.load(code)?;
        if state.status.needs_full_reindex() {
            return Err(IndexingError::RequiresFullReindex(code.to_string()));
        }
        if !self.processes.try_begin_run(code)? {
            return Err(IndexingError::ReindexInProgress(code.to_string()));
        }

        match self.drain_queued(indexer) {
            Ok(result) => {
                let remaining = self.backlog.count(code)?;
                let status = if remaining > 0 {
                    ProcessStatus::Pending
                } else {
                    ProcessStatus::Ready
                };
                self.processes.finish_run(code, status, true)?;
                info!(
                    indexer = code,
                    rows = result.rows_written,
                    errors = result.errors,
                    remaining,
                    "Backlog drained"
                );
                Ok(result)
            }
            Err(e) => {
                if let Err(fe) =
                    self.processes
                        .finish_run(code, ProcessStatus::RequireReindex, false)
                {
                    warn!(indexer = code, error = %fe, "Failed to record drain failure");
                }
                Err(e)
            }
        }
    }

    fn drain_queued(&self, indexer: &dyn Indexer) -> Result<UpdateResult, IndexingError> {
        let code = indexer.code();
        let mut result = UpdateResult::new();
        // Cursor walks past failed rows so they stay queued without
        // stalling the batch loop.
        let mut cursor = 0i64;
        loop {
            let rows = self.backlog.peek_batch(code, cursor, self.drain_batch_size)?;
            if rows.is_empty() {
                break;
            }
            let mut applied = Vec::with_capacity(rows.len());
            for row in &rows {
                cursor = row.backlog_id;
                match indexer.process_event(&row.to_event()) {
                    Ok(one) => {
                        result.merge(&one);
                        applied.push(row.backlog_id);
                    }
                    Err(e) => {
                        warn!(
                            indexer = code,
                            backlog_id = row.backlog_id,
                            error = %e,
                            "Backlog entry failed, leaving it queued"
                        );
                        result.record_error();
                    }
                }
            }
            self.backlog.remove(&applied)?;
        }
        Ok(result)
    }

    /// Drain every indexer that has queued work.
    pub fn drain_all(&self) -> RunReport {
        let mut report = RunReport::new();
        for indexer in &self.indexers {
            let code = indexer.code();
            match self.backlog.count(code) {
                Ok(0) => continue,
                Ok(_) => {}
                Err(e) => {
                    warn!(indexer = code, error = %e, "Failed to inspect backlog");
                    report.failed.push(code.to_string());
                    continue;
                }
            }
            match self.drain(code) {
                Ok(_) => report.succeeded += 1,
                Err(e) => {
                    warn!(indexer = code, error = %e, "Drain failed");
                    report.failed.push(code.to_string());
                }
            }
        }
        report
    }

    /// Rebuild one indexer's table from scratch.
    ///
    /// On success the backlog is dropped (the rebuild subsumes every
    /// queued change) and the process returns to `ready`. On failure the
    /// process is flagged `require_reindex` and the backlog kept.
    pub fn reindex_all(&self, code: &str) -> Result<RebuildProgress, IndexingError> {
        let indexer = self.indexer_by_code(code)?;
        if !self.processes.try_begin_run(code)? {
            return Err(IndexingError::ReindexInProgress(code.to_string()));
        }
        info!(indexer = code, "Full reindex started");

        match indexer.reindex_all() {
            Ok(progress) => {
                if let Err(e) = self.backlog.clear(code) {
                    warn!(indexer = code, error = %e, "Failed to clear subsumed backlog");
                }
                self.processes.finish_run(code, ProcessStatus::Ready, true)?;
                info!(
                    indexer = code,
                    rows = progress.rows_swapped,
                    "Full reindex finished"
                );
                Ok(progress)
            }
            Err(e) => {
                warn!(indexer = code, error = %e, "Full reindex failed");
                if let Err(fe) =
                    self.processes
                        .finish_run(code, ProcessStatus::RequireReindex, false)
                {
                    warn!(indexer = code, error = %fe, "Failed to record reindex failure");
                }
                Err(e)
            }
        }
    }

    /// Rebuild every registered indexer, continuing past failures.
    pub fn reindex_everything(&self) -> RunReport {
        let mut report = RunReport::new();
        for indexer in &self.indexers {
            let code = indexer.code();
            match self.reindex_all(code) {
                Ok(_) => report.succeeded += 1,
                Err(e) => {
                    warn!(indexer = code, error = %e, "Skipping failed indexer");
                    report.failed.push(code.to_string());
                }
            }
        }
        report
    }

    /// Recompute rows for specific entity ids on every indexer that
    /// cares about the entity.
    ///
    /// Each indexer interprets the ids against its own keying and uses
    /// its bulk path where it has one. Failing indexers are logged and
    /// passed over; process rows are not touched.
    pub fn reindex_entity(&self, entity: Entity, ids: &[i64]) -> UpdateResult {
        let mut result = UpdateResult::new();
        if ids.is_empty() {
            return result;
        }
        for indexer in &self.indexers {
            if !indexer.matcher().handles_entity(entity) {
                continue;
            }
            match indexer.reindex_ids(ids) {
                Ok(one) => result.merge(&one),
                Err(e) => {
                    warn!(
                        indexer = indexer.code(),
                        entity = %entity,
                        error = %e,
                        "Entity reindex failed"
                    );
                    result.record_error();
                }
            }
        }
        result
    }

    /// Switch an indexer between real-time and manual application.
    ///
    /// Backlog rows queued under the old mode stay queued until drained.
    pub fn set_mode(&self, code: &str, mode: IndexerMode) -> Result<(), IndexingError> {
        self.indexer_by_code(code)?;
        self.processes.set_mode(code, mode)?;
        info!(indexer = code, mode = %mode, "Mode changed");
        Ok(())
    }

    /// Flag an indexer's table as stale until the next full reindex.
    pub fn invalidate(&self, code: &str) -> Result<(), IndexingError> {
        self.indexer_by_code(code)?;
        self.processes.mark_require_reindex(code)?;
        info!(indexer = code, "Process invalidated");
        Ok(())
    }

    /// Status listing for every registered indexer, in registration order.
    pub fn overview(&self) -> Result<Vec<ProcessOverview>, IndexingError> {
        let mut rows = Vec::with_capacity(self.indexers.len());
        for indexer in &self.indexers {
            let code = indexer.code();
            rows.push(ProcessOverview {
                name: indexer.name(),
                visible: indexer.is_visible(),
                state: self.processes.load(code)?,
                backlog: self.backlog.count(code)?,
            });
        }
        Ok(rows)
    }

    fn indexer_by_code(&self, code: &str) -> Result<&dyn Indexer, IndexingError> {
        self.indexers
            .iter()
            .find(|i| i.code() == code)
            .map(|i| i.as_ref())
            .ok_or_else(|| IndexingError::UnknownIndexer(code.to_string()))
    }
}
