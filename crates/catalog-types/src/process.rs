//! Per-indexer process state: indexing mode and run status.
//!
//! Every registered indexer owns one process row that records how its
//! events are applied (inline or queued) and whether its derived table
//! can currently be trusted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// When a matched event is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexerMode {
    /// Apply matched events inline, on the dispatching thread.
    #[default]
    RealTime,
    /// Queue matched events as backlog rows for a later drain.
    Manual,
}

impl IndexerMode {
    /// Stable code used in the process table and log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexerMode::RealTime => "real_time",
            IndexerMode::Manual => "manual",
        }
    }
}

impl std::fmt::Display for IndexerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for IndexerMode {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "real_time" => Ok(IndexerMode::RealTime),
            "manual" => Ok(IndexerMode::Manual),
            other => Err(CatalogError::InvalidInput(format!(
                "unknown indexer mode: {}",
                other
            ))),
        }
    }
}

/// Run status of an indexer's process row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// The derived table matches the source data as far as we know.
    #[default]
    Ready,
    /// A rebuild is in flight right now.
    Running,
    /// The derived table is stale in a way incremental work cannot fix.
    /// Only a full rebuild clears this.
    RequireReindex,
    /// Backlog rows are queued and waiting for a drain.
    Pending,
}

impl ProcessStatus {
    /// Stable code used in the process table and log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Ready => "ready",
            ProcessStatus::Running => "running",
            ProcessStatus::RequireReindex => "require_reindex",
            ProcessStatus::Pending => "pending",
        }
    }

    /// Whether a drain has queued work to pick up.
    pub fn has_pending_work(&self) -> bool {
        matches!(self, ProcessStatus::Pending)
    }

    /// Whether the derived table can only be trusted again after a full
    /// rebuild.
    pub fn needs_full_reindex(&self) -> bool {
        matches!(self, ProcessStatus::RequireReindex)
    }
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProcessStatus {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ready" => Ok(ProcessStatus::Ready),
            "running" => Ok(ProcessStatus::Running),
            "require_reindex" => Ok(ProcessStatus::RequireReindex),
            "pending" => Ok(ProcessStatus::Pending),
            other => Err(CatalogError::InvalidInput(format!(
                "unknown process status: {}",
                other
            ))),
        }
    }
}

/// Persistent state of one indexer's process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessState {
    /// Code of the indexer this row belongs to.
    pub indexer_code: String,
    /// How matched events are applied.
    pub mode: IndexerMode,
    /// Current run status.
    pub status: ProcessStatus,
    /// When this indexer last completed a full rebuild or a drain.
    pub last_run_at: Option<DateTime<Utc>>,
}

impl ProcessState {
    /// Fresh process row for a newly registered indexer.
    pub fn new(indexer_code: impl Into<String>, mode: IndexerMode) -> Self {
        Self {
            indexer_code: indexer_code.into(),
            mode,
            status: ProcessStatus::Ready,
            last_run_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn mode_codes_round_trip() {
        for mode in [IndexerMode::RealTime, IndexerMode::Manual] {
            assert_eq!(IndexerMode::from_str(mode.as_str()).unwrap(), mode);
        }
    }

    #[test]
    fn status_codes_round_trip() {
        for status in [
            ProcessStatus::Ready,
            ProcessStatus::Running,
            ProcessStatus::RequireReindex,
            ProcessStatus::Pending,
        ] {
            assert_eq!(ProcessStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(IndexerMode::from_str("cron").is_err());
    }

    #[test]
    fn default_mode_is_real_time() {
        assert_eq!(IndexerMode::default(), IndexerMode::RealTime);
    }

    #[test]
    fn only_pending_has_pending_work() {
        assert!(ProcessStatus::Pending.has_pending_work());
        assert!(!ProcessStatus::Ready.has_pending_work());
        assert!(!ProcessStatus::Running.has_pending_work());
        assert!(!ProcessStatus::RequireReindex.has_pending_work());
    }

    #[test]
    fn only_require_reindex_needs_full_reindex() {
        assert!(ProcessStatus::RequireReindex.needs_full_reindex());
        assert!(!ProcessStatus::Pending.needs_full_reindex());
    }

    #[test]
    fn new_process_starts_ready() {
        let state = ProcessState::new("stock_status", IndexerMode::Manual);
        assert_eq!(state.status, ProcessStatus::Ready);
        assert_eq!(state.mode, IndexerMode::Manual);
        assert!(state.last_run_at.is_none());
    }
}
