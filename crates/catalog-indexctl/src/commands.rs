//! Command implementations for the index control tool.

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use catalog_indexing::{Dispatcher, StockStatusIndexer};
use catalog_storage::Db;
use catalog_types::{Entity, EventAction, IndexEvent, IndexerMode, Settings};

/// Load configuration, apply CLI overrides, and initialize logging.
pub fn init(
    config_path: Option<&str>,
    db_path_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(db_path) = db_path_override {
        settings.db_path = db_path.to_string();
    }
    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    Ok(settings)
}

/// Open the database and wire up every known indexer.
pub fn open_engine(settings: &Settings) -> Result<Dispatcher> {
    let db_path = settings.expanded_db_path();
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    info!("Opening database at {:?}", db_path);
    let db = Arc::new(Db::open(&db_path).context("Failed to open database")?);

    let mut dispatcher =
        Dispatcher::new(Arc::clone(&db)).with_drain_batch_size(settings.drain_batch_size);
    dispatcher.register(
        Box::new(StockStatusIndexer::new(db, &settings.stock)),
        IndexerMode::RealTime,
    )?;
    Ok(dispatcher)
}

/// Print the status listing.
pub fn show_status(dispatcher: &Dispatcher, all: bool) -> Result<()> {
    let rows = dispatcher.overview()?;
    println!(
        "{:<14} {:<22} {:<10} {:<16} {:>8}  {}",
        "CODE", "NAME", "MODE", "STATUS", "BACKLOG", "LAST RUN"
    );
    for row in rows {
        if !row.visible && !all {
            continue;
        }
        let last_run = row
            .state
            .last_run_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{:<14} {:<22} {:<10} {:<16} {:>8}  {}",
            row.state.indexer_code, row.name, row.state.mode, row.state.status, row.backlog,
            last_run
        );
    }
    Ok(())
}

/// Run full rebuilds.
pub fn reindex(dispatcher: &Dispatcher, codes: &[String], all: bool) -> Result<()> {
    if all {
        let report = dispatcher.reindex_everything();
        println!("Rebuilt {} indexer(s)", report.succeeded);
        if !report.is_clean() {
            anyhow::bail!("Failed indexers: {}", report.failed.join(", "));
        }
        return Ok(());
    }
    for code in codes {
        let progress = dispatcher
            .reindex_all(code)
            .with_context(|| format!("Full reindex failed for {}", code))?;
        println!("{}: rebuilt {} row(s)", code, progress.rows_swapped);
    }
    Ok(())
}

/// Apply queued backlog rows.
pub fn drain(dispatcher: &Dispatcher, codes: &[String], all: bool) -> Result<()> {
    if all {
        let report = dispatcher.drain_all();
        println!("Drained {} indexer(s)", report.succeeded);
        if !report.is_clean() {
            anyhow::bail!("Failed indexers: {}", report.failed.join(", "));
        }
        return Ok(());
    }
    for code in codes {
        let result = dispatcher
            .drain(code)
            .with_context(|| format!("Drain failed for {}", code))?;
        println!(
            "{}: applied {} row(s), {} error(s)",
            code, result.rows_written, result.errors
        );
    }
    Ok(())
}

/// Switch application mode.
pub fn set_mode(dispatcher: &Dispatcher, mode: IndexerMode, codes: &[String]) -> Result<()> {
    for code in codes {
        dispatcher
            .set_mode(code, mode)
            .with_context(|| format!("Failed to change mode for {}", code))?;
        println!("{}: mode set to {}", code, mode);
    }
    Ok(())
}

/// Flag indexers for a full rebuild.
pub fn invalidate(dispatcher: &Dispatcher, codes: &[String]) -> Result<()> {
    for code in codes {
        dispatcher
            .invalidate(code)
            .with_context(|| format!("Failed to invalidate {}", code))?;
        println!("{}: flagged for full reindex", code);
    }
    Ok(())
}

/// Build an event from the arguments and dispatch it.
pub fn dispatch_event(
    dispatcher: &Dispatcher,
    entity: Entity,
    action: EventAction,
    ids: Vec<i64>,
) -> Result<()> {
    let event = IndexEvent {
        entity,
        action,
        ids,
    };
    let report = dispatcher.dispatch(&event);
    println!(
        "Applied {}, queued {}, unmatched {}",
        report.applied, report.queued, report.unmatched
    );
    if !report.is_clean() {
        anyhow::bail!("Failed indexers: {}", report.failed.join(", "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_types::StockSettings;

    fn settings_in(dir: &tempfile::TempDir) -> Settings {
        Settings {
            db_path: dir
                .path()
                .join("catalog.db")
                .to_string_lossy()
                .into_owned(),
            log_level: "info".to_string(),
            drain_batch_size: 50,
            stock: StockSettings::default(),
        }
    }

    #[test]
    fn open_engine_registers_the_stock_indexer() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = open_engine(&settings_in(&dir)).unwrap();

        let rows = dispatcher.overview().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].state.indexer_code, "stock_status");
    }

    #[test]
    fn status_listing_runs_on_a_fresh_database() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = open_engine(&settings_in(&dir)).unwrap();

        show_status(&dispatcher, true).unwrap();
    }
}
