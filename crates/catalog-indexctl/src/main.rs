//! Catalog Index Control
//!
//! Operator CLI for the catalog indexing subsystem.
//!
//! # Usage
//!
//! ```bash
//! catalog-indexctl status [--all]
//! catalog-indexctl reindex stock_status
//! catalog-indexctl reindex --all
//! catalog-indexctl drain --all
//! catalog-indexctl set-mode manual stock_status
//! catalog-indexctl invalidate stock_status
//! catalog-indexctl dispatch --entity catalog_product --action save 42
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/catalog-index/config.toml)
//! 3. Environment variables (CATALOG_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use catalog_indexctl::{commands, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = commands::init(
        cli.config.as_deref(),
        cli.db_path.as_deref(),
        cli.log_level.as_deref(),
    )?;
    let dispatcher = commands::open_engine(&settings)?;

    match cli.command {
        Commands::Status { all } => commands::show_status(&dispatcher, all),
        Commands::Reindex { codes, all } => commands::reindex(&dispatcher, &codes, all),
        Commands::Drain { codes, all } => commands::drain(&dispatcher, &codes, all),
        Commands::SetMode { mode, codes } => commands::set_mode(&dispatcher, mode, &codes),
        Commands::Invalidate { codes } => commands::invalidate(&dispatcher, &codes),
        Commands::Dispatch {
            entity,
            action,
            ids,
        } => commands::dispatch_event(&dispatcher, entity, action, ids),
    }
}
