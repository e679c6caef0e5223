//! CLI argument parsing for the index control tool.

use clap::{Parser, Subcommand};

use catalog_types::{Entity, EventAction, IndexerMode};

/// Catalog Index Control
///
/// Operator tool for the catalog indexing subsystem: inspect process
/// state, run full rebuilds, drain queued changes, and switch indexers
/// between real-time and manual application.
#[derive(Parser, Debug)]
#[command(name = "catalog-indexctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/catalog-index/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Override database path
    #[arg(long, global = true)]
    pub db_path: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Index control commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show every indexer with its mode, status and backlog
    Status {
        /// Include indexers hidden from regular listings
        #[arg(long)]
        all: bool,
    },

    /// Run a full rebuild for the given indexers
    Reindex {
        /// Indexer codes to rebuild
        #[arg(required_unless_present = "all")]
        codes: Vec<String>,

        /// Rebuild every registered indexer
        #[arg(long, conflicts_with = "codes")]
        all: bool,
    },

    /// Apply queued backlog rows for the given indexers
    Drain {
        /// Indexer codes to drain
        #[arg(required_unless_present = "all")]
        codes: Vec<String>,

        /// Drain every indexer that has queued work
        #[arg(long, conflicts_with = "codes")]
        all: bool,
    },

    /// Switch indexers between real_time and manual application
    SetMode {
        /// Target mode (real_time or manual)
        mode: IndexerMode,

        /// Indexer codes to switch
        #[arg(required = true)]
        codes: Vec<String>,
    },

    /// Flag indexers as stale until their next full rebuild
    Invalidate {
        /// Indexer codes to invalidate
        #[arg(required = true)]
        codes: Vec<String>,
    },

    /// Inject a change event and dispatch it to the indexers
    Dispatch {
        /// Entity the event is about (catalog_product, stock_item, catalog_category)
        #[arg(long)]
        entity: Entity,

        /// What happened (save, delete, mass_action)
        #[arg(long, default_value = "save")]
        action: EventAction,

        /// Entity ids the event carries
        #[arg(required = true)]
        ids: Vec<i64>,
    },
}
