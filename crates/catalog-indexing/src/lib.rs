//! Indexing engine for the catalog platform.
//!
//! This crate connects catalog change events to the derived tables the
//! storefront reads.
//!
//! ## Key Components
//!
//! - [`IndexEvent`](catalog_types::IndexEvent): One catalog change, routed by (entity, action)
//! - [`EventMatcher`]: The (entity, action) pairs an indexer subscribes to
//! - [`Indexer`]: Trait every derived-table maintainer implements
//! - [`Dispatcher`]: Fans events out and runs full and incremental rebuilds
//! - [`StockStatusIndexer`]: Product availability, with bundle rollup
//! - [`IndexingError`]: Error types for indexing operations
//!
//! ## Architecture
//!
//! Events flow through the dispatcher synchronously:
//! 1. Each registered indexer's matcher filters the event
//! 2. Real-time processes apply it against their primary table at once
//! 3. Manual processes persist it to a durable backlog for a later drain
//! 4. Full rebuilds write into a scratch twin and swap it in atomically
//! 5. Failures flag the process `require_reindex` instead of spreading
//!
//! ## Example
//!
//! ```ignore
//! use catalog_indexing::{Dispatcher, StockStatusIndexer};
//! use catalog_types::{Entity, IndexEvent, IndexerMode};
//!
//! let mut dispatcher = Dispatcher::new(db.clone());
//! dispatcher.register(
//!     Box::new(StockStatusIndexer::new(db, &settings.stock)),
//!     IndexerMode::RealTime,
//! )?;
//!
//! dispatcher.dispatch(&IndexEvent::save(Entity::Product, 42));
//! dispatcher.reindex_all("stock_status")?;
//! ```

pub mod dispatcher;
pub mod error;
pub mod indexer;
pub mod matcher;
pub mod rebuild;
pub mod stock;

pub use dispatcher::{DispatchReport, Dispatcher, ProcessOverview, RunReport};
pub use error::IndexingError;
pub use indexer::{Indexer, UpdateResult};
pub use matcher::EventMatcher;
pub use rebuild::{
    run_shadow_rebuild, swap_scratch_into_primary, KeysGuard, RebuildProgress,
};
pub use stock::StockStatusIndexer;
