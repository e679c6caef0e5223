//! Storage layer for the catalog index subsystem.
//!
//! Provides SQLite-backed persistence with:
//! - Idempotent schema setup for source and index tables
//! - Process rows with guarded status transitions
//! - A durable backlog for manual-mode indexers
//! - Typed writers for the catalog source tables
//! - Attribute metadata resolution for aggregation queries

pub mod backlog;
pub mod catalog;
pub mod db;
pub mod eav;
pub mod error;
pub mod process;
pub mod schema;

pub use backlog::{BacklogRow, BacklogStore};
pub use catalog::{
    BundleOptionRow, CatalogStore, ProductRow, ProductType, StockItemRow, DEFAULT_STOCK_ID,
    DEFAULT_WEBSITE_ID,
};
pub use db::Db;
pub use eav::{AttributeRef, EavStore, GLOBAL_STORE_ID, STATUS_ATTRIBUTE, STATUS_DISABLED, STATUS_ENABLED};
pub use error::StorageError;
pub use process::ProcessStore;
pub use schema::{IndexKey, TablePair, STOCK_STATUS, STOCK_STATUS_KEYS};
