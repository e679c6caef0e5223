//! # catalog-types
//!
//! Shared domain types for the catalog index subsystem.
//!
//! This crate defines the data structures used throughout the workspace:
//! - Events: immutable descriptions of domain mutations
//! - Process state: per-indexer mode and run status
//! - Settings: layered configuration
//! - Errors: cross-cutting error type
//!
//! ## Usage
//!
//! ```rust
//! use catalog_types::{Entity, IndexEvent};
//!
//! let event = IndexEvent::save(Entity::Product, 42);
//! assert_eq!(event.ids, vec![42]);
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod process;

pub use config::{Settings, StockSettings};
pub use error::CatalogError;
pub use event::{Entity, EventAction, IndexEvent};
pub use process::{IndexerMode, ProcessState, ProcessStatus};
