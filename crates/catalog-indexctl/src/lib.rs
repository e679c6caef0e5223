//! Index control binary exports.
//!
//! This crate provides the operator CLI for the catalog indexing
//! subsystem.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (status, reindex, drain, ...)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
