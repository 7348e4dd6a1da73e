//! # DbCtl
//!
//! Parsing and integrity layer for file-based database migrations.
//!
//! Migration scripts are named `<type>-<version>-<description>.<ext>`, for example
//! `F-1.0.2-Initialise_database.ddl`. This crate turns such a file into an immutable
//! [`ChangeLogEntry`](migration::ChangeLogEntry) carrying a content hash and who applied
//! it when, and defines the [`DbConnector`](migration::DbConnector) contract storage
//! backends implement to persist and replay those entries.

pub mod config;
pub mod migration;

pub use config::DbCtlConfig;
pub use migration::{ChangeLogEntry, MigrationError, MigrationType};
