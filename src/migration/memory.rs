//! In-process connector for tests and dry runs
//!
//! Keeps the change log in memory instead of a database. Each connection string
//! addresses its own store, scripts are recorded rather than executed, and the
//! affected-row count is the number of non-empty `;`-separated statements.

use crate::migration::connector::{run_cancellable, ConnectorError, DbConnector, DbConnectorMetadata, Result};
use crate::migration::ChangeLogEntry;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Failures reported by [`MemoryConnector`], surfaced as `ConnectorError::Backend`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryBackendError {
    #[error("Connection string is empty")]
    EmptyConnectionString,
    #[error("Change log table does not exist for '{0}'")]
    MissingTable(String),
    #[error("Duplicate change log entry: {0}")]
    DuplicateEntry(String),
}

#[derive(Debug, Default)]
struct Database {
    change_log: Option<Vec<ChangeLogEntry>>,
    scripts: Vec<String>,
}

/// A [`DbConnector`] backed by in-process maps
#[derive(Debug, Default)]
pub struct MemoryConnector {
    databases: Mutex<HashMap<String, Database>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts executed against `connection_string`, in order
    pub fn executed_scripts(&self, connection_string: &str) -> Vec<String> {
        self.lock()
            .get(connection_string)
            .map(|db| db.scripts.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Database>> {
        self.databases.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the store for `connection_string`, creating it on first use
    fn with_database<T>(
        &self,
        connection_string: &str,
        f: impl FnOnce(&mut Database) -> std::result::Result<T, MemoryBackendError>,
    ) -> Result<T> {
        check_connection_string(connection_string)?;
        let mut databases = self.lock();
        let db = databases.entry(connection_string.to_string()).or_default();
        f(db).map_err(ConnectorError::backend)
    }

    /// Run `f` against the change log of an existing store; never creates one
    fn with_change_log<T>(
        &self,
        connection_string: &str,
        f: impl FnOnce(&mut Vec<ChangeLogEntry>) -> std::result::Result<T, MemoryBackendError>,
    ) -> Result<T> {
        check_connection_string(connection_string)?;
        let mut databases = self.lock();
        let change_log = databases
            .get_mut(connection_string)
            .and_then(|db| db.change_log.as_mut())
            .ok_or_else(|| MemoryBackendError::MissingTable(connection_string.to_string()))
            .map_err(ConnectorError::backend)?;
        f(change_log).map_err(ConnectorError::backend)
    }
}

fn check_connection_string(connection_string: &str) -> Result<()> {
    if connection_string.is_empty() {
        return Err(ConnectorError::backend(MemoryBackendError::EmptyConnectionString));
    }
    Ok(())
}

fn count_statements(script: &str) -> u64 {
    script
        .split(';')
        .filter(|statement| !statement.trim().is_empty())
        .count() as u64
}

#[async_trait]
impl DbConnector for MemoryConnector {
    async fn create_change_log_table(
        &self,
        connection_string: &str,
        cancel: CancellationToken,
    ) -> Result<u64> {
        run_cancellable(&cancel, async {
            self.with_database(connection_string, |db| {
                db.change_log.get_or_insert_with(Vec::new);
                Ok(0)
            })
        })
        .await
    }

    async fn add_change_log_entry(
        &self,
        connection_string: &str,
        entry: &ChangeLogEntry,
        cancel: CancellationToken,
    ) -> Result<u64> {
        run_cancellable(&cancel, async {
            self.with_change_log(connection_string, |change_log| {
                if change_log.iter().any(|e| e.filename() == entry.filename()) {
                    return Err(MemoryBackendError::DuplicateEntry(entry.filename().to_string()));
                }
                change_log.push(entry.clone());
                log::debug!("Recorded change log entry {}", entry.filename());
                Ok(1)
            })
        })
        .await
    }

    async fn execute_script(
        &self,
        connection_string: &str,
        script: &str,
        cancel: CancellationToken,
    ) -> Result<u64> {
        run_cancellable(&cancel, async {
            self.with_database(connection_string, |db| {
                db.scripts.push(script.to_string());
                Ok(count_statements(script))
            })
        })
        .await
    }

    async fn fetch_change_log_entries(
        &self,
        connection_string: &str,
        cancel: CancellationToken,
    ) -> Result<Vec<ChangeLogEntry>> {
        run_cancellable(&cancel, async {
            self.with_change_log(connection_string, |change_log| Ok(change_log.clone()))
        })
        .await
    }
}

impl DbConnectorMetadata for MemoryConnector {
    fn name(&self) -> &str {
        "memory"
    }

    fn description(&self) -> &str {
        "In-process change log store"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }
}
