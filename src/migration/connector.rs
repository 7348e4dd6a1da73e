//! Storage-backend contracts for persisting and replaying change-log entries
//!
//! A connector owns everything database-specific: connecting, the change-log table
//! layout, SQL execution. This crate only depends on the shape below.
//!
//! - [`DbConnector`]: create the change-log table, append entries, run scripts, fetch history
//! - [`DbConnectorMetadata`]: name, target database family and version used to pick a connector
//!
//! Every operation takes a [`CancellationToken`]. Backends are expected to stop promptly
//! once it fires and leave each call either fully applied or without effect.

use crate::migration::{ChangeLogEntry, MigrationError};
use async_trait::async_trait;
use std::future::Future;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Boxed backend error, kept intact so callers can downcast it
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced through the connector boundary
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// The operation observed its cancellation token
    #[error("Connector operation cancelled")]
    Cancelled,

    /// Connectivity, permission, SQL or constraint failure reported by the backend
    #[error(transparent)]
    Backend(BackendError),

    /// A stored row could not be turned back into a change-log entry
    #[error("Invalid change log entry: {0}")]
    Entry(#[from] MigrationError),
}

impl ConnectorError {
    /// Wrap a backend error without altering it
    pub fn backend(error: impl Into<BackendError>) -> Self {
        ConnectorError::Backend(error.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConnectorError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, ConnectorError>;

/// Primary connector interface
///
/// `connection_string` is passed through untouched; its format belongs to the backend.
/// Row counts follow the backend's notion of "affected rows".
#[async_trait]
pub trait DbConnector: Send + Sync {
    /// Create the change-log table in the managed database.
    ///
    /// Intended to be idempotent. Fails when the backend is unreachable or the
    /// credentials lack permission.
    async fn create_change_log_table(
        &self,
        connection_string: &str,
        cancel: CancellationToken,
    ) -> Result<u64>;

    /// Append one entry to the change-log table.
    ///
    /// Duplicate-key conflicts are reported by the backend as-is.
    async fn add_change_log_entry(
        &self,
        connection_string: &str,
        entry: &ChangeLogEntry,
        cancel: CancellationToken,
    ) -> Result<u64>;

    /// Execute a migration script against the managed database.
    async fn execute_script(
        &self,
        connection_string: &str,
        script: &str,
        cancel: CancellationToken,
    ) -> Result<u64>;

    /// Fetch every entry applied to the managed database, in backend order.
    async fn fetch_change_log_entries(
        &self,
        connection_string: &str,
        cancel: CancellationToken,
    ) -> Result<Vec<ChangeLogEntry>>;
}

/// Describes a connector so a host application can choose between several
pub trait DbConnectorMetadata {
    /// Official name of the connector
    fn name(&self) -> &str;

    /// The database family this connector targets
    fn description(&self) -> &str;

    /// Version of the connector itself
    fn version(&self) -> &str;
}

/// Drive `operation` until it completes or `cancel` fires
///
/// An already-cancelled token short-circuits without polling `operation`. On
/// cancellation the in-flight future is dropped.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
pub async fn run_cancellable<T, F>(cancel: &CancellationToken, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(ConnectorError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            log::debug!("Connector operation cancelled");
            Err(ConnectorError::Cancelled)
        }
        result = operation => result,
    }
}
