//! Migration change-log system for DbCtl
//!
//! This module turns migration scripts into verified change-log entries:
//! - Filename grammar parsing (`F-1.0.2-Initialise_database.ddl`)
//! - Content hashing and drift validation
//! - Immutable `ChangeLogEntry` values with injected identity and clock
//! - The `DbConnector` contract storage backends implement
//!
//! # Example
//!
//! ```rust,no_run
//! use dbctl::migration::{discover_scripts, ChangeLogEntry, EntryContext};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), dbctl::migration::MigrationError> {
//! let context = EntryContext::system();
//! let entry = ChangeLogEntry::from_file("migrations/f-1.0.2-Initialise_database.ddl", &context)?;
//! assert_eq!(entry.description(), "Initialise database");
//!
//! for entry in discover_scripts(Path::new("migrations"), &context)? {
//!     println!("{entry}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod checksum;
pub mod connector;
pub mod error;
pub mod file;
#[cfg(any(test, feature = "mock"))]
pub mod memory;
pub mod provenance;
pub mod record;

pub use checksum::{hash_bytes, hash_file, hash_reader, validate_checksum, HashAlgorithm};
pub use connector::{
    run_cancellable, BackendError, ConnectorError, DbConnector, DbConnectorMetadata,
};
pub use error::MigrationError;
pub use file::{discover_scripts, parse_filename, ParsedFilename};
#[cfg(any(test, feature = "mock"))]
pub use memory::{MemoryBackendError, MemoryConnector};
pub use provenance::{
    Clock, EntryContext, FixedClock, FixedIdentity, IdentitySource, SystemClock, SystemIdentity,
};
pub use record::{ChangeLogEntry, MigrationType};

// Re-export for connector implementations
pub use tokio_util::sync::CancellationToken;
