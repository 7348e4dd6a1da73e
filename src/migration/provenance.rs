//! Identity and clock providers used to stamp change-log entries

use crate::config::DbCtlConfig;
use crate::migration::HashAlgorithm;
use chrono::{DateTime, Utc};
use std::env;
use std::fmt;

/// Identity recorded when none is supplied by the process environment
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Source of the actor recorded as `applied_by`
pub trait IdentitySource: Send + Sync {
    fn current_identity(&self) -> String;
}

/// Source of the timestamp recorded as `change_date_time`
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The user running the current process (`USER`, then `USERNAME`)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemIdentity;

impl IdentitySource for SystemIdentity {
    fn current_identity(&self) -> String {
        ["USER", "USERNAME"]
            .into_iter()
            .filter_map(|key| env::var(key).ok())
            .find(|name| !name.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string())
    }
}

/// A fixed, caller-supplied identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedIdentity(String);

impl FixedIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl IdentitySource for FixedIdentity {
    fn current_identity(&self) -> String {
        self.0.clone()
    }
}

/// Wall-clock time in UTC
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Providers used by [`ChangeLogEntry::from_file`](crate::migration::ChangeLogEntry::from_file)
///
/// Bundles who is applying the change, when, and which digest fingerprints
/// the script content.
pub struct EntryContext {
    identity: Box<dyn IdentitySource>,
    clock: Box<dyn Clock>,
    algorithm: HashAlgorithm,
}

impl EntryContext {
    pub fn new(identity: impl IdentitySource + 'static, clock: impl Clock + 'static) -> Self {
        Self {
            identity: Box::new(identity),
            clock: Box::new(clock),
            algorithm: HashAlgorithm::default(),
        }
    }

    /// The process user and the system clock, hashing with the default algorithm
    pub fn system() -> Self {
        Self::new(SystemIdentity, SystemClock)
    }

    /// Build providers from configuration
    ///
    /// A configured `applied_by` replaces the process user.
    pub fn from_config(config: &DbCtlConfig) -> Self {
        let context = match config.applied_by.as_deref().filter(|name| !name.is_empty()) {
            Some(name) => Self::new(FixedIdentity::new(name), SystemClock),
            None => Self::system(),
        };
        context.with_algorithm(config.hash_algorithm)
    }

    #[must_use]
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn identity(&self) -> String {
        self.identity.current_identity()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}

impl Default for EntryContext {
    fn default() -> Self {
        Self::system()
    }
}

impl fmt::Debug for EntryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryContext")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}
