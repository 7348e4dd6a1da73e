//! Migration-specific error types

use thiserror::Error;

/// Errors raised while parsing, hashing or building change-log entries
#[derive(Error, Debug)]
pub enum MigrationError {
    /// A required argument was empty or absent
    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    /// The filename does not follow `<type>-<version>-<description>.<ext>`
    #[error("Failed to parse {0}.")]
    InvalidFilename(String),

    /// Reading a script from disk or a stream failed
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The script content no longer matches the recorded hash
    #[error(
        "Change log entry '{filename}' has been modified after being applied.\n\
         Stored hash: {stored}\n\
         Current hash: {current}"
    )]
    ChecksumMismatch {
        filename: String,
        stored: String,
        current: String,
    },

    /// A stored hash is not lowercase hex of a known digest length
    #[error("Unrecognised hash format: '{0}'")]
    UnknownHashFormat(String),
}

impl MigrationError {
    /// Create an `InvalidFilename` error for `filename`
    pub fn invalid_filename(filename: impl Into<String>) -> Self {
        MigrationError::InvalidFilename(filename.into())
    }
}
