//! `ChangeLogEntry` - an immutable record of one applied migration script

use crate::migration::checksum::{hash_file, hash_reader, validate_checksum};
use crate::migration::file::{parse_filename, ParsedFilename};
use crate::migration::{EntryContext, HashAlgorithm, MigrationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Direction of a schema change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MigrationType {
    #[serde(rename = "F", alias = "f")]
    Forward,
    #[serde(rename = "B", alias = "b")]
    Backward,
}

impl MigrationType {
    /// Single-letter code stored in the change log
    pub fn as_str(self) -> &'static str {
        match self {
            MigrationType::Forward => "F",
            MigrationType::Backward => "B",
        }
    }
}

impl fmt::Display for MigrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MigrationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "F" | "f" => Ok(MigrationType::Forward),
            "B" | "b" => Ok(MigrationType::Backward),
            other => Err(format!("Unknown migration type: {other}")),
        }
    }
}

/// One applied migration script
///
/// Combines the parsed filename, a fingerprint of the script content and who applied
/// it when. Entries are snapshots: fields are only readable, and two entries are
/// equal exactly when all seven fields are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "StoredEntry")]
pub struct ChangeLogEntry {
    filename: String,
    migration_type: MigrationType,
    version: String,
    description: String,
    hash: String,
    applied_by: String,
    change_date_time: DateTime<Utc>,
}

impl ChangeLogEntry {
    /// Build an entry for the script at `path`
    ///
    /// The grammar applies to the final path component, which is also what the entry
    /// records as its filename. Identity, timestamp and digest come from `context`.
    ///
    /// # Errors
    ///
    /// - `MissingArgument` if `path` is empty, before any I/O
    /// - `InvalidFilename` if the file name does not match the grammar
    /// - `Io` if the file cannot be opened or read
    pub fn from_file(path: impl AsRef<Path>, context: &EntryContext) -> Result<Self, MigrationError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(MigrationError::MissingArgument("filename"));
        }

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| MigrationError::invalid_filename(path.display().to_string()))?;
        let parsed = parse_filename(&filename)?;
        let applied_by = context.identity();
        require("applied_by", &applied_by)?;

        let hash = hash_file(context.algorithm(), path)?;
        log::debug!("Hashed {} with {}: {}", path.display(), context.algorithm(), hash);

        Ok(Self::build(filename, parsed, hash, applied_by, context.now()))
    }

    /// Build an entry from explicit provenance and a content stream, hashed with the
    /// default algorithm
    ///
    /// `content` is not checked against any file called `filename`; supplying the
    /// matching content is the caller's responsibility.
    ///
    /// # Errors
    ///
    /// - `MissingArgument` if `filename` or `applied_by` is empty
    /// - `InvalidFilename` if `filename` does not match the grammar
    /// - `Io` if reading `content` fails
    pub fn from_content<R: Read>(
        filename: &str,
        applied_by: &str,
        change_date_time: DateTime<Utc>,
        content: R,
    ) -> Result<Self, MigrationError> {
        Self::from_content_with(
            HashAlgorithm::default(),
            filename,
            applied_by,
            change_date_time,
            content,
        )
    }

    /// Same as [`from_content`](Self::from_content) with an explicit digest
    pub fn from_content_with<R: Read>(
        algorithm: HashAlgorithm,
        filename: &str,
        applied_by: &str,
        change_date_time: DateTime<Utc>,
        content: R,
    ) -> Result<Self, MigrationError> {
        require("filename", filename)?;
        require("applied_by", applied_by)?;
        let parsed = parse_filename(filename)?;
        let hash = hash_reader(algorithm, content)?;

        Ok(Self::build(
            filename.to_string(),
            parsed,
            hash,
            applied_by.to_string(),
            change_date_time,
        ))
    }

    /// Rebuild an entry from persisted change-log columns
    ///
    /// Connectors use this when fetching history: the content is gone, only its
    /// recorded hash remains.
    ///
    /// # Errors
    ///
    /// - `MissingArgument` if `filename`, `applied_by` or `hash` is empty
    /// - `InvalidFilename` if `filename` does not match the grammar
    /// - `UnknownHashFormat` if `hash` is not a lowercase hex digest of a known length
    pub fn from_record(
        filename: &str,
        applied_by: &str,
        change_date_time: DateTime<Utc>,
        hash: &str,
    ) -> Result<Self, MigrationError> {
        require("filename", filename)?;
        require("applied_by", applied_by)?;
        require("hash", hash)?;
        let parsed = parse_filename(filename)?;
        if HashAlgorithm::detect(hash).is_none() {
            return Err(MigrationError::UnknownHashFormat(hash.to_string()));
        }

        Ok(Self::build(
            filename.to_string(),
            parsed,
            hash.to_string(),
            applied_by.to_string(),
            change_date_time,
        ))
    }

    fn build(
        filename: String,
        parsed: ParsedFilename,
        hash: String,
        applied_by: String,
        change_date_time: DateTime<Utc>,
    ) -> Self {
        Self {
            filename,
            migration_type: parsed.migration_type,
            version: parsed.version,
            description: parsed.description,
            hash,
            applied_by,
            change_date_time,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn migration_type(&self) -> MigrationType {
        self.migration_type
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Lowercase hex digest of the script content
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn applied_by(&self) -> &str {
        &self.applied_by
    }

    pub fn change_date_time(&self) -> DateTime<Utc> {
        self.change_date_time
    }

    /// The digest that produced [`hash`](Self::hash)
    pub fn hash_algorithm(&self) -> Option<HashAlgorithm> {
        HashAlgorithm::detect(&self.hash)
    }

    /// Check that `content` still hashes to the recorded value
    ///
    /// # Errors
    ///
    /// Returns `ChecksumMismatch` on drift, `UnknownHashFormat` if the recorded hash
    /// cannot be attributed to an algorithm, and `Io` if reading fails.
    pub fn verify_content<R: Read>(&self, content: R) -> Result<(), MigrationError> {
        let algorithm = self
            .hash_algorithm()
            .ok_or_else(|| MigrationError::UnknownHashFormat(self.hash.clone()))?;
        let current = hash_reader(algorithm, content)?;
        validate_checksum(&self.filename, &self.hash, &current)
    }

    /// Check the script at `path` against the recorded hash
    pub fn verify_file(&self, path: impl AsRef<Path>) -> Result<(), MigrationError> {
        let algorithm = self
            .hash_algorithm()
            .ok_or_else(|| MigrationError::UnknownHashFormat(self.hash.clone()))?;
        let current = hash_file(algorithm, path.as_ref())?;
        validate_checksum(&self.filename, &self.hash, &current)
    }
}

impl fmt::Display for ChangeLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ({}) applied by {} at {}",
            self.migration_type,
            self.version,
            self.description,
            self.hash,
            self.applied_by,
            self.change_date_time.to_rfc3339()
        )
    }
}

// Deserialized entries go through the same validation as stored records
#[derive(Deserialize)]
struct StoredEntry {
    filename: String,
    migration_type: MigrationType,
    version: String,
    description: String,
    hash: String,
    applied_by: String,
    change_date_time: DateTime<Utc>,
}

impl TryFrom<StoredEntry> for ChangeLogEntry {
    type Error = MigrationError;

    fn try_from(stored: StoredEntry) -> Result<Self, Self::Error> {
        let entry = ChangeLogEntry::from_record(
            &stored.filename,
            &stored.applied_by,
            stored.change_date_time,
            &stored.hash,
        )?;
        if entry.migration_type != stored.migration_type
            || entry.version != stored.version
            || entry.description != stored.description
        {
            return Err(MigrationError::invalid_filename(stored.filename));
        }
        Ok(entry)
    }
}

fn require(name: &'static str, value: &str) -> Result<(), MigrationError> {
    if value.is_empty() {
        Err(MigrationError::MissingArgument(name))
    } else {
        Ok(())
    }
}
