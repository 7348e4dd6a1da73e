//! Migration script filename parsing and discovery

use crate::migration::{ChangeLogEntry, EntryContext, MigrationError, MigrationType};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io;
use std::path::Path;

/// Script extensions recognised by the filename grammar
pub const SCRIPT_EXTENSIONS: [&str; 3] = ["ddl", "dml", "dcl"];

// type letter, semantic version (optional pre-release and build metadata), description, extension
static FILENAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([FfBb])-(\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?(?:\+[0-9A-Za-z.-]+)?)-(\w+)\.(ddl|dml|dcl)$",
    )
    .expect("filename pattern is a valid regex")
});

/// The three constituents recovered from a migration script filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFilename {
    pub migration_type: MigrationType,
    pub version: String,
    pub description: String,
}

/// Parse a migration filename into its type, version and description
///
/// Expected format: `{F|B}-{major.minor.patch[-pre][+build]}-{description}.{ddl|dml|dcl}`.
/// The type letter is case-insensitive; underscores in the description become spaces.
///
/// # Example
/// - `f-1.0.2-Initialise_database.ddl` → `Forward`, `1.0.2`, `Initialise database`
///
/// # Errors
///
/// Returns `MigrationError::MissingArgument` for an empty filename and
/// `MigrationError::InvalidFilename` when the grammar does not match.
pub fn parse_filename(filename: &str) -> Result<ParsedFilename, MigrationError> {
    if filename.is_empty() {
        return Err(MigrationError::MissingArgument("filename"));
    }

    let caps = FILENAME_PATTERN
        .captures(filename)
        .ok_or_else(|| MigrationError::invalid_filename(filename))?;

    let migration_type = caps[1]
        .parse::<MigrationType>()
        .map_err(|_| MigrationError::invalid_filename(filename))?;

    Ok(ParsedFilename {
        migration_type,
        version: caps[2].to_string(),
        description: caps[3].replace('_', " "),
    })
}

/// Returns true when `path` carries one of the script extensions
pub fn is_script(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SCRIPT_EXTENSIONS.contains(&ext))
}

/// Discover all migration scripts in a directory
///
/// Scans `scripts_dir` (non-recursively) for `.ddl`, `.dml` and `.dcl` files and
/// builds a [`ChangeLogEntry`] for each one using the providers in `context`.
/// Entries are sorted by filename so repeated scans produce the same listing.
///
/// # Errors
///
/// Returns `MigrationError::Io` if the directory is missing or unreadable, and
/// fails on the first script whose name does not match the grammar.
#[cfg_attr(feature = "tracing", tracing::instrument(skip(context), fields(dir = %scripts_dir.display())))]
pub fn discover_scripts(
    scripts_dir: &Path,
    context: &EntryContext,
) -> Result<Vec<ChangeLogEntry>, MigrationError> {
    if !scripts_dir.is_dir() {
        let kind = if scripts_dir.exists() {
            io::ErrorKind::InvalidInput
        } else {
            io::ErrorKind::NotFound
        };
        return Err(io::Error::new(
            kind,
            format!("Not a scripts directory: {}", scripts_dir.display()),
        )
        .into());
    }

    let mut entries = Vec::new();
    for dir_entry in fs::read_dir(scripts_dir)? {
        let path = dir_entry?.path();
        if !path.is_file() || !is_script(&path) {
            continue;
        }
        entries.push(ChangeLogEntry::from_file(&path, context)?);
    }

    entries.sort_by(|a, b| a.filename().cmp(b.filename()));
    log::debug!(
        "Discovered {} script(s) in {}",
        entries.len(),
        scripts_dir.display()
    );

    Ok(entries)
}
