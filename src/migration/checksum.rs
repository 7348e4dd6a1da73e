//! Checksum calculation for migration scripts

use crate::migration::MigrationError;
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::digest::Output;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::str::FromStr;

const READ_CHUNK: usize = 8 * 1024;

/// Digest used to fingerprint script content
///
/// `Md5` is the legacy algorithm and stays the default so that hashes recorded by
/// earlier releases keep matching. The algorithm behind any stored hash can be
/// recovered from its length with [`HashAlgorithm::detect`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Md5,
    Sha256,
}

impl HashAlgorithm {
    /// Length of the rendered hex digest
    pub fn hex_len(self) -> usize {
        match self {
            HashAlgorithm::Md5 => 32,
            HashAlgorithm::Sha256 => 64,
        }
    }

    /// Identify the algorithm that produced `hash`
    ///
    /// Returns `None` unless `hash` is lowercase hex of a known digest length.
    pub fn detect(hash: &str) -> Option<Self> {
        if !hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return None;
        }
        [HashAlgorithm::Md5, HashAlgorithm::Sha256]
            .into_iter()
            .find(|alg| alg.hex_len() == hash.len())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            other => Err(format!("Unknown hash algorithm: {other}")),
        }
    }
}

/// Hash an in-memory buffer
pub fn hash_bytes(algorithm: HashAlgorithm, content: &[u8]) -> String {
    match algorithm {
        HashAlgorithm::Md5 => format!("{:x}", Md5::digest(content)),
        HashAlgorithm::Sha256 => format!("{:x}", Sha256::digest(content)),
    }
}

/// Hash everything `reader` yields, in fixed-size chunks
///
/// # Errors
///
/// Returns `MigrationError::Io` if the reader fails.
pub fn hash_reader<R: Read>(algorithm: HashAlgorithm, reader: R) -> Result<String, MigrationError> {
    match algorithm {
        HashAlgorithm::Md5 => digest_reader::<Md5, R>(reader),
        HashAlgorithm::Sha256 => digest_reader::<Sha256, R>(reader),
    }
}

fn digest_reader<D, R>(mut reader: R) -> Result<String, MigrationError>
where
    D: Digest,
    Output<D>: fmt::LowerHex,
    R: Read,
{
    let mut hasher = D::new();
    let mut buf = [0u8; READ_CHUNK];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Calculate the checksum of a migration script on disk
///
/// The file handle is closed before returning on every path.
///
/// # Errors
///
/// Returns `MigrationError::Io` if the file cannot be opened or read.
pub fn hash_file(algorithm: HashAlgorithm, path: &Path) -> Result<String, MigrationError> {
    let file = File::open(path)?;
    hash_reader(algorithm, file)
}

/// Validate a stored checksum against the current one
///
/// # Errors
///
/// Returns `MigrationError::ChecksumMismatch` if the two differ.
pub fn validate_checksum(filename: &str, stored: &str, current: &str) -> Result<(), MigrationError> {
    if stored == current {
        Ok(())
    } else {
        log::warn!("Checksum mismatch for {filename}: stored={stored}, current={current}");
        Err(MigrationError::ChecksumMismatch {
            filename: filename.to_string(),
            stored: stored.to_string(),
            current: current.to_string(),
        })
    }
}
