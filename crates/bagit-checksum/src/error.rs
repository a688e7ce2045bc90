//! Error types for checksum resolution and file hashing.

use std::path::PathBuf;

/// Checksum errors.
#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    /// Algorithm name is not in the registry.
    #[error("unsupported checksum algorithm '{name}': must be one of md5, sha1, sha224, sha256, sha384, sha512")]
    UnsupportedAlgorithm { name: String },

    /// Reading the file being hashed failed.
    #[error("failed to hash {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ChecksumError {
    /// Returns true if the algorithm lookup failed.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedAlgorithm { .. })
    }

    /// Returns true if the file to hash does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Result type for checksum operations.
pub type ChecksumResult<T> = Result<T, ChecksumError>;
