//! Error types for bag operations.

use std::fmt;
use std::path::PathBuf;

use bagit_checksum::ChecksumError;

/// A single unparsable line from a manifest or tag file.
///
/// Line numbers are 1-based. Parse issues never abort a parse; they are
/// returned next to whatever entries did parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIssue {
    pub line: usize,
    pub content: String,
    pub reason: String,
}

impl ParseIssue {
    pub fn new(line: usize, content: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            line,
            content: content.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} ({:?})", self.line, self.reason, self.content)
    }
}

/// Bag errors.
#[derive(Debug, thiserror::Error)]
pub enum BagError {
    /// A required file or directory does not exist.
    #[error("path not found: {}", path.display())]
    PathNotFound { path: PathBuf },

    /// The directory a bag should be created in does not exist.
    #[error("location not found: {}", path.display())]
    LocationNotFound { path: PathBuf },

    /// Bag root already exists.
    #[error("bag already exists: {}", path.display())]
    BagAlreadyExists { path: PathBuf },

    /// Checksum algorithm is not supported by the provider.
    #[error("unsupported checksum algorithm: {name}")]
    UnsupportedAlgorithm { name: String },

    /// File name does not follow the `<kind>-<algorithm>.txt` convention.
    #[error("unparsable manifest name: {name}")]
    UnparsableName { name: String },

    /// Tag file or field name rejected.
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// One or more lines of a manifest or tag file could not be parsed.
    #[error("{} unparsable line(s) in {}", issues.len(), path.display())]
    Parse {
        path: PathBuf,
        issues: Vec<ParseIssue>,
    },

    /// Recomputed digest differs from the one stored in the manifest.
    #[error("fixity mismatch for {path} ({algorithm}): expected {expected}, got {actual}")]
    FixityMismatch {
        path: String,
        algorithm: String,
        expected: String,
        actual: String,
    },

    /// Destination path for a custom tag file or payload file is not allowed.
    #[error("invalid destination '{path}': {reason}")]
    InvalidDestination { path: String, reason: String },

    /// File to ingest does not exist or is not a regular file.
    #[error("source not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    /// Destination could not be created or written.
    #[error("destination not writable: {}: {source}", path.display())]
    DestUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Bag root contains no manifest files.
    #[error("no manifest found in {}", path.display())]
    NoManifestFound { path: PathBuf },

    /// Ingest worker pool could not be started.
    #[error("worker pool error: {message}")]
    WorkerPool { message: String },

    /// Filesystem error.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Bulk operation finished with failures.
    #[error("{} operation(s) failed: {}", errors.len(), summarize(errors))]
    PartialFailure { errors: Vec<BagError> },
}

fn summarize(errors: &[BagError]) -> String {
    const SHOWN: usize = 3;
    let mut parts: Vec<String> = errors.iter().take(SHOWN).map(ToString::to_string).collect();
    if errors.len() > SHOWN {
        parts.push(format!("and {} more", errors.len() - SHOWN));
    }
    parts.join("; ")
}

impl BagError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            return Self::PathNotFound { path };
        }
        Self::Io { path, source }
    }

    /// Collapse a list of errors into `Ok(())` or a [`BagError::PartialFailure`].
    pub fn from_errors(errors: Vec<BagError>) -> BagResult<()> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self::PartialFailure { errors })
        }
    }

    /// Errors wrapped by an aggregate, or this error alone.
    pub fn flatten(&self) -> Vec<&BagError> {
        match self {
            Self::PartialFailure { errors } => errors.iter().flat_map(|e| e.flatten()).collect(),
            other => vec![other],
        }
    }

    /// Returns true if this error (or an aggregated one) means a path is missing.
    pub fn is_not_found(&self) -> bool {
        self.flatten().iter().any(|e| {
            matches!(
                e,
                Self::PathNotFound { .. }
                    | Self::LocationNotFound { .. }
                    | Self::SourceNotFound { .. }
                    | Self::NoManifestFound { .. }
            )
        })
    }

    /// Returns true if this error (or an aggregated one) is a fixity mismatch.
    pub fn is_fixity_mismatch(&self) -> bool {
        self.flatten()
            .iter()
            .any(|e| matches!(e, Self::FixityMismatch { .. }))
    }

    /// Returns true for errors caused by a bad manifest or algorithm name.
    pub fn is_name_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedAlgorithm { .. } | Self::UnparsableName { .. } | Self::InvalidName { .. }
        )
    }

    /// Suggested exit code for thin command-line callers.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::PathNotFound { .. }
            | Self::LocationNotFound { .. }
            | Self::SourceNotFound { .. }
            | Self::NoManifestFound { .. } => 2,
            Self::BagAlreadyExists { .. } => 3,
            Self::UnsupportedAlgorithm { .. }
            | Self::UnparsableName { .. }
            | Self::InvalidName { .. }
            | Self::InvalidDestination { .. } => 4,
            Self::FixityMismatch { .. } => 5,
            Self::Parse { .. } => 6,
            Self::PartialFailure { errors } => {
                if errors.iter().any(BagError::is_fixity_mismatch) {
                    5
                } else {
                    1
                }
            }
            _ => 1,
        }
    }
}

impl From<ChecksumError> for BagError {
    fn from(err: ChecksumError) -> Self {
        match err {
            ChecksumError::UnsupportedAlgorithm { name } => Self::UnsupportedAlgorithm { name },
            ChecksumError::Io { path, source } => Self::io(path, source),
        }
    }
}

/// Result type for bag operations.
pub type BagResult<T> = Result<T, BagError>;
