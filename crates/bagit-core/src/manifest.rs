//! Fixity manifests: `manifest-<algo>.txt` and `tagmanifest-<algo>.txt`.
//!
//! Each line is `<hexdigest><whitespace><path>`. The first whitespace run is
//! the only separator, so paths may contain spaces. Paths are relative to the
//! directory holding the manifest and always use `/`.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use bagit_checksum::{ChecksumAlgorithm, ChecksumProvider};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{BagError, BagResult, ParseIssue};
use crate::tagfile::TAG_FILE_EXTENSION;

lazy_static! {
    static ref MANIFEST_NAME: Regex = Regex::new(r"^(.*-)(\w+)(\.txt)$").unwrap();
}

/// What a manifest covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ManifestKind {
    /// Files under `data/`.
    Payload,
    /// Tag files and payload manifests.
    Tag,
}

impl ManifestKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Payload => "manifest",
            Self::Tag => "tagmanifest",
        }
    }

    /// Canonical file name for `algorithm`.
    pub fn file_name(&self, algorithm: &str) -> String {
        format!("{}-{}.txt", self.prefix(), algorithm.to_ascii_lowercase())
    }

    /// Kind implied by a manifest file name, if it looks like one.
    pub fn from_file_name(name: &str) -> Option<Self> {
        if !MANIFEST_NAME.is_match(name) {
            None
        } else if name.starts_with("tagmanifest-") {
            Some(Self::Tag)
        } else if name.starts_with("manifest-") {
            Some(Self::Payload)
        } else {
            None
        }
    }
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Algorithm name embedded in a manifest file name.
///
/// `manifest-md5.txt` → `md5`; `manifest-md5-sha1.txt` → `sha1`.
pub fn algorithm_from_name(name: &str) -> BagResult<String> {
    MANIFEST_NAME
        .captures(name)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| BagError::UnparsableName {
            name: name.to_string(),
        })
}

/// Parse manifest content into `path → digest` entries.
pub fn parse_entries(content: &str) -> (BTreeMap<String, String>, Vec<ParseIssue>) {
    let mut entries = BTreeMap::new();
    let mut issues = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let Some(split) = line.find(char::is_whitespace) else {
            issues.push(ParseIssue::new(line_no, line, "missing whitespace between digest and path"));
            continue;
        };
        let (digest, rest) = line.split_at(split);
        let path = rest.trim_start();
        if digest.is_empty() || path.is_empty() {
            issues.push(ParseIssue::new(line_no, line, "expected '<digest> <path>'"));
            continue;
        }
        entries.insert(path.to_string(), digest.to_string());
    }

    (entries, issues)
}

/// A path → digest ledger for one algorithm.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    algorithm: ChecksumAlgorithm,
    kind: ManifestKind,
    entries: BTreeMap<String, String>,
}

impl Manifest {
    /// Create an empty manifest.
    ///
    /// `location` is either the directory the manifest lives in, an existing
    /// file inside it, or a `.txt` path inside it. The canonical file name is
    /// derived from `kind` and `algorithm`. Fails with `PathNotFound` if the
    /// directory is absent.
    pub fn new(
        location: impl AsRef<Path>,
        algorithm: ChecksumAlgorithm,
        kind: ManifestKind,
    ) -> BagResult<Self> {
        let location = location.as_ref();
        let names_file = location.is_file()
            || location
                .extension()
                .is_some_and(|ext| ext == TAG_FILE_EXTENSION);
        let dir = if location.is_dir() {
            location
        } else if names_file {
            location.parent().unwrap_or_else(|| Path::new(""))
        } else {
            return Err(BagError::PathNotFound {
                path: location.to_path_buf(),
            });
        };
        if !dir.as_os_str().is_empty() && !dir.is_dir() {
            return Err(BagError::PathNotFound {
                path: dir.to_path_buf(),
            });
        }
        Ok(Self {
            path: dir.join(kind.file_name(algorithm.name())),
            algorithm,
            kind,
            entries: BTreeMap::new(),
        })
    }

    /// Read a manifest file.
    ///
    /// The algorithm and kind come from the file name. Unparsable lines are
    /// returned as issues alongside the entries that did parse.
    pub fn parse(
        path: impl Into<PathBuf>,
        provider: &dyn ChecksumProvider,
    ) -> BagResult<(Self, Vec<ParseIssue>)> {
        let path = path.into();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let algorithm = provider.resolve(&algorithm_from_name(&name)?)?;
        let kind = ManifestKind::from_file_name(&name).unwrap_or(ManifestKind::Payload);

        let content = fs::read_to_string(&path).map_err(|e| BagError::io(&path, e))?;
        let (entries, issues) = parse_entries(&content);
        if !issues.is_empty() {
            warn!(manifest = %name, issues = issues.len(), "manifest has unparsable lines");
        }
        debug!(manifest = %name, entries = entries.len(), "parsed manifest");

        Ok((
            Self {
                path,
                algorithm,
                kind,
                entries,
            },
            issues,
        ))
    }

    /// Full path of the manifest file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name, e.g. `manifest-sha256.txt`.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn algorithm(&self) -> &ChecksumAlgorithm {
        &self.algorithm
    }

    pub fn kind(&self) -> ManifestKind {
        self.kind
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    /// Record a digest. An empty digest marks the entry pending until
    /// [`Manifest::verify`] fills it in.
    pub fn insert(&mut self, path: impl Into<String>, digest: impl Into<String>) -> Option<String> {
        self.entries.insert(path.into(), digest.into())
    }

    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.entries.remove(path)
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Directory entry paths are resolved against.
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Recompute every entry's digest and compare.
    ///
    /// Pending (empty) entries are populated instead of compared. All
    /// failures are collected; an empty vector means every entry matched.
    pub fn verify(&mut self, provider: &dyn ChecksumProvider) -> Vec<BagError> {
        let base = self.base_dir().to_path_buf();
        let algorithm = self.algorithm;
        let mut errors = Vec::new();

        for (rel, stored) in self.entries.iter_mut() {
            let actual = match provider.digest_file(&base.join(rel), &algorithm) {
                Ok(hex) => hex,
                Err(e) => {
                    errors.push(BagError::from(e));
                    continue;
                }
            };
            if stored.is_empty() {
                *stored = actual;
            } else if !stored.eq_ignore_ascii_case(&actual) {
                errors.push(BagError::FixityMismatch {
                    path: rel.clone(),
                    algorithm: algorithm.name().to_string(),
                    expected: stored.clone(),
                    actual,
                });
            }
        }

        debug!(
            manifest = %self.name(),
            entries = self.entries.len(),
            failures = errors.len(),
            "verified manifest"
        );
        errors
    }

    /// Serialized form: one `<digest> <path>` line per entry, sorted by path.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (path, digest) in &self.entries {
            out.push_str(digest);
            out.push(' ');
            out.push_str(path);
            out.push('\n');
        }
        out
    }

    /// Write the manifest file, creating its directory if missing.
    pub fn write(&self) -> BagResult<()> {
        let dir = self.base_dir();
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).map_err(|source| BagError::DestUnwritable {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        fs::write(&self.path, self.to_text()).map_err(|source| BagError::DestUnwritable {
            path: self.path.clone(),
            source,
        })?;
        debug!(manifest = %self.name(), entries = self.entries.len(), "wrote manifest");
        Ok(())
    }
}
