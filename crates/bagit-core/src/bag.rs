//! Bag orchestration.
//!
//! A [`Bag`] owns its payload directory, one manifest per algorithm and kind,
//! and the tag files it manages. Payload ingest only ever touches payload
//! manifests; tag manifests are rebuilt by [`Bag::save`].
//!
//! # Layout
//!
//! ```text
//! <root>/
//!   bagit.txt                 # BagIt-Version, Tag-File-Character-Encoding
//!   bag-info.txt              # optional metadata
//!   manifest-<algo>.txt       # one per algorithm
//!   tagmanifest-<algo>.txt    # optional, one per algorithm
//!   data/                     # payload
//! ```
//!
//! # Save order
//!
//! Tag manifests cover payload manifests and tag files, so [`Bag::save`]
//! writes payload manifests first, then tag files, then hashes every other
//! non-payload file, and writes tag manifests last.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bagit_checksum::{ChecksumProvider, StandardProvider};

use crate::config::BagConfig;
use crate::error::{BagError, BagResult};
use crate::manifest::{Manifest, ManifestKind};
use crate::payload::{FileDigests, Payload, DEFAULT_WORKERS};
use crate::tagfile::TagFile;

#[path = "bag_next/mod.rs"]
mod bag_next;

/// Name of the required declaration tag file.
pub const BAGIT_TXT: &str = "bagit.txt";

/// Name of the optional metadata tag file.
pub const BAG_INFO_TXT: &str = "bag-info.txt";

/// Version written to `bagit.txt`.
pub const BAGIT_VERSION: &str = "0.97";

/// Encoding declared in `bagit.txt`.
pub const TAG_FILE_ENCODING: &str = "UTF-8";

/// Lifecycle of an in-memory bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BagState {
    /// Has changes that are not on disk yet.
    Building,
    /// Everything in memory has been written.
    Saved,
    /// Loaded from disk and not modified since.
    Read,
}

/// A BagIt bag rooted at a directory.
pub struct Bag {
    root: PathBuf,
    payload: Payload,
    manifests: Vec<Manifest>,
    tag_files: BTreeMap<String, TagFile>,
    custom_tag_files: BTreeSet<String>,
    excluded: BTreeSet<String>,
    read_errors: Vec<BagError>,
    provider: Arc<dyn ChecksumProvider>,
    workers: usize,
    state: BagState,
}

impl fmt::Debug for Bag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bag")
            .field("root", &self.root)
            .field("manifests", &self.manifests.iter().map(Manifest::name).collect::<Vec<_>>())
            .field("tag_files", &self.tag_files.keys().collect::<Vec<_>>())
            .field("custom_tag_files", &self.custom_tag_files)
            .field("excluded", &self.excluded)
            .field("workers", &self.workers)
            .field("state", &self.state)
            .finish()
    }
}

impl Bag {
    /// Create a new bag at `location/name` with the standard checksum provider.
    ///
    /// Writes `bagit.txt`, one payload manifest per algorithm and, when
    /// `tag_manifests` is set, one tag manifest per algorithm.
    pub fn create(
        location: impl AsRef<Path>,
        name: &str,
        algorithms: &[&str],
        tag_manifests: bool,
    ) -> BagResult<Self> {
        Self::create_with(location, name, algorithms, tag_manifests, Arc::new(StandardProvider))
    }

    /// Create a new bag using a caller-supplied checksum provider.
    pub fn create_with(
        location: impl AsRef<Path>,
        name: &str,
        algorithms: &[&str],
        tag_manifests: bool,
        provider: Arc<dyn ChecksumProvider>,
    ) -> BagResult<Self> {
        bag_next::create::create_impl(
            location.as_ref(),
            name,
            algorithms,
            tag_manifests,
            provider,
            DEFAULT_WORKERS,
        )
    }

    /// Create a new bag from a [`BagConfig`].
    pub fn create_with_config(
        location: impl AsRef<Path>,
        name: &str,
        config: &BagConfig,
    ) -> BagResult<Self> {
        let algorithms: Vec<&str> = config.algorithms.iter().map(String::as_str).collect();
        bag_next::create::create_impl(
            location.as_ref(),
            name,
            &algorithms,
            config.tag_manifests,
            Arc::new(StandardProvider),
            config.workers,
        )
    }

    /// Open an existing bag.
    ///
    /// Every `manifest-*`/`tagmanifest-*` file at the root is parsed. Each
    /// name in `tag_files` is parsed as a managed tag file; failures there
    /// are logged and kept in [`Bag::read_errors`] rather than returned.
    pub fn read(path: impl AsRef<Path>, tag_files: &[&str]) -> BagResult<Self> {
        Self::read_with(path, tag_files, Arc::new(StandardProvider))
    }

    /// Open an existing bag using a caller-supplied checksum provider.
    pub fn read_with(
        path: impl AsRef<Path>,
        tag_files: &[&str],
        provider: Arc<dyn ChecksumProvider>,
    ) -> BagResult<Self> {
        bag_next::read::read_impl(path.as_ref(), tag_files, provider)
    }

    /// Copy one file into the payload and record it in every payload manifest.
    ///
    /// `dest` is relative to `data/`.
    pub fn add_file(&mut self, src: impl AsRef<Path>, dest: &str) -> BagResult<FileDigests> {
        let mut targets: Vec<&mut Manifest> = self
            .manifests
            .iter_mut()
            .filter(|m| m.kind() == ManifestKind::Payload)
            .collect();
        let digests = self.payload.add(src.as_ref(), dest, &mut targets)?;
        self.state = BagState::Building;
        Ok(digests)
    }

    /// Copy a directory tree into the payload root.
    ///
    /// Files that were ingested stay recorded even when others fail; the
    /// failures come back as a [`BagError::PartialFailure`].
    pub fn add_dir(&mut self, src: impl AsRef<Path>) -> BagResult<BTreeMap<String, FileDigests>> {
        let mut targets: Vec<&mut Manifest> = self
            .manifests
            .iter_mut()
            .filter(|m| m.kind() == ManifestKind::Payload)
            .collect();
        let report = self.payload.add_all(src.as_ref(), &mut targets, self.workers);
        if !report.files.is_empty() {
            self.state = BagState::Building;
        }
        BagError::from_errors(report.errors)?;
        Ok(report.files)
    }

    /// Register a managed tag file, creating it empty on disk.
    ///
    /// `name` is relative to the bag root and may include directories. An
    /// already registered name returns the existing tag file.
    pub fn add_tagfile(&mut self, name: &str) -> BagResult<&mut TagFile> {
        bag_next::tags::add_tagfile_impl(self, name)
    }

    /// Copy an arbitrary file into the bag's tag area without parsing it.
    ///
    /// With `include_in_tag_manifest` unset the file is left out of tag
    /// manifests.
    pub fn add_custom_tagfile(
        &mut self,
        src: impl AsRef<Path>,
        dest: &str,
        include_in_tag_manifest: bool,
    ) -> BagResult<()> {
        bag_next::tags::add_custom_tagfile_impl(self, src.as_ref(), dest, include_in_tag_manifest)
    }

    /// Write manifests and tag files to disk.
    ///
    /// Every phase runs even if an earlier one had failures; all failures
    /// come back together as a [`BagError::PartialFailure`].
    pub fn save(&mut self) -> BagResult<()> {
        bag_next::save::save_impl(self)
    }

    /// Recompute and compare every manifest entry.
    ///
    /// Entries with a pending (empty) digest are filled in.
    pub fn verify(&mut self) -> BagResult<()> {
        bag_next::inventory::verify_impl(self)
    }

    /// Every file under the bag root, relative and `/`-separated, sorted.
    pub fn list_files(&self) -> BagResult<Vec<String>> {
        bag_next::paths::list_files_impl(&self.root)
    }

    /// Every path the bag tracks: tag files, manifest entries and manifests.
    pub fn file_manifest(&self) -> Vec<String> {
        bag_next::inventory::file_manifest_impl(self)
    }

    /// One [`BagError::PathNotFound`] per tracked path missing on disk.
    pub fn inventory(&self) -> Vec<BagError> {
        bag_next::inventory::inventory_impl(self)
    }

    /// Files on disk the bag does not track.
    pub fn orphans(&self) -> BagResult<Vec<String>> {
        bag_next::inventory::orphans_impl(self)
    }

    /// `Payload-Oxum` value: `<octets>.<file count>`.
    pub fn payload_oxum(&self) -> BagResult<String> {
        let (bytes, count) = self.payload.octet_stream_sum()?;
        Ok(format!("{}.{}", bytes, count))
    }

    /// Manifest for an algorithm and kind.
    pub fn manifest(&self, algorithm: &str, kind: ManifestKind) -> Option<&Manifest> {
        self.manifests
            .iter()
            .find(|m| m.kind() == kind && m.algorithm().name().eq_ignore_ascii_case(algorithm))
    }

    pub fn manifests(&self) -> &[Manifest] {
        &self.manifests
    }

    pub fn payload_manifests(&self) -> impl Iterator<Item = &Manifest> {
        self.manifests
            .iter()
            .filter(|m| m.kind() == ManifestKind::Payload)
    }

    pub fn tag_manifests(&self) -> impl Iterator<Item = &Manifest> {
        self.manifests.iter().filter(|m| m.kind() == ManifestKind::Tag)
    }

    /// Managed tag file by root-relative name.
    pub fn tag_file(&self, name: &str) -> Option<&TagFile> {
        self.tag_files.get(name)
    }

    /// Mutable access to a managed tag file. Marks the bag as modified.
    pub fn tag_file_mut(&mut self, name: &str) -> Option<&mut TagFile> {
        let tag_file = self.tag_files.get_mut(name)?;
        self.state = BagState::Building;
        Some(tag_file)
    }

    /// Names of every managed tag file.
    pub fn tag_file_names(&self) -> impl Iterator<Item = &str> {
        self.tag_files.keys().map(String::as_str)
    }

    /// The `bag-info.txt` tag file, if managed.
    pub fn bag_info(&self) -> Option<&TagFile> {
        self.tag_file(BAG_INFO_TXT)
    }

    /// Custom tag files copied into this bag, with whether each is covered
    /// by tag manifests.
    pub fn custom_tag_files(&self) -> impl Iterator<Item = (&str, bool)> {
        self.custom_tag_files
            .iter()
            .map(|name| (name.as_str(), !self.excluded.contains(name)))
    }

    /// Non-fatal failures collected by [`Bag::read`].
    pub fn read_errors(&self) -> &[BagError] {
        &self.read_errors
    }

    /// Bag root directory.
    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn state(&self) -> BagState {
        self.state
    }

    /// Concurrency cap used by [`Bag::add_dir`].
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn set_workers(&mut self, workers: usize) {
        self.workers = workers.max(1);
    }
}
