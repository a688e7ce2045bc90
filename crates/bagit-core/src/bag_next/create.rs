//! New bag creation.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use bagit_checksum::{ChecksumAlgorithm, ChecksumProvider};
use tracing::info;

use crate::error::{BagError, BagResult};
use crate::manifest::{Manifest, ManifestKind};
use crate::payload::{Payload, PAYLOAD_DIR};
use crate::tagfile::TagFile;

use super::super::{Bag, BagState, BAGIT_TXT, BAGIT_VERSION, TAG_FILE_ENCODING};

pub(crate) fn create_impl(
    location: &Path,
    name: &str,
    algorithms: &[&str],
    tag_manifests: bool,
    provider: Arc<dyn ChecksumProvider>,
    workers: usize,
) -> BagResult<Bag> {
    let resolved = resolve_algorithms(algorithms, provider.as_ref())?;
    validate_bag_name(name)?;

    if !location.is_dir() {
        return Err(BagError::LocationNotFound {
            path: location.to_path_buf(),
        });
    }
    let root = location.join(name);
    if root.exists() {
        return Err(BagError::BagAlreadyExists { path: root });
    }

    fs::create_dir(&root).map_err(|source| BagError::DestUnwritable {
        path: root.clone(),
        source,
    })?;
    let data_dir = root.join(PAYLOAD_DIR);
    fs::create_dir(&data_dir).map_err(|source| BagError::DestUnwritable {
        path: data_dir.clone(),
        source,
    })?;
    let payload = Payload::new(data_dir)?;

    let mut manifests = Vec::new();
    for algorithm in &resolved {
        manifests.push(Manifest::new(&root, *algorithm, ManifestKind::Payload)?);
    }
    if tag_manifests {
        for algorithm in &resolved {
            manifests.push(Manifest::new(&root, *algorithm, ManifestKind::Tag)?);
        }
    }

    let mut bagit = TagFile::new(root.join(BAGIT_TXT))?;
    bagit.add_field("BagIt-Version", BAGIT_VERSION)?;
    bagit.add_field("Tag-File-Character-Encoding", TAG_FILE_ENCODING)?;
    let mut tag_files = BTreeMap::new();
    tag_files.insert(BAGIT_TXT.to_string(), bagit);

    let mut bag = Bag {
        root,
        payload,
        manifests,
        tag_files,
        custom_tag_files: BTreeSet::new(),
        excluded: BTreeSet::new(),
        read_errors: Vec::new(),
        provider,
        workers: workers.max(1),
        state: BagState::Building,
    };

    info!(
        bag = %bag.root.display(),
        algorithms = ?resolved.iter().map(ChecksumAlgorithm::name).collect::<Vec<_>>(),
        tag_manifests,
        "created bag"
    );

    bag.save()?;
    Ok(bag)
}

/// Resolve every name up front so nothing is created for a bad list.
fn resolve_algorithms(
    names: &[&str],
    provider: &dyn ChecksumProvider,
) -> BagResult<Vec<ChecksumAlgorithm>> {
    if names.is_empty() {
        return Err(BagError::InvalidName {
            name: String::new(),
            reason: "at least one checksum algorithm is required".into(),
        });
    }
    let mut resolved: Vec<ChecksumAlgorithm> = Vec::with_capacity(names.len());
    for name in names {
        let algorithm = provider.resolve(name)?;
        if !resolved.contains(&algorithm) {
            resolved.push(algorithm);
        }
    }
    Ok(resolved)
}

fn validate_bag_name(name: &str) -> BagResult<()> {
    let reason = if name.is_empty() {
        Some("bag name is empty")
    } else if name == "." || name == ".." {
        Some("bag name must not be a relative directory reference")
    } else if name.contains('/') || name.contains('\\') {
        Some("bag name must be a single path component")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(BagError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}
