//! Persisting a bag.

use std::collections::BTreeSet;
use std::path::Path;

use bagit_checksum::ChecksumProvider;
use tracing::{debug, info};

use crate::error::{BagError, BagResult};
use crate::manifest::{Manifest, ManifestKind};

use super::super::{Bag, BagState};
use super::paths::{is_payload_path, is_tag_manifest_name, list_files_impl};

pub(crate) fn save_impl(bag: &mut Bag) -> BagResult<()> {
    let mut errors = Vec::new();
    let provider = bag.provider.as_ref();

    // Phase 1: payload manifests.
    for manifest in bag
        .manifests
        .iter()
        .filter(|m| m.kind() == ManifestKind::Payload)
    {
        if let Err(e) = manifest.write() {
            errors.push(e);
        }
    }

    let has_tag_manifests = bag.manifests.iter().any(|m| m.kind() == ManifestKind::Tag);
    for manifest in bag
        .manifests
        .iter_mut()
        .filter(|m| m.kind() == ManifestKind::Tag)
    {
        manifest.clear();
    }

    // Phase 2: managed tag files, hashed right after they are written.
    let mut recorded = BTreeSet::new();
    for (name, tag_file) in &bag.tag_files {
        match tag_file.write() {
            Ok(()) => {
                if has_tag_manifests {
                    record(provider, &mut bag.manifests, &bag.root, name, &mut errors);
                }
                recorded.insert(name.as_str());
            }
            Err(e) => errors.push(e),
        }
    }

    // Phase 3: everything else outside the payload, payload manifests included.
    if has_tag_manifests {
        match list_files_impl(&bag.root) {
            Ok(files) => {
                for rel in files {
                    if is_payload_path(&rel)
                        || is_tag_manifest_name(&rel)
                        || bag.excluded.contains(&rel)
                        || recorded.contains(rel.as_str())
                    {
                        continue;
                    }
                    record(provider, &mut bag.manifests, &bag.root, &rel, &mut errors);
                }
            }
            Err(e) => errors.push(e),
        }
    }

    // Phase 4: tag manifests.
    for manifest in bag
        .manifests
        .iter()
        .filter(|m| m.kind() == ManifestKind::Tag)
    {
        if let Err(e) = manifest.write() {
            errors.push(e);
        }
    }

    info!(
        bag = %bag.root.display(),
        manifests = bag.manifests.len(),
        tag_files = bag.tag_files.len(),
        failures = errors.len(),
        "saved bag"
    );
    if errors.is_empty() {
        bag.state = BagState::Saved;
    }
    BagError::from_errors(errors)
}

/// Hash `rel` into every tag manifest.
fn record(
    provider: &dyn ChecksumProvider,
    manifests: &mut [Manifest],
    root: &Path,
    rel: &str,
    errors: &mut Vec<BagError>,
) {
    let path = root.join(rel);
    for manifest in manifests
        .iter_mut()
        .filter(|m| m.kind() == ManifestKind::Tag)
    {
        match provider.digest_file(&path, manifest.algorithm()) {
            Ok(digest) => {
                manifest.insert(rel, digest);
            }
            Err(e) => errors.push(e.into()),
        }
    }
    debug!(file = %rel, "recorded tag file digest");
}
