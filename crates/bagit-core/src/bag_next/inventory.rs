//! Fixity and completeness checks.

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::error::{BagError, BagResult};

use super::super::Bag;
use super::paths::list_files_impl;

pub(crate) fn verify_impl(bag: &mut Bag) -> BagResult<()> {
    let provider = bag.provider.as_ref();
    let mut errors = Vec::new();
    for manifest in bag.manifests.iter_mut() {
        errors.extend(manifest.verify(provider));
    }
    if errors.is_empty() {
        info!(bag = %bag.root.display(), manifests = bag.manifests.len(), "bag verified");
    } else {
        warn!(bag = %bag.root.display(), failures = errors.len(), "bag failed verification");
    }
    BagError::from_errors(errors)
}

pub(crate) fn file_manifest_impl(bag: &Bag) -> Vec<String> {
    let mut tracked: BTreeSet<String> = bag.tag_files.keys().cloned().collect();
    for manifest in &bag.manifests {
        tracked.extend(manifest.entries().keys().cloned());
        tracked.insert(manifest.name());
    }
    tracked.into_iter().collect()
}

pub(crate) fn inventory_impl(bag: &Bag) -> Vec<BagError> {
    file_manifest_impl(bag)
        .into_iter()
        .map(|rel| bag.root.join(rel))
        .filter(|path| !path.exists())
        .map(|path| BagError::PathNotFound { path })
        .collect()
}

pub(crate) fn orphans_impl(bag: &Bag) -> BagResult<Vec<String>> {
    let tracked: BTreeSet<String> = file_manifest_impl(bag).into_iter().collect();
    Ok(list_files_impl(&bag.root)?
        .into_iter()
        .filter(|rel| !tracked.contains(rel) && !bag.custom_tag_files.contains(rel))
        .collect())
}
