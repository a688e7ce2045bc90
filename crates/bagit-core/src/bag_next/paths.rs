//! Path rules shared by bag operations.

use std::path::{Component, Path};

use walkdir::WalkDir;

use crate::error::{BagError, BagResult};
use crate::manifest::ManifestKind;
use crate::payload::{relative_key, PAYLOAD_DIR};

pub(crate) fn list_files_impl(root: &Path) -> BagResult<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            BagError::io(path, e.into())
        })?;
        if entry.file_type().is_file() {
            if let Some(rel) = relative_key(root, entry.path()) {
                files.push(rel);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// True for root-level `manifest-*` / `tagmanifest-*` names.
pub(crate) fn is_manifest_name(rel: &str) -> bool {
    !rel.contains('/') && ManifestKind::from_file_name(rel).is_some()
}

pub(crate) fn is_tag_manifest_name(rel: &str) -> bool {
    !rel.contains('/') && ManifestKind::from_file_name(rel) == Some(ManifestKind::Tag)
}

pub(crate) fn is_payload_path(rel: &str) -> bool {
    rel == PAYLOAD_DIR
        || rel
            .strip_prefix(PAYLOAD_DIR)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Validate a root-relative destination for a tag file.
///
/// Rejects empty or absolute paths, anything inside the payload directory,
/// `..` segments and manifest names.
pub(crate) fn validate_tag_destination(dest: &str) -> BagResult<()> {
    let invalid = |reason: &str| BagError::InvalidDestination {
        path: dest.to_string(),
        reason: reason.to_string(),
    };
    if dest.is_empty() {
        return Err(invalid("destination is empty"));
    }
    if dest.starts_with('/') || dest.starts_with('\\') {
        return Err(invalid("must be relative to the bag root"));
    }
    for component in Path::new(dest).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return Err(invalid("contains '..'")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("must be relative to the bag root"))
            }
        }
    }
    let key = normalize(dest);
    if key.is_empty() {
        return Err(invalid("destination is empty"));
    }
    if is_payload_path(&key) {
        return Err(invalid("must be outside the payload directory"));
    }
    if is_manifest_name(&key) {
        return Err(invalid("collides with a manifest name"));
    }
    Ok(())
}

/// Root-relative key with `.` and empty segments removed.
pub(crate) fn normalize(rel: &str) -> String {
    rel.split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}
