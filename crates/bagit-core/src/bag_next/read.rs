//! Loading an existing bag from disk.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use bagit_checksum::ChecksumProvider;
use tracing::{info, warn};

use crate::error::{BagError, BagResult};
use crate::manifest::{Manifest, ManifestKind};
use crate::payload::{Payload, DEFAULT_WORKERS, PAYLOAD_DIR};
use crate::tagfile::TagFile;

use super::super::{Bag, BagState};

pub(crate) fn read_impl(
    root: &Path,
    expected_tag_files: &[&str],
    provider: Arc<dyn ChecksumProvider>,
) -> BagResult<Bag> {
    if !root.is_dir() {
        return Err(BagError::PathNotFound {
            path: root.to_path_buf(),
        });
    }
    let payload = Payload::new(root.join(PAYLOAD_DIR))?;

    let mut read_errors = Vec::new();
    let manifests = read_manifests(root, provider.as_ref(), &mut read_errors)?;

    let mut tag_files = BTreeMap::new();
    for name in expected_tag_files {
        match TagFile::parse(root.join(name)) {
            Ok((tag_file, issues)) => {
                if !issues.is_empty() {
                    warn!(tag_file = %name, issues = issues.len(), "tag file has unparsable lines");
                    read_errors.push(BagError::Parse {
                        path: tag_file.path().to_path_buf(),
                        issues,
                    });
                }
                tag_files.insert((*name).to_string(), tag_file);
            }
            Err(e) => {
                warn!(tag_file = %name, error = %e, "could not read tag file");
                read_errors.push(e);
            }
        }
    }

    info!(
        bag = %root.display(),
        manifests = manifests.len(),
        tag_files = tag_files.len(),
        problems = read_errors.len(),
        "read bag"
    );

    Ok(Bag {
        root: root.to_path_buf(),
        payload,
        manifests,
        tag_files,
        custom_tag_files: BTreeSet::new(),
        excluded: BTreeSet::new(),
        read_errors,
        provider,
        workers: DEFAULT_WORKERS,
        state: BagState::Read,
    })
}

/// Parse every root-level manifest, payload manifests first, each group
/// sorted by file name.
fn read_manifests(
    root: &Path,
    provider: &dyn ChecksumProvider,
    read_errors: &mut Vec<BagError>,
) -> BagResult<Vec<Manifest>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(root).map_err(|e| BagError::io(root, e))? {
        let entry = entry.map_err(|e| BagError::io(root, e))?;
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_file && ManifestKind::from_file_name(&name).is_some() {
            names.push(name);
        }
    }
    names.sort_by_key(|name| (ManifestKind::from_file_name(name), name.clone()));

    let mut manifests = Vec::new();
    for name in names {
        match Manifest::parse(root.join(&name), provider) {
            Ok((manifest, issues)) => {
                if !issues.is_empty() {
                    read_errors.push(BagError::Parse {
                        path: manifest.path().to_path_buf(),
                        issues,
                    });
                }
                manifests.push(manifest);
            }
            Err(e @ BagError::UnsupportedAlgorithm { .. }) => return Err(e),
            Err(e) => {
                warn!(manifest = %name, error = %e, "could not read manifest");
                read_errors.push(e);
            }
        }
    }

    if manifests.is_empty() {
        return Err(BagError::NoManifestFound {
            path: root.to_path_buf(),
        });
    }
    Ok(manifests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bagit_checksum::StandardProvider;
    use tempfile::TempDir;

    fn skeleton() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(PAYLOAD_DIR)).unwrap();
        dir
    }

    fn read(dir: &TempDir, tag_files: &[&str]) -> BagResult<Bag> {
        read_impl(dir.path(), tag_files, Arc::new(StandardProvider))
    }

    #[test]
    fn test_requires_payload_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("manifest-md5.txt"), "").unwrap();
        assert!(read(&dir, &[]).unwrap_err().is_not_found());
    }

    #[test]
    fn test_requires_a_manifest() {
        let dir = skeleton();
        fs::write(dir.path().join("bagit.txt"), "BagIt-Version: 0.97\n").unwrap();
        let err = read(&dir, &[]).unwrap_err();
        assert!(matches!(err, BagError::NoManifestFound { .. }));
    }

    #[test]
    fn test_unsupported_manifest_algorithm_fails() {
        let dir = skeleton();
        fs::write(dir.path().join("manifest-sha404.txt"), "").unwrap();
        let err = read(&dir, &[]).unwrap_err();
        assert!(matches!(err, BagError::UnsupportedAlgorithm { .. }));
    }

    #[test]
    fn test_orders_payload_manifests_first() {
        let dir = skeleton();
        for name in ["tagmanifest-md5.txt", "manifest-sha1.txt", "manifest-md5.txt"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let bag = read(&dir, &[]).unwrap();
        let names: Vec<String> = bag.manifests().iter().map(Manifest::name).collect();
        assert_eq!(
            names,
            vec!["manifest-md5.txt", "manifest-sha1.txt", "tagmanifest-md5.txt"]
        );
        assert_eq!(bag.state(), BagState::Read);
    }

    #[test]
    fn test_ignores_nested_manifests() {
        let dir = skeleton();
        fs::write(dir.path().join("manifest-md5.txt"), "").unwrap();
        fs::create_dir(dir.path().join("meta")).unwrap();
        fs::write(dir.path().join("meta/manifest-sha1.txt"), "").unwrap();
        let bag = read(&dir, &[]).unwrap();
        assert_eq!(bag.manifests().len(), 1);
    }

    #[test]
    fn test_ignores_manifest_backups() {
        let dir = skeleton();
        fs::write(dir.path().join("manifest-md5.txt"), "").unwrap();
        fs::write(dir.path().join("manifest-md5.txt.bak"), "").unwrap();
        fs::write(dir.path().join("tagmanifest-sha1.txt~"), "").unwrap();
        let bag = read(&dir, &[]).unwrap();
        assert_eq!(bag.manifests().len(), 1);
        assert!(bag.read_errors().is_empty());
    }

    #[test]
    fn test_collects_parse_issues() {
        let dir = skeleton();
        fs::write(
            dir.path().join("manifest-md5.txt"),
            "abc data/a.txt\nnot-a-valid-line\n",
        )
        .unwrap();
        fs::write(dir.path().join("bag-info.txt"), "   orphan continuation\nSource: x\n").unwrap();

        let bag = read(&dir, &["bag-info.txt", "missing.txt"]).unwrap();
        assert_eq!(bag.manifests()[0].len(), 1);
        assert_eq!(bag.bag_info().unwrap().get("Source"), Some("x"));
        assert_eq!(bag.read_errors().len(), 3);
        assert!(bag.tag_file("missing.txt").is_none());
    }
}
