//! Managed and custom tag files.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{BagError, BagResult};
use crate::payload::same_file;
use crate::tagfile::{validate_tag_file_name, TagFile};

use super::super::{Bag, BagState};
use super::paths::{normalize, validate_tag_destination};

pub(crate) fn add_tagfile_impl<'a>(bag: &'a mut Bag, name: &str) -> BagResult<&'a mut TagFile> {
    validate_tag_destination(name).map_err(|e| match e {
        BagError::InvalidDestination { path, reason } => BagError::InvalidName { name: path, reason },
        other => other,
    })?;
    let key = normalize(name);

    if !bag.tag_files.contains_key(&key) {
        let path = bag.root.join(&key);
        validate_tag_file_name(&path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| BagError::DestUnwritable {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let tag_file = TagFile::new(path)?;
        tag_file.write()?;
        debug!(tag_file = %key, "registered tag file");
        bag.custom_tag_files.remove(&key);
        bag.excluded.remove(&key);
        bag.tag_files.insert(key.clone(), tag_file);
        bag.state = BagState::Building;
    }

    bag.tag_files
        .get_mut(&key)
        .ok_or(BagError::InvalidName {
            name: key,
            reason: "tag file not registered".into(),
        })
}

pub(crate) fn add_custom_tagfile_impl(
    bag: &mut Bag,
    src: &Path,
    dest: &str,
    include_in_tag_manifest: bool,
) -> BagResult<()> {
    validate_tag_destination(dest)?;
    let key = normalize(dest);
    if bag.tag_files.contains_key(&key) {
        return Err(BagError::InvalidDestination {
            path: key,
            reason: "already a managed tag file".into(),
        });
    }
    if !src.is_file() {
        return Err(BagError::SourceNotFound {
            path: src.to_path_buf(),
        });
    }

    let target = bag.root.join(&key);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|source| BagError::DestUnwritable {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    if same_file(src, &target) {
        debug!(dest = %key, "custom tag file already in place");
    } else {
        fs::copy(src, &target).map_err(|source| BagError::DestUnwritable {
            path: target.clone(),
            source,
        })?;
    }
    debug!(
        src = %src.display(),
        dest = %key,
        include_in_tag_manifest,
        "copied custom tag file"
    );

    if include_in_tag_manifest {
        bag.excluded.remove(&key);
    } else {
        bag.excluded.insert(key.clone());
    }
    bag.custom_tag_files.insert(key);
    bag.state = BagState::Building;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bagit_checksum::StandardProvider;
    use tempfile::TempDir;

    use crate::bag::bag_next::create::create_impl;

    fn new_bag(dir: &TempDir) -> Bag {
        create_impl(dir.path(), "bag", &["md5"], true, Arc::new(StandardProvider), 2).unwrap()
    }

    #[test]
    fn test_add_tagfile_creates_nested_file() {
        let dir = TempDir::new().unwrap();
        let mut bag = new_bag(&dir);
        bag.add_tagfile("meta/extra.txt")
            .unwrap()
            .add_field("Note", "hello")
            .unwrap();

        assert!(dir.path().join("bag/meta/extra.txt").is_file());
        assert_eq!(bag.tag_file("meta/extra.txt").unwrap().get("Note"), Some("hello"));
        assert_eq!(bag.state(), BagState::Building);
    }

    #[test]
    fn test_add_tagfile_keeps_existing() {
        let dir = TempDir::new().unwrap();
        let mut bag = new_bag(&dir);
        let bagit = bag.add_tagfile("./bagit.txt").unwrap();
        assert_eq!(bagit.get("BagIt-Version"), Some("0.97"));
    }

    #[test]
    fn test_add_tagfile_rejections() {
        let dir = TempDir::new().unwrap();
        let mut bag = new_bag(&dir);
        for name in ["manifest-md5.txt", "tagmanifest-sha1.txt", "notes.md", "data/x.txt", "../x.txt"] {
            let err = bag.add_tagfile(name).unwrap_err();
            assert!(matches!(err, BagError::InvalidName { .. }), "{name}");
        }
    }

    #[test]
    fn test_add_tagfile_bad_name_leaves_no_directory() {
        let dir = TempDir::new().unwrap();
        let mut bag = new_bag(&dir);
        let err = bag.add_tagfile("newdir/notes.md").unwrap_err();
        assert!(matches!(err, BagError::InvalidName { .. }));
        assert!(!dir.path().join("bag/newdir").exists());
    }

    #[test]
    fn test_add_custom_tagfile_in_place_keeps_content() {
        let dir = TempDir::new().unwrap();
        let mut bag = new_bag(&dir);
        let in_bag = dir.path().join("bag/notes.bin");
        fs::write(&in_bag, "precious bytes").unwrap();

        bag.add_custom_tagfile(&in_bag, "notes.bin", true).unwrap();
        assert_eq!(fs::read_to_string(&in_bag).unwrap(), "precious bytes");

        bag.save().unwrap();
        assert_eq!(fs::read_to_string(&in_bag).unwrap(), "precious bytes");
        let tag = bag.manifest("md5", crate::manifest::ManifestKind::Tag).unwrap();
        assert!(tag.get("notes.bin").is_some());
    }

    #[test]
    fn test_add_custom_tagfile_exclusion() {
        let dir = TempDir::new().unwrap();
        let mut bag = new_bag(&dir);
        let src = dir.path().join("blob.bin");
        fs::write(&src, [0_u8, 1, 2]).unwrap();

        bag.add_custom_tagfile(&src, "extra/blob.bin", false).unwrap();
        assert!(dir.path().join("bag/extra/blob.bin").is_file());
        assert_eq!(
            bag.custom_tag_files().collect::<Vec<_>>(),
            vec![("extra/blob.bin", false)]
        );

        bag.add_custom_tagfile(&src, "extra/blob.bin", true).unwrap();
        assert_eq!(
            bag.custom_tag_files().collect::<Vec<_>>(),
            vec![("extra/blob.bin", true)]
        );
    }

    #[test]
    fn test_add_custom_tagfile_rejections() {
        let dir = TempDir::new().unwrap();
        let mut bag = new_bag(&dir);
        let src = dir.path().join("blob.bin");
        fs::write(&src, "x").unwrap();

        for dest in ["data/evil.txt", "data", "/abs.txt", "a/../../b.txt", "bagit.txt"] {
            let err = bag.add_custom_tagfile(&src, dest, true).unwrap_err();
            assert!(matches!(err, BagError::InvalidDestination { .. }), "{dest}");
        }

        let err = bag
            .add_custom_tagfile(dir.path().join("missing"), "ok.txt", true)
            .unwrap_err();
        assert!(matches!(err, BagError::SourceNotFound { .. }));
    }
}
