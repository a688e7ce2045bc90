//! On-disk format fidelity and destination rules.

use std::fs;

use bagit_core::{
    format_field, Bag, BagError, Manifest, ManifestKind, StandardProvider, TagFile, TAG_LINE_WIDTH,
};
use bagit_checksum::lookup;
use tempfile::TempDir;

#[test]
fn test_manifest_write_parse_round_trip() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let mut manifest = Manifest::new(tmp.path(), lookup("sha256")?, ManifestKind::Payload)?;
    manifest.insert("data/plain.txt", "aa11");
    manifest.insert("data/with space/and  two.txt", "bb22");
    manifest.insert("data/ünïcode.bin", "cc33");
    manifest.write()?;

    let (parsed, issues) = Manifest::parse(manifest.path(), &StandardProvider)?;
    assert!(issues.is_empty());
    assert_eq!(parsed.entries(), manifest.entries());
    assert_eq!(parsed.kind(), ManifestKind::Payload);
    assert_eq!(parsed.algorithm().name(), "sha256");
    Ok(())
}

#[test]
fn test_tag_file_write_parse_round_trip() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let long = "word ".repeat(60);
    let mut tag = TagFile::new(tmp.path().join("bag-info.txt"))?;
    tag.add_field("Source-Organization", "Example Library")?;
    tag.add_field("External-Description", long.trim())?;
    tag.add_field("Keyword", "one")?;
    tag.add_field("Keyword", "two")?;
    tag.write()?;

    let text = fs::read_to_string(tag.path())?;
    assert!(text.lines().all(|l| l.len() <= TAG_LINE_WIDTH));
    assert!(text.lines().any(|l| l.starts_with("   word")));

    let (parsed, issues) = TagFile::parse(tag.path())?;
    assert!(issues.is_empty());
    assert_eq!(parsed.fields(), tag.fields());
    assert_eq!(parsed.get_all("Keyword"), vec!["one", "two"]);
    Ok(())
}

#[test]
fn test_format_field_short_value() {
    assert_eq!(format_field("BagIt-Version", "0.97"), "BagIt-Version: 0.97");
}

#[test]
fn test_add_tagfile_requires_txt() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let mut bag = Bag::create(tmp.path(), "bag", &["md5"], false)?;
    for name in ["bag-info", "bag-info.yaml", "meta/.txt"] {
        let err = bag.add_tagfile(name).unwrap_err();
        assert!(matches!(err, BagError::InvalidName { .. }), "{name}");
        assert_eq!(err.exit_code(), 4);
    }
    assert!(bag.add_tagfile("meta/ok.txt").is_ok());
    Ok(())
}

#[test]
fn test_add_custom_tagfile_destinations() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let src = tmp.path().join("blob");
    fs::write(&src, "blob")?;
    let mut bag = Bag::create(tmp.path(), "bag", &["md5"], true)?;

    for dest in ["data/x.bin", "/x.bin", "../x.bin", "meta/../../x.bin", "data"] {
        let err = bag.add_custom_tagfile(&src, dest, true).unwrap_err();
        assert!(matches!(err, BagError::InvalidDestination { .. }), "{dest}");
    }
    assert!(!tmp.path().join("x.bin").exists());

    bag.add_custom_tagfile(&src, "meta/x.bin", true)?;
    bag.save()?;
    let tag = bag.manifest("md5", ManifestKind::Tag).unwrap();
    assert!(tag.get("meta/x.bin").is_some());
    Ok(())
}
