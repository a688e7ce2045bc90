//! The bag's `data/` directory and payload ingest.
//!
//! A file is read once; every chunk is fanned out to one hasher per target
//! manifest and to the destination file. Directory ingest runs those copies
//! on a bounded worker pool and records digests only after every worker has
//! finished.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Component, Path, PathBuf};

use bagit_checksum::{ChecksumAlgorithm, Hasher};
use rayon::prelude::*;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{BagError, BagResult};
use crate::manifest::Manifest;

/// Name of the payload directory inside a bag.
pub const PAYLOAD_DIR: &str = "data";

/// Default concurrency cap for [`Payload::add_all`].
pub const DEFAULT_WORKERS: usize = 8;

const COPY_BUFFER: usize = 64 * 1024;

/// Digests of one file, keyed by algorithm name.
pub type FileDigests = BTreeMap<String, String>;

/// Outcome of a directory ingest.
#[derive(Debug, Default)]
pub struct AddAllReport {
    /// Payload-relative path → digests, for every file that was ingested.
    pub files: BTreeMap<String, FileDigests>,
    /// Failures, one per file (or walk error). Order is not meaningful.
    pub errors: Vec<BagError>,
}

impl AddAllReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Payload directory of a bag.
#[derive(Debug, Clone)]
pub struct Payload {
    dir: PathBuf,
}

impl Payload {
    /// Manage an existing payload directory.
    pub fn new(dir: impl Into<PathBuf>) -> BagResult<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(BagError::PathNotFound { path: dir });
        }
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Directory name used as the manifest key prefix (normally `data`).
    pub fn name(&self) -> String {
        self.dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| PAYLOAD_DIR.to_string())
    }

    /// Manifest key for a payload-relative path, e.g. `data/a/b.txt`.
    pub fn manifest_key(&self, rel: &str) -> String {
        format!("{}/{}", self.name(), rel.trim_start_matches('/'))
    }

    /// Copy `src` into the payload as `dest`, hashing it for every manifest.
    ///
    /// Returns algorithm name → hex digest. On success each manifest gets an
    /// entry keyed by [`Payload::manifest_key`]. A partially written
    /// destination is left in place on failure.
    pub fn add(
        &self,
        src: &Path,
        dest: &str,
        manifests: &mut [&mut Manifest],
    ) -> BagResult<FileDigests> {
        let rel = validate_dest(dest)?;
        let algorithms: Vec<ChecksumAlgorithm> = manifests.iter().map(|m| *m.algorithm()).collect();
        let digests = self.ingest(src, &rel, &algorithms)?;
        record(self, &rel, &digests, manifests);
        Ok(digests)
    }

    /// Ingest every regular file under `src_dir`, preserving relative paths.
    ///
    /// At most `workers` files are in flight. Failures never stop the other
    /// files; the call returns once every file has finished.
    pub fn add_all(
        &self,
        src_dir: &Path,
        manifests: &mut [&mut Manifest],
        workers: usize,
    ) -> AddAllReport {
        let mut report = AddAllReport::default();
        if !src_dir.is_dir() {
            report.errors.push(BagError::PathNotFound {
                path: src_dir.to_path_buf(),
            });
            return report;
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(src_dir).follow_links(false) {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    match relative_key(src_dir, entry.path()) {
                        Some(rel) => files.push((entry.into_path(), rel)),
                        None => report.errors.push(BagError::InvalidDestination {
                            path: entry.path().display().to_string(),
                            reason: "not representable as a relative UTF-8 path".into(),
                        }),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| src_dir.to_path_buf());
                    report.errors.push(BagError::io(path, e.into()));
                }
            }
        }

        let algorithms: Vec<ChecksumAlgorithm> = manifests.iter().map(|m| *m.algorithm()).collect();
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("bagit-ingest-{}", i))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                report.errors.push(BagError::WorkerPool {
                    message: e.to_string(),
                });
                return report;
            }
        };

        info!(
            source = %src_dir.display(),
            files = files.len(),
            workers = workers.max(1),
            "ingesting directory"
        );

        let results: Vec<(String, BagResult<FileDigests>)> = pool.install(|| {
            files
                .par_iter()
                .map(|(abs, rel)| (rel.clone(), self.ingest(abs, rel, &algorithms)))
                .collect()
        });

        for (rel, result) in results {
            match result {
                Ok(digests) => {
                    record(self, &rel, &digests, manifests);
                    report.files.insert(rel, digests);
                }
                Err(e) => report.errors.push(e),
            }
        }
        report
    }

    /// Total size in bytes and number of regular files under the payload.
    pub fn octet_stream_sum(&self) -> BagResult<(u64, usize)> {
        let mut bytes = 0_u64;
        let mut count = 0_usize;
        for entry in WalkDir::new(&self.dir) {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| self.dir.clone());
                BagError::io(path, e.into())
            })?;
            if entry.file_type().is_file() {
                let meta = entry.metadata().map_err(|e| BagError::io(entry.path(), e.into()))?;
                bytes += meta.len();
                count += 1;
            }
        }
        Ok((bytes, count))
    }

    /// Copy and hash one file. Does not touch any manifest.
    fn ingest(
        &self,
        src: &Path,
        dest: &str,
        algorithms: &[ChecksumAlgorithm],
    ) -> BagResult<FileDigests> {
        let dest = validate_dest(dest)?;
        match fs::metadata(src) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(BagError::SourceNotFound {
                    path: src.to_path_buf(),
                })
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BagError::SourceNotFound {
                    path: src.to_path_buf(),
                })
            }
            Err(e) => return Err(BagError::io(src, e)),
        }

        let dest_path = self.dir.join(&dest);
        let mut hashers: Vec<Box<dyn Hasher>> = algorithms.iter().map(|a| a.new_hasher()).collect();
        let mut reader = File::open(src).map_err(|e| BagError::io(src, e))?;

        if same_file(src, &dest_path) {
            debug!(path = %dest_path.display(), "source already in payload, hashing only");
            pump(&mut reader, src, &mut hashers, None)?;
        } else {
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent).map_err(|source| BagError::DestUnwritable {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            let mut writer = File::create(&dest_path).map_err(|source| BagError::DestUnwritable {
                path: dest_path.clone(),
                source,
            })?;
            pump(&mut reader, src, &mut hashers, Some((&mut writer, dest_path.as_path())))?;
            writer.flush().map_err(|e| BagError::io(&dest_path, e))?;
            debug!(src = %src.display(), dest = %dest_path.display(), "copied payload file");
        }

        Ok(algorithms
            .iter()
            .zip(hashers)
            .map(|(algo, hasher)| (algo.name().to_string(), hasher.finalize_hex()))
            .collect())
    }
}

/// Stream `reader` into every hasher and, optionally, a destination file.
fn pump(
    reader: &mut File,
    src: &Path,
    hashers: &mut [Box<dyn Hasher>],
    mut sink: Option<(&mut File, &Path)>,
) -> BagResult<()> {
    let mut buf = vec![0_u8; COPY_BUFFER];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(BagError::io(src, e)),
        };
        let chunk = &buf[..n];
        for hasher in hashers.iter_mut() {
            hasher.update(chunk);
        }
        if let Some((writer, path)) = sink.as_mut() {
            writer.write_all(chunk).map_err(|e| BagError::io(*path, e))?;
        }
    }
}

fn record(payload: &Payload, rel: &str, digests: &FileDigests, manifests: &mut [&mut Manifest]) {
    let key = payload.manifest_key(rel);
    for manifest in manifests.iter_mut() {
        if let Some(digest) = digests.get(manifest.algorithm().name()) {
            manifest.insert(key.clone(), digest.clone());
        }
    }
}

/// True when both paths resolve to the same existing file.
pub(crate) fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Reject escaping destinations and return the `/`-joined normal form.
fn validate_dest(dest: &str) -> BagResult<String> {
    let invalid = |reason: &str| BagError::InvalidDestination {
        path: dest.to_string(),
        reason: reason.to_string(),
    };
    if dest.is_empty() {
        return Err(invalid("destination is empty"));
    }
    let mut parts = Vec::new();
    for component in Path::new(dest).components() {
        match component {
            Component::Normal(part) => match part.to_str() {
                Some(part) => parts.push(part),
                None => return Err(invalid("not valid UTF-8")),
            },
            Component::CurDir => {}
            Component::ParentDir => return Err(invalid("contains '..'")),
            Component::RootDir | Component::Prefix(_) => return Err(invalid("must be relative")),
        }
    }
    if parts.is_empty() {
        return Err(invalid("names no file"));
    }
    Ok(parts.join("/"))
}

/// `path` relative to `base`, joined with `/`.
pub(crate) fn relative_key(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestKind;
    use bagit_checksum::lookup;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Payload) {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join(PAYLOAD_DIR)).unwrap();
        let payload = Payload::new(root.path().join(PAYLOAD_DIR)).unwrap();
        (root, payload)
    }

    fn manifest(root: &TempDir, algo: &str) -> Manifest {
        Manifest::new(root.path(), lookup(algo).unwrap(), ManifestKind::Payload).unwrap()
    }

    #[test]
    fn test_new_requires_directory() {
        let root = TempDir::new().unwrap();
        assert!(Payload::new(root.path().join("missing")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_add_single_file() {
        let (root, payload) = setup();
        let src = root.path().join("src.txt");
        fs::write(&src, "Test the checksum").unwrap();

        let mut md5 = manifest(&root, "md5");
        let digests = payload.add(&src, "hello.txt", &mut [&mut md5]).unwrap();

        assert_eq!(digests["md5"], "92d7a9f0f4a30ca782dcae5fe83ca7eb");
        assert_eq!(md5.get("data/hello.txt"), Some("92d7a9f0f4a30ca782dcae5fe83ca7eb"));
        assert_eq!(
            fs::read_to_string(payload.path().join("hello.txt")).unwrap(),
            "Test the checksum"
        );
    }

    #[test]
    fn test_add_fans_out_to_every_manifest() {
        let (root, payload) = setup();
        let src = root.path().join("src.txt");
        fs::write(&src, "Test the checksum").unwrap();

        let mut md5 = manifest(&root, "md5");
        let mut sha1 = manifest(&root, "sha1");
        let mut sha256 = manifest(&root, "sha256");
        payload
            .add(&src, "nested/deeper/hello.txt", &mut [&mut md5, &mut sha1, &mut sha256])
            .unwrap();

        let key = "data/nested/deeper/hello.txt";
        assert_eq!(md5.get(key), Some("92d7a9f0f4a30ca782dcae5fe83ca7eb"));
        assert_eq!(sha1.get(key), Some("da909ba395016f2a64b04d706520db6afa74fc95"));
        assert_eq!(sha256.get(key).map(str::len), Some(64));
    }

    #[test]
    fn test_add_missing_source() {
        let (root, payload) = setup();
        let mut md5 = manifest(&root, "md5");
        let err = payload
            .add(&root.path().join("nope"), "nope", &mut [&mut md5])
            .unwrap_err();
        assert!(matches!(err, BagError::SourceNotFound { .. }));
        assert!(md5.is_empty());
    }

    #[test]
    fn test_add_rejects_escaping_destination() {
        let (root, payload) = setup();
        let src = root.path().join("src.txt");
        fs::write(&src, "x").unwrap();
        let mut md5 = manifest(&root, "md5");
        for dest in ["../escape.txt", "/abs.txt", ""] {
            let err = payload.add(&src, dest, &mut [&mut md5]).unwrap_err();
            assert!(matches!(err, BagError::InvalidDestination { .. }), "{dest}");
        }
    }

    #[test]
    fn test_add_in_place_hashes_without_copy() {
        let (root, payload) = setup();
        let inside = payload.path().join("already.txt");
        fs::write(&inside, "Test the checksum").unwrap();

        let mut md5 = manifest(&root, "md5");
        let digests = payload.add(&inside, "already.txt", &mut [&mut md5]).unwrap();

        assert_eq!(digests["md5"], "92d7a9f0f4a30ca782dcae5fe83ca7eb");
        assert_eq!(fs::read_to_string(&inside).unwrap(), "Test the checksum");
    }

    #[test]
    fn test_add_all_collects_every_file() {
        let (root, payload) = setup();
        let src = root.path().join("src");
        fs::create_dir_all(src.join("sub/inner")).unwrap();
        for i in 0..30 {
            let dir = match i % 3 {
                0 => src.clone(),
                1 => src.join("sub"),
                _ => src.join("sub/inner"),
            };
            fs::write(dir.join(format!("file-{i}.txt")), format!("content {i}")).unwrap();
        }

        let mut md5 = manifest(&root, "md5");
        let mut sha256 = manifest(&root, "sha256");
        let report = payload.add_all(&src, &mut [&mut md5, &mut sha256], 4);

        assert!(report.is_success(), "{:?}", report.errors);
        assert_eq!(report.files.len(), 30);
        assert_eq!(md5.len(), 30);
        assert_eq!(sha256.len(), 30);
        assert!(md5.get("data/sub/inner/file-2.txt").is_some());
        assert_eq!(
            report.files["sub/file-1.txt"]["md5"],
            md5.get("data/sub/file-1.txt").unwrap()
        );
        assert!(payload.path().join("sub/inner/file-29.txt").is_file());
    }

    #[test]
    fn test_add_all_keeps_going_past_unwritable_destination() {
        let (root, payload) = setup();
        let src = root.path().join("src");
        fs::create_dir_all(&src).unwrap();
        for i in 0..10 {
            fs::write(src.join(format!("f{i}.txt")), format!("content {i}")).unwrap();
        }
        fs::create_dir_all(payload.path().join("f3.txt")).unwrap();

        let mut md5 = manifest(&root, "md5");
        let report = payload.add_all(&src, &mut [&mut md5], 3);

        assert_eq!(report.errors.len(), 1, "{:?}", report.errors);
        assert!(matches!(report.errors[0], BagError::DestUnwritable { .. }));
        assert_eq!(report.files.len(), 9);
        assert_eq!(md5.len(), 9);
        assert!(md5.get("data/f3.txt").is_none());
        assert!(md5.get("data/f9.txt").is_some());
    }

    #[test]
    fn test_add_normalizes_destination() {
        let (root, payload) = setup();
        let src = root.path().join("a.txt");
        fs::write(&src, "alpha").unwrap();
        let mut md5 = manifest(&root, "md5");

        payload.add(&src, "./a//b.txt", &mut [&mut md5]).unwrap();
        payload.add(&src, "a.txt", &mut [&mut md5]).unwrap();
        payload.add(&src, "./a.txt", &mut [&mut md5]).unwrap();

        let keys: Vec<&str> = md5.entries().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["data/a.txt", "data/a/b.txt"]);
        assert!(payload.path().join("a/b.txt").is_file());
    }

    #[test]
    fn test_add_rejects_destination_without_file_name() {
        let (root, payload) = setup();
        let src = root.path().join("a.txt");
        fs::write(&src, "alpha").unwrap();
        let mut md5 = manifest(&root, "md5");
        let err = payload.add(&src, "./", &mut [&mut md5]).unwrap_err();
        assert!(matches!(err, BagError::InvalidDestination { .. }));
        assert!(md5.is_empty());
    }

    #[test]
    fn test_add_all_missing_source_dir() {
        let (root, payload) = setup();
        let mut md5 = manifest(&root, "md5");
        let report = payload.add_all(&root.path().join("absent"), &mut [&mut md5], 2);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].is_not_found());
    }

    #[test]
    fn test_octet_stream_sum() {
        let (_root, payload) = setup();
        fs::write(payload.path().join("a"), "12345").unwrap();
        fs::create_dir(payload.path().join("d")).unwrap();
        fs::write(payload.path().join("d/b"), "123").unwrap();
        assert_eq!(payload.octet_stream_sum().unwrap(), (8, 2));
    }

    #[test]
    fn test_relative_key() {
        let base = Path::new("/tmp/src");
        assert_eq!(
            relative_key(base, Path::new("/tmp/src/a/b.txt")).as_deref(),
            Some("a/b.txt")
        );
        assert_eq!(relative_key(base, base), None);
        assert_eq!(relative_key(base, Path::new("/elsewhere/x")), None);
    }
}
