//! Algorithm lookup and file hashing.

use std::fs::File;
use std::path::Path;

use md5::Md5;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use tracing::debug;

use crate::algorithm::{digest_reader, ChecksumAlgorithm, DigestHasher};
use crate::error::{ChecksumError, ChecksumResult};

/// Canonical names accepted by [`StandardProvider`].
pub const SUPPORTED_ALGORITHMS: &[&str] = &["md5", "sha1", "sha224", "sha256", "sha384", "sha512"];

const MD5: ChecksumAlgorithm = ChecksumAlgorithm::new("md5", DigestHasher::<Md5>::boxed);
const SHA1: ChecksumAlgorithm = ChecksumAlgorithm::new("sha1", DigestHasher::<Sha1>::boxed);
const SHA224: ChecksumAlgorithm = ChecksumAlgorithm::new("sha224", DigestHasher::<Sha224>::boxed);
const SHA256: ChecksumAlgorithm = ChecksumAlgorithm::new("sha256", DigestHasher::<Sha256>::boxed);
const SHA384: ChecksumAlgorithm = ChecksumAlgorithm::new("sha384", DigestHasher::<Sha384>::boxed);
const SHA512: ChecksumAlgorithm = ChecksumAlgorithm::new("sha512", DigestHasher::<Sha512>::boxed);

/// Resolve an algorithm name (case-insensitive) against the built-in table.
pub fn lookup(name: &str) -> ChecksumResult<ChecksumAlgorithm> {
    match name.trim().to_ascii_lowercase().as_str() {
        "md5" => Ok(MD5),
        "sha1" => Ok(SHA1),
        "sha224" => Ok(SHA224),
        "sha256" => Ok(SHA256),
        "sha384" => Ok(SHA384),
        "sha512" => Ok(SHA512),
        _ => Err(ChecksumError::UnsupportedAlgorithm {
            name: name.to_string(),
        }),
    }
}

/// Checksum capability consumed by bags and manifests.
///
/// Implementations must be stateless (or internally synchronized): a single
/// provider is shared by every manifest of a bag and may be called from
/// several ingest workers at once. Errors are surfaced as-is, never retried.
pub trait ChecksumProvider: Send + Sync {
    /// Resolve an algorithm name to its digest constructor.
    fn resolve(&self, name: &str) -> ChecksumResult<ChecksumAlgorithm>;

    /// Compute the hex digest of the file at `path`.
    fn digest_file(&self, path: &Path, algorithm: &ChecksumAlgorithm) -> ChecksumResult<String> {
        let file = File::open(path).map_err(|source| ChecksumError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let hex = digest_reader(file, algorithm).map_err(|source| ChecksumError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), algorithm = algorithm.name(), "hashed file");
        Ok(hex)
    }
}

/// The built-in registry: md5, sha1 and the sha2 family.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardProvider;

impl ChecksumProvider for StandardProvider {
    fn resolve(&self, name: &str) -> ChecksumResult<ChecksumAlgorithm> {
        lookup(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const QUICK_FOX: &str = "The quick brown fox jumps over the lazy dog";

    fn vectors() -> Vec<(&'static str, &'static str)> {
        vec![
            ("md5", "9e107d9d372bb6826bd81d3542a419d6"),
            ("sha1", "2fd4e1c67a2d28fced849ee1bb76e7391b93eb12"),
            (
                "sha224",
                "730e109bd7a8a32b1cb9d9a09aa2325d2430587ddbc0c38bad911525",
            ),
            (
                "sha256",
                "d7a8fbb307d7809469ca9abcb0082e4f8d5651e46d3cdb762d02d0bf37c9e592",
            ),
            (
                "sha384",
                "ca737f1014a48f4c0b6dd43cb177b0afd9e5169367544c494011e3317dbf9a509cb1e5dc1e85a941bbee3d7f2afbc9b1",
            ),
            (
                "sha512",
                "07e547d9586f6a73f73fbac0435ed76951218fb7d0c8d788a309d785436bbb642e93a252a954f23912547d1e8a3b5ed6e1bfd7097821233fa0538f3db854fee6",
            ),
        ]
    }

    #[test]
    fn test_digest_file_known_vectors() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(QUICK_FOX.as_bytes()).unwrap();
        file.flush().unwrap();

        let provider = StandardProvider;
        for (name, expected) in vectors() {
            let algo = provider.resolve(name).unwrap();
            let actual = provider.digest_file(file.path(), &algo).unwrap();
            assert_eq!(actual, expected, "digest mismatch for {name}");
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        for name in ["MD5", "Sha1", "SHA256", " sha512 "] {
            let algo = lookup(name).unwrap();
            assert_eq!(algo.name(), name.trim().to_ascii_lowercase());
        }
    }

    #[test]
    fn test_every_supported_name_resolves() {
        for name in SUPPORTED_ALGORITHMS {
            assert_eq!(lookup(name).unwrap().name(), *name);
        }
    }

    #[test]
    fn test_unknown_algorithm() {
        let err = lookup("sha404").unwrap_err();
        assert!(err.is_unsupported());
        assert!(err.to_string().contains("sha404"));
    }

    #[test]
    fn test_digest_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let algo = lookup("md5").unwrap();
        let err = StandardProvider
            .digest_file(&dir.path().join("absent.txt"), &algo)
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
