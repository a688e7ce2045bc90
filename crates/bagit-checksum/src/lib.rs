//! Checksum algorithm registry for BagIt manifests.
//!
//! Resolves an algorithm name to a digest constructor and computes file
//! digests as lower-case hex. The registry is a plain value implementing
//! [`ChecksumProvider`], so callers inject it where it is needed instead of
//! reaching for a process-wide table.
//!
//! # Supported algorithms
//!
//! | Name | Digest length (hex chars) |
//! |------|---------------------------|
//! | `md5` | 32 |
//! | `sha1` | 40 |
//! | `sha224` | 56 |
//! | `sha256` | 64 |
//! | `sha384` | 96 |
//! | `sha512` | 128 |
//!
//! Names are matched case-insensitively.
//!
//! # Example
//!
//! ```no_run
//! use bagit_checksum::{ChecksumProvider, StandardProvider};
//!
//! # fn example() -> Result<(), bagit_checksum::ChecksumError> {
//! let provider = StandardProvider;
//! let sha256 = provider.resolve("SHA256")?;
//! let hex = provider.digest_file("data/hello.txt".as_ref(), &sha256)?;
//! println!("{} {}", hex, sha256.name());
//! # Ok(())
//! # }
//! ```

pub mod algorithm;
pub mod error;
pub mod provider;

pub use algorithm::{digest_bytes, digest_reader, ChecksumAlgorithm, Hasher, HasherCtor};
pub use error::{ChecksumError, ChecksumResult};
pub use provider::{lookup, ChecksumProvider, StandardProvider, SUPPORTED_ALGORITHMS};
