//! BagIt bag creation, reading and verification.
//!
//! A bag is a directory holding a `data/` payload, one manifest of payload
//! digests per checksum algorithm, optional tag manifests covering the
//! bag's own metadata files, and a set of `label: value` tag files.
//!
//! - [`Bag`]: create, read, add payload and tag files, save, verify
//! - [`Manifest`]: `path → digest` ledger for one algorithm
//! - [`Payload`]: streaming copy into `data/` with multi-algorithm hashing
//! - [`TagFile`]: wrapped `label: value` metadata files
//!
//! # Quick Start
//!
//! ```no_run
//! use bagit_core::{Bag, ManifestKind};
//!
//! # fn example() -> bagit_core::BagResult<()> {
//! let mut bag = Bag::create("/archive", "bag-0001", &["md5", "sha256"], true)?;
//! bag.add_dir("/incoming/scans")?;
//! bag.add_tagfile("bag-info.txt")?
//!     .add_field("Source-Organization", "Example Library")?;
//! bag.save()?;
//!
//! let reopened = Bag::read("/archive/bag-0001", &["bagit.txt", "bag-info.txt"])?;
//! let manifest = reopened.manifest("sha256", ManifestKind::Payload);
//! println!("{} payload files", manifest.map(|m| m.len()).unwrap_or(0));
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! [`BagConfig::from_env`] reads:
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `BAGIT_ALGORITHMS` | Comma-separated checksum algorithms (default: `md5`) |
//! | `BAGIT_TAG_MANIFESTS` | Write tag manifests (`1`/`true`) |
//! | `BAGIT_WORKERS` | Directory ingest concurrency (default: 8) |

pub mod bag;
pub mod config;
pub mod error;
pub mod manifest;
pub mod payload;
pub mod tagfile;

// Re-export main types
pub use bag::{Bag, BagState, BAGIT_TXT, BAGIT_VERSION, BAG_INFO_TXT, TAG_FILE_ENCODING};
pub use config::BagConfig;
pub use error::{BagError, BagResult, ParseIssue};
pub use manifest::{algorithm_from_name, parse_entries, Manifest, ManifestKind};
pub use payload::{AddAllReport, FileDigests, Payload, DEFAULT_WORKERS, PAYLOAD_DIR};
pub use tagfile::{format_field, parse_fields, TagField, TagFile, TAG_LINE_WIDTH};

// Checksum capability
pub use bagit_checksum::{ChecksumAlgorithm, ChecksumError, ChecksumProvider, StandardProvider};
