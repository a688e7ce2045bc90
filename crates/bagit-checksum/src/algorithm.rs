//! Streaming digest accumulators and the named algorithm handle.

use std::fmt;
use std::io::{self, Read};

use sha2::Digest;

/// Read buffer used for streaming digests.
pub(crate) const CHUNK_SIZE: usize = 64 * 1024;

/// A stateful digest accumulator.
///
/// One instance hashes exactly one byte stream. Instances are never reused or
/// shared between files; ask the [`ChecksumAlgorithm`] for a fresh one.
pub trait Hasher: Send {
    /// Feed bytes into the digest.
    fn update(&mut self, data: &[u8]);

    /// Consume the accumulator and return the lower-case hex digest.
    fn finalize_hex(self: Box<Self>) -> String;
}

/// Constructor for a fresh [`Hasher`].
pub type HasherCtor = fn() -> Box<dyn Hasher>;

/// Adapter from any RustCrypto digest to [`Hasher`].
pub(crate) struct DigestHasher<D>(D);

impl<D> DigestHasher<D>
where
    D: Digest + Send + 'static,
{
    pub(crate) fn boxed() -> Box<dyn Hasher> {
        Box::new(Self(D::new()))
    }
}

impl<D> Hasher for DigestHasher<D>
where
    D: Digest + Send,
{
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finalize_hex(self: Box<Self>) -> String {
        hex::encode(self.0.finalize())
    }
}

/// A named checksum algorithm: canonical name plus digest constructor.
///
/// Cheap to copy and safe to share across threads; the state lives in the
/// [`Hasher`] values it creates.
#[derive(Clone, Copy)]
pub struct ChecksumAlgorithm {
    name: &'static str,
    ctor: HasherCtor,
}

impl ChecksumAlgorithm {
    pub const fn new(name: &'static str, ctor: HasherCtor) -> Self {
        Self { name, ctor }
    }

    /// Canonical lower-case name, as used in manifest file names.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Create a fresh digest accumulator.
    pub fn new_hasher(&self) -> Box<dyn Hasher> {
        (self.ctor)()
    }
}

impl fmt::Debug for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ChecksumAlgorithm").field(&self.name).finish()
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl PartialEq for ChecksumAlgorithm {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ChecksumAlgorithm {}

/// Hash everything `reader` yields.
pub fn digest_reader<R: Read>(mut reader: R, algorithm: &ChecksumAlgorithm) -> io::Result<String> {
    let mut hasher = algorithm.new_hasher();
    let mut buf = vec![0_u8; CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }

    Ok(hasher.finalize_hex())
}

/// Hash an in-memory buffer.
pub fn digest_bytes(bytes: &[u8], algorithm: &ChecksumAlgorithm) -> String {
    let mut hasher = algorithm.new_hasher();
    hasher.update(bytes);
    hasher.finalize_hex()
}
