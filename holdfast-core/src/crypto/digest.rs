//! SHA-512 canonical hashing
//!
//! Fields are fed as `len(id) || id || len(value) || value` with u64
//! little-endian lengths, so no two distinct field sequences collide by
//! concatenation.

use sha2::{Digest, Sha512};

/// Size of a SHA-512 digest in bytes.
pub const DIGEST_SIZE: usize = 64;

/// Incremental hasher over a type tag and a sequence of named fields.
///
/// Callers are responsible for feeding fields in a stable order.
pub struct CanonicalHasher {
    inner: Sha512,
}

impl CanonicalHasher {
    pub fn new(type_tag: &str) -> Self {
        let mut hasher = Self { inner: Sha512::new() };
        hasher.write(type_tag.as_bytes());
        hasher
    }

    pub fn field(&mut self, id: &str, value: &[u8]) -> &mut Self {
        self.write(id.as_bytes());
        self.write(value);
        self
    }

    pub fn finish(self) -> [u8; DIGEST_SIZE] {
        let mut out = [0u8; DIGEST_SIZE];
        out.copy_from_slice(&self.inner.finalize());
        out
    }

    fn write(&mut self, bytes: &[u8]) {
        self.inner.update((bytes.len() as u64).to_le_bytes());
        self.inner.update(bytes);
    }
}
