//! Cryptographic primitives
//!
//! Thin wrappers over audited crates. Nothing in here knows about accounts,
//! sessions or storage; the domain and services layers compose these.
//!
//! - **digest**: SHA-512 canonical field hashing
//! - **symmetric**: XChaCha20-Poly1305 AEAD with a random 24-byte nonce prefix
//! - **sealed**: X25519 sealed boxes for wrapping per-message keys
//! - **kdf**: Argon2id password keys and HKDF sub-keys

pub mod digest;
mod error;
pub mod kdf;
pub mod sealed;
pub mod symmetric;

pub use digest::{CanonicalHasher, DIGEST_SIZE};
pub use error::{CryptoError, Result};
pub use symmetric::SymmetricKey;
