//! Error types for the crypto layer

use thiserror::Error;

/// Failures raised by the cryptographic primitives.
///
/// These never leave the crate as-is: the codecs map them onto the
/// protocol taxonomy in [`crate::domain::result::Error`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: invalid ciphertext or key")]
    Decryption,

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),
}

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;
