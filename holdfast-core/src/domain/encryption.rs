//! Encryption domain models

use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Default Argon2id parameters
pub const DEFAULT_TIME_COST: u32 = 3;
pub const DEFAULT_MEMORY_COST: u32 = 65536; // 64 MiB
pub const DEFAULT_PARALLELISM: u32 = 4;

/// Size of the server secret in bytes
pub const SERVER_SECRET_SIZE: usize = 32;

/// Argon2id parameters for password key derivation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Argon2Params {
    pub time_cost: u32,
    pub memory_cost: u32,
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            time_cost: DEFAULT_TIME_COST,
            memory_cost: DEFAULT_MEMORY_COST,
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}

impl Argon2Params {
    /// Cheap parameters for tests and local demos. Not for production files.
    pub fn light() -> Self {
        Self {
            time_cost: 1,
            memory_cost: 1024,
            parallelism: 1,
        }
    }
}

/// Process-wide server secret
///
/// Every account file and cookie issued by a server is bound to this value;
/// rotating it invalidates all outstanding files.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ServerSecret {
    bytes: [u8; SERVER_SECRET_SIZE],
}

impl ServerSecret {
    pub fn generate() -> Self {
        let mut bytes = [0u8; SERVER_SECRET_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn from_bytes(bytes: [u8; SERVER_SECRET_SIZE]) -> Self {
        Self { bytes }
    }

    /// Parse a base64-encoded secret; `None` on bad encoding or length
    pub fn from_base64(encoded: &str) -> Option<Self> {
        let mut decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .ok()?;
        let secret = if decoded.len() == SERVER_SECRET_SIZE {
            let mut bytes = [0u8; SERVER_SECRET_SIZE];
            bytes.copy_from_slice(&decoded);
            Some(Self { bytes })
        } else {
            None
        };
        decoded.zeroize();
        secret
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SERVER_SECRET_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for ServerSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ServerSecret([REDACTED])")
    }
}
