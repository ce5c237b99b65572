//! Account identity and mailbox addresses

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use crate::crypto::sealed::{self, PUBLIC_KEY_SIZE};
use crate::crypto::CryptoError;

/// Public mailbox address of an account (its X25519 public key)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address([u8; PUBLIC_KEY_SIZE]);

impl Address {
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({}..)", &self.to_hex()[..8])
    }
}

/// Asymmetric identity of an account
///
/// Two identities are equal iff their public keys are equal.
#[derive(Clone)]
pub struct Identity {
    secret: [u8; PUBLIC_KEY_SIZE],
    address: Address,
}

impl Identity {
    pub fn generate() -> Self {
        let mut secret = [0u8; PUBLIC_KEY_SIZE];
        OsRng.fill_bytes(&mut secret);
        let identity = Self::from_secret(&secret);
        secret.zeroize();
        identity
    }

    pub fn from_secret(secret: &[u8; PUBLIC_KEY_SIZE]) -> Self {
        Self {
            secret: *secret,
            address: Address(sealed::public_key_for(secret)),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub(crate) fn secret_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.secret
    }

    /// Open a sealed box addressed to this identity
    pub fn open(&self, sealed_box: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        sealed::open(&self.secret, sealed_box)
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Identity {}

impl Drop for Identity {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("address", &self.address)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
