//! Mailbox envelopes
//!
//! An envelope carries one serialized influence to an account that may be
//! offline. The payload is encrypted under a one-time message key, and that
//! key is sealed to the recipient's public key.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::identity::{Address, Identity};
use super::result::{Error, Result};
use crate::crypto::symmetric::{self, SymmetricKey};
use crate::crypto::sealed;

const PAYLOAD_AAD: &[u8] = b"holdfast-envelope";

/// Encrypted influence addressed to a single account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxEnvelope {
    wrapped_key: Vec<u8>,
    payload: Vec<u8>,
}

impl MailboxEnvelope {
    /// Seal `influence` so only the holder of `recipient` can read it
    pub fn wrap<I: Serialize>(influence: &I, recipient: &Address) -> Result<Self> {
        let plaintext = bincode::serialize(influence)
            .map_err(|e| Error::fatal(format!("influence could not be encoded: {e}")))?;

        let message_key = SymmetricKey::generate();
        let payload = symmetric::encrypt(&message_key, &plaintext, PAYLOAD_AAD)
            .map_err(|e| Error::fatal(format!("envelope payload: {e}")))?;
        let wrapped_key = sealed::seal(recipient.as_bytes(), message_key.as_bytes())
            .map_err(|e| Error::fatal(format!("envelope key: {e}")))?;
        drop(message_key);

        Ok(Self { wrapped_key, payload })
    }

    /// Recover the influence with the recipient's identity
    pub fn open<I: DeserializeOwned>(&self, identity: &Identity) -> Result<I> {
        let raw_key = identity
            .open(&self.wrapped_key)
            .map_err(|_| Error::bad_envelope("message key could not be unwrapped"))?;
        let message_key = SymmetricKey::from_bytes(&raw_key)
            .map_err(|e| Error::bad_envelope(e.to_string()))?;
        drop(raw_key);

        let plaintext = symmetric::decrypt(&message_key, &self.payload, PAYLOAD_AAD)
            .map_err(|_| Error::bad_envelope("payload could not be decrypted"))?;
        bincode::deserialize(&plaintext)
            .map_err(|e| Error::bad_envelope(format!("influence could not be decoded: {e}")))
    }

}
