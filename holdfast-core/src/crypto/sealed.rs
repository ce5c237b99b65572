//! X25519 sealed boxes
//!
//! Anyone holding a recipient's public key can seal a short message that only
//! the matching secret key can open. Each seal uses a fresh ephemeral key:
//!
//! ```text
//! shared = X25519(ephemeral_secret, recipient_public)
//! kek    = HKDF-SHA256(salt = ephemeral_public || recipient_public, ikm = shared)
//! out    = ephemeral_public (32) || XChaCha20-Poly1305(kek, message, aad = ephemeral_public)
//! ```

use hkdf::Hkdf;
use rand::rngs::OsRng;
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::{Zeroize, Zeroizing};

use super::symmetric::{self, SymmetricKey, KEY_SIZE};
use super::{CryptoError, Result};

/// Size of an X25519 public or secret key.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of a sealed 32-byte message key.
pub const SEALED_KEY_SIZE: usize = PUBLIC_KEY_SIZE + symmetric::OVERHEAD + KEY_SIZE;

const SEAL_INFO: &[u8] = b"holdfast sealed box v1";

/// Derive the public key for a raw X25519 secret.
pub fn public_key_for(secret: &[u8; PUBLIC_KEY_SIZE]) -> [u8; PUBLIC_KEY_SIZE] {
    let secret = StaticSecret::from(*secret);
    PublicKey::from(&secret).to_bytes()
}

/// Seal `message` to `recipient`.
pub fn seal(recipient: &[u8; PUBLIC_KEY_SIZE], message: &[u8]) -> Result<Vec<u8>> {
    let recipient = PublicKey::from(*recipient);
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral);

    let shared = ephemeral.diffie_hellman(&recipient);
    if !shared.was_contributory() {
        return Err(CryptoError::Encryption(
            "recipient key is a low-order point".into(),
        ));
    }

    let kek = derive_kek(shared.as_bytes(), ephemeral_public.as_bytes(), recipient.as_bytes())?;
    let sealed = symmetric::encrypt(&kek, message, ephemeral_public.as_bytes())?;

    let mut out = Vec::with_capacity(PUBLIC_KEY_SIZE + sealed.len());
    out.extend_from_slice(ephemeral_public.as_bytes());
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Open a box produced by [`seal`] with the recipient's raw secret.
pub fn open(secret: &[u8; PUBLIC_KEY_SIZE], sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if sealed.len() < PUBLIC_KEY_SIZE + symmetric::OVERHEAD {
        return Err(CryptoError::Decryption);
    }
    let (ephemeral_bytes, body) = sealed.split_at(PUBLIC_KEY_SIZE);
    let mut ephemeral = [0u8; PUBLIC_KEY_SIZE];
    ephemeral.copy_from_slice(ephemeral_bytes);
    let ephemeral_public = PublicKey::from(ephemeral);

    let secret = StaticSecret::from(*secret);
    let recipient = PublicKey::from(&secret);
    let shared = secret.diffie_hellman(&ephemeral_public);
    if !shared.was_contributory() {
        return Err(CryptoError::Decryption);
    }

    let kek = derive_kek(shared.as_bytes(), ephemeral_public.as_bytes(), recipient.as_bytes())?;
    symmetric::decrypt(&kek, body, ephemeral_public.as_bytes())
}

fn derive_kek(shared: &[u8], ephemeral: &[u8], recipient: &[u8]) -> Result<SymmetricKey> {
    let mut salt = [0u8; PUBLIC_KEY_SIZE * 2];
    salt[..PUBLIC_KEY_SIZE].copy_from_slice(ephemeral);
    salt[PUBLIC_KEY_SIZE..].copy_from_slice(recipient);

    let hk = Hkdf::<Sha256>::new(Some(&salt), shared);
    let mut okm = [0u8; KEY_SIZE];
    let expanded = hk.expand(SEAL_INFO, &mut okm);
    if expanded.is_err() {
        okm.zeroize();
        return Err(CryptoError::KeyDerivation("HKDF expand failed".into()));
    }
    Ok(SymmetricKey::from_array(&mut okm))
}
