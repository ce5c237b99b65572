//! Key derivation
//!
//! Password keys use Argon2id; server sub-keys are expanded from the server
//! secret with HKDF-SHA256 so a single stored secret can serve several roles.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use super::symmetric::{SymmetricKey, KEY_SIZE};
use super::{CryptoError, Result};
use crate::domain::Argon2Params;

/// Derive a 256-bit key from `password` using Argon2id.
pub fn derive_password_key(
    password: &str,
    salt: &[u8],
    params: &Argon2Params,
) -> Result<SymmetricKey> {
    let argon2_params = argon2::Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptoError::KeyDerivation(format!("invalid argon2 params: {e}")))?;

    let argon2 = argon2::Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2_params,
    );

    let mut key = [0u8; KEY_SIZE];
    if let Err(e) = argon2.hash_password_into(password.as_bytes(), salt, &mut key) {
        key.zeroize();
        return Err(CryptoError::KeyDerivation(format!("argon2: {e}")));
    }
    Ok(SymmetricKey::from_array(&mut key))
}

/// Expand a purpose-bound sub-key from a master secret.
pub fn derive_subkey(master: &[u8], purpose: &str) -> Result<SymmetricKey> {
    let hk = Hkdf::<Sha256>::new(None, master);
    let mut okm = [0u8; KEY_SIZE];
    if hk.expand(purpose.as_bytes(), &mut okm).is_err() {
        okm.zeroize();
        return Err(CryptoError::KeyDerivation("HKDF expand failed".into()));
    }
    Ok(SymmetricKey::from_array(&mut okm))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_key_is_deterministic() {
        let params = Argon2Params::light();
        let a = derive_password_key("hunter2", b"some salt value", &params).unwrap();
        let b = derive_password_key("hunter2", b"some salt value", &params).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_password_key_depends_on_password_and_salt() {
        let params = Argon2Params::light();
        let base = derive_password_key("hunter2", b"some salt value", &params).unwrap();
        let other_pw = derive_password_key("hunter3", b"some salt value", &params).unwrap();
        let other_salt = derive_password_key("hunter2", b"another salt!!!", &params).unwrap();
        assert_ne!(base.as_bytes(), other_pw.as_bytes());
        assert_ne!(base.as_bytes(), other_salt.as_bytes());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = Argon2Params {
            time_cost: 0,
            ..Argon2Params::light()
        };
        assert!(matches!(
            derive_password_key("pw", b"some salt value", &params),
            Err(CryptoError::KeyDerivation(_))
        ));
    }

    #[test]
    fn test_subkeys_are_purpose_bound() {
        let master = [3u8; 32];
        let a = derive_subkey(&master, "file").unwrap();
        let b = derive_subkey(&master, "cookie").unwrap();
        let c = derive_subkey(&master, "file").unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
        assert_eq!(a.as_bytes(), c.as_bytes());
    }
}
