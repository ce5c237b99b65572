//! Encryption service - account file and cookie codecs
//!
//! Account files are sealed in two layers:
//!
//! ```text
//! file  = version (1) || XChaCha20-Poly1305(server_file_key, inner, aad = version)
//! inner = XChaCha20-Poly1305(argon2id(password, salt = server sub-key), record)
//! ```
//!
//! Without the server secret a file cannot even be brute-forced offline, and
//! without the password the server cannot read the account.

use uuid::Uuid;
use zeroize::Zeroizing;

use crate::crypto::kdf::{derive_password_key, derive_subkey};
use crate::crypto::symmetric::{self, SymmetricKey};
use crate::crypto::CryptoError;
use crate::domain::result::{Error, Result};
use crate::domain::{Account, AccountState, Argon2Params, ServerSecret};

/// Current account file format version
pub const FILE_FORMAT_VERSION: u8 = 1;

const FILE_KEY_PURPOSE: &str = "holdfast file outer layer v1";
const COOKIE_KEY_PURPOSE: &str = "holdfast cookie v1";
const PASSWORD_SALT_PURPOSE: &str = "holdfast password salt v1";
const COOKIE_AAD: &[u8] = b"holdfast-cookie";
const RECORD_AAD: &[u8] = b"holdfast-record";

/// Opaque session token handed to the account holder
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Cookie(Vec<u8>);

impl Cookie {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl std::fmt::Debug for Cookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cookie({} bytes)", self.0.len())
    }
}

/// Codec for account files and session cookies, bound to one server secret
pub struct EncryptionService {
    file_key: SymmetricKey,
    cookie_key: SymmetricKey,
    password_salt: SymmetricKey,
    argon2: Argon2Params,
}

impl EncryptionService {
    pub fn new(secret: &ServerSecret, argon2: Argon2Params) -> Result<Self> {
        let derive = |purpose: &str| {
            derive_subkey(secret.as_bytes(), purpose)
                .map_err(|e| Error::fatal(format!("server key derivation: {e}")))
        };
        Ok(Self {
            file_key: derive(FILE_KEY_PURPOSE)?,
            cookie_key: derive(COOKIE_KEY_PURPOSE)?,
            password_salt: derive(PASSWORD_SALT_PURPOSE)?,
            argon2,
        })
    }

    pub fn argon2_params(&self) -> &Argon2Params {
        &self.argon2
    }

    fn password_key(&self, password: &str) -> Result<SymmetricKey> {
        derive_password_key(password, self.password_salt.as_bytes(), &self.argon2)
            .map_err(|e| Error::fatal(format!("password key derivation: {e}")))
    }

    /// Seal an inner record under `password` and the server file key
    pub fn seal_file(&self, record: &[u8], password: &str) -> Result<Vec<u8>> {
        let password_key = self.password_key(password)?;
        let inner = symmetric::encrypt(&password_key, record, RECORD_AAD)
            .map_err(|e| Error::fatal(format!("inner layer: {e}")))?;

        let version = [FILE_FORMAT_VERSION];
        let outer = symmetric::encrypt(&self.file_key, &inner, &version)
            .map_err(|e| Error::fatal(format!("outer layer: {e}")))?;

        let mut file = Vec::with_capacity(1 + outer.len());
        file.push(FILE_FORMAT_VERSION);
        file.extend_from_slice(&outer);
        Ok(file)
    }

    /// Open a file produced by [`seal_file`](Self::seal_file)
    ///
    /// Any authentication failure, including a file from a different server,
    /// is reported as `InvalidCredential`.
    pub fn open_file(&self, file: &[u8], password: &str) -> Result<Zeroizing<Vec<u8>>> {
        let (version, outer) = file
            .split_first()
            .ok_or_else(|| Error::invalid_format("empty account file"))?;
        if *version != FILE_FORMAT_VERSION {
            return Err(Error::invalid_format(format!(
                "unsupported file format version {version}"
            )));
        }

        let inner = symmetric::decrypt(&self.file_key, outer, &[*version]).map_err(credential)?;
        let password_key = self.password_key(password)?;
        symmetric::decrypt(&password_key, &inner, RECORD_AAD).map_err(credential)
    }

    /// Encode `account` as a fresh file. Draws a new nonce on every call.
    pub fn encode_account<S: AccountState>(
        &self,
        account: &mut Account<S>,
        password: &str,
    ) -> Result<Vec<u8>> {
        let record = account.to_file_record()?;
        self.seal_file(&record, password)
    }

    pub fn decode_account<S: AccountState>(&self, file: &[u8], password: &str) -> Result<Account<S>> {
        let record = self.open_file(file, password)?;
        Account::from_file_record(&record)
    }

    /// Encrypt a session id into a cookie
    pub fn encode_cookie(&self, id: &Uuid) -> Result<Cookie> {
        let text = id.hyphenated().to_string();
        symmetric::encrypt(&self.cookie_key, text.as_bytes(), COOKIE_AAD)
            .map(Cookie)
            .map_err(|e| Error::fatal(format!("cookie encryption: {e}")))
    }

    /// Recover the session id; any failure is `BadCookie`
    pub fn decode_cookie(&self, cookie: &Cookie) -> Result<Uuid> {
        let text = symmetric::decrypt(&self.cookie_key, cookie.as_bytes(), COOKIE_AAD)
            .map_err(|_| Error::BadCookie)?;
        std::str::from_utf8(&text)
            .ok()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or(Error::BadCookie)
    }
}

fn credential(_: CryptoError) -> Error {
    Error::InvalidCredential
}
