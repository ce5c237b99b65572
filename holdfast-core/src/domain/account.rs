//! Account model
//!
//! An account is application state bound to an asymmetric identity. Its
//! canonical hash identifies one exact version of it; the hash registry only
//! ever accepts files whose hash it holds.

use std::collections::BTreeMap;
use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use super::action::Action;
use super::envelope::MailboxEnvelope;
use super::identity::{Address, Identity};
use super::influence::Influence;
use super::result::{Error, Result};
use crate::crypto::{CanonicalHasher, DIGEST_SIZE};

/// Size of the per-save random nonce stored in every account file
pub const ACCOUNT_NONCE_SIZE: usize = 32;

const IDENTITY_FIELD: &str = "$identity";
const INFLUENCES_FIELD: &str = "$influences";
const RESERVED_PREFIX: char = '$';

/// Application-defined account state
///
/// Implementors declare which fields take part in the canonical hash. A field
/// left out of `hashed_fields` is still persisted but changing it does not
/// produce a new account version.
pub trait AccountState: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable identifier of the account type, written into every file
    const TYPE_TAG: &'static str;

    /// The influences this account type understands
    type Influence: Influence<Self>;

    fn hashed_fields(&self, fields: &mut FieldSet);
}

/// Named, order-independent collection of hashed fields
#[derive(Debug, Default)]
pub struct FieldSet {
    entries: BTreeMap<String, Vec<u8>>,
    error: Option<String>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field. Identifiers must be unique and must not start with `$`.
    pub fn put<T: Serialize + ?Sized>(&mut self, id: &str, value: &T) -> &mut Self {
        if self.error.is_some() {
            return self;
        }
        if id.starts_with(RESERVED_PREFIX) {
            self.error = Some(format!("field id '{id}' uses the reserved '$' prefix"));
            return self;
        }
        if self.entries.contains_key(id) {
            self.error = Some(format!("field id '{id}' declared twice"));
            return self;
        }
        match bincode::serialize(value) {
            Ok(bytes) => {
                self.entries.insert(id.to_string(), bytes);
            }
            Err(e) => self.error = Some(format!("field '{id}' could not be encoded: {e}")),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn into_entries(self) -> Result<BTreeMap<String, Vec<u8>>> {
        match self.error {
            Some(e) => Err(Error::fatal(e)),
            None => Ok(self.entries),
        }
    }
}

/// SHA-512 canonical hash of one account version
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountHash([u8; DIGEST_SIZE]);

impl AccountHash {
    pub fn from_bytes(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; DIGEST_SIZE] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for AccountHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for AccountHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountHash({}..)", &self.to_hex()[..12])
    }
}

/// An account: identity, application state, and pending actions
pub struct Account<S: AccountState> {
    identity: Identity,
    state: S,
    nonce: [u8; ACCOUNT_NONCE_SIZE],
    influences: u64,
    actions: Vec<Box<dyn Action<S>>>,
}

/// Serialized inner plaintext of an account file
#[derive(Serialize)]
struct FileRecordRef<'a, S> {
    type_tag: &'a str,
    secret: &'a [u8; 32],
    nonce: &'a [u8; ACCOUNT_NONCE_SIZE],
    influences: u64,
    state: &'a S,
}

#[derive(Deserialize)]
struct FileRecord<S> {
    type_tag: String,
    secret: [u8; 32],
    nonce: [u8; ACCOUNT_NONCE_SIZE],
    influences: u64,
    state: S,
}

#[derive(Deserialize)]
struct FileRecordHeader {
    type_tag: String,
}

impl<S: AccountState> Account<S> {
    /// Create a fresh account with a new identity
    pub fn create(state: S) -> Self {
        let mut nonce = [0u8; ACCOUNT_NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);
        Self {
            identity: Identity::generate(),
            state,
            nonce,
            influences: 0,
            actions: Vec::new(),
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    pub fn address(&self) -> Address {
        self.identity.address()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Number of influences this account has absorbed over its lifetime
    pub fn influences(&self) -> u64 {
        self.influences
    }

    /// Queue an action to run once the next save is confirmed
    pub fn add_action<A: Action<S> + 'static>(&mut self, action: A) {
        self.actions.push(Box::new(action));
    }

    pub fn pending_actions(&self) -> usize {
        self.actions.len()
    }

    pub(crate) fn take_actions(&mut self) -> Vec<Box<dyn Action<S>>> {
        std::mem::take(&mut self.actions)
    }

    /// Compute the canonical hash of this version.
    ///
    /// The identity and the influence counter are always included. The file
    /// nonce and pending actions are not.
    pub fn canonical_hash(&self) -> Result<AccountHash> {
        let mut fields = FieldSet::new();
        self.state.hashed_fields(&mut fields);
        let mut entries = fields.into_entries()?;

        entries.insert(
            IDENTITY_FIELD.to_string(),
            self.identity.address().as_bytes().to_vec(),
        );
        entries.insert(
            INFLUENCES_FIELD.to_string(),
            self.influences.to_le_bytes().to_vec(),
        );

        let mut hasher = CanonicalHasher::new(S::TYPE_TAG);
        for (id, value) in &entries {
            hasher.field(id, value);
        }
        Ok(AccountHash(hasher.finish()))
    }

    /// Open an envelope addressed to this account and apply its influence
    pub fn consume(&mut self, envelope: &MailboxEnvelope) -> Result<()> {
        let influence: S::Influence = envelope.open(&self.identity)?;
        influence.apply_to(self)?;
        self.influences = self.influences.saturating_add(1);
        Ok(())
    }

    /// Encode the inner file plaintext, drawing a fresh nonce first
    pub(crate) fn to_file_record(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        OsRng.fill_bytes(&mut self.nonce);
        let record = FileRecordRef {
            type_tag: S::TYPE_TAG,
            secret: self.identity.secret_bytes(),
            nonce: &self.nonce,
            influences: self.influences,
            state: &self.state,
        };
        bincode::serialize(&record)
            .map(Zeroizing::new)
            .map_err(|e| Error::fatal(format!("account could not be encoded: {e}")))
    }

    pub(crate) fn from_file_record(bytes: &[u8]) -> Result<Self> {
        let header: FileRecordHeader = bincode::deserialize(bytes)
            .map_err(|e| Error::invalid_format(format!("unreadable record header: {e}")))?;
        if header.type_tag != S::TYPE_TAG {
            return Err(Error::invalid_format(format!(
                "account type '{}' does not match '{}'",
                header.type_tag,
                S::TYPE_TAG
            )));
        }

        let mut record: FileRecord<S> = bincode::deserialize(bytes)
            .map_err(|e| Error::invalid_format(format!("unreadable account record: {e}")))?;
        let identity = Identity::from_secret(&record.secret);
        record.secret.zeroize();

        Ok(Self {
            identity,
            state: record.state,
            nonce: record.nonce,
            influences: record.influences,
            actions: Vec::new(),
        })
    }
}

impl<S: AccountState + fmt::Debug> fmt::Debug for Account<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.identity.address())
            .field("state", &self.state)
            .field("influences", &self.influences)
            .field("pending_actions", &self.actions.len())
            .finish()
    }
}
