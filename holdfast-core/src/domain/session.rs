//! Session state machine
//!
//! A session is the server-side view of one logged-in account between login
//! (or registration) and confirmation. It owns two decoded copies of the
//! account: the original as loaded, and the current working copy.
//!
//! ```text
//! Idle <-> Modified -> AwaitingConfirmation -> Confirmed
//!   \         \                \
//!    `---------`----------------`--> Closed (expiry, shred, prune)
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::account::{Account, AccountHash, AccountState};
use super::action::Action;
use super::envelope::MailboxEnvelope;
use super::identity::Address;
use super::result::{Error, Result};
use crate::services::EncryptionService;

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Modified,
    AwaitingConfirmation,
    Confirmed,
    Closed,
}

/// Everything the orchestrator needs to commit a confirmed save
pub struct ConfirmedSave<S: AccountState> {
    /// Hash of the version the session was opened from; `None` for new accounts
    pub previous: Option<AccountHash>,
    pub confirmed: AccountHash,
    pub actions: Vec<Box<dyn Action<S>>>,
}

pub struct Session<S: AccountState> {
    id: Uuid,
    expiry: DateTime<Utc>,
    state: SessionState,
    original: Option<Account<S>>,
    current: Option<Account<S>>,
    incoming: Vec<MailboxEnvelope>,
    presence: AccountHash,
    address: Address,
    released: bool,
}

impl<S: AccountState> Session<S> {
    /// Start a session for a brand-new account
    pub fn register(account: Account<S>, now: DateTime<Utc>, duration: Duration) -> Result<Self> {
        let presence = account.canonical_hash()?;
        Ok(Self {
            id: Uuid::new_v4(),
            expiry: now + duration,
            state: SessionState::Modified,
            address: account.address(),
            original: None,
            current: Some(account),
            incoming: Vec::new(),
            presence,
            released: false,
        })
    }

    /// Start a session from an account file
    ///
    /// The file is decoded twice so the original and working copies never
    /// share state.
    pub fn open(
        codec: &EncryptionService,
        file: &[u8],
        password: &str,
        now: DateTime<Utc>,
        duration: Duration,
    ) -> Result<Self> {
        let original = codec.decode_account::<S>(file, password)?;
        let current = codec.decode_account::<S>(file, password)?;
        let presence = original.canonical_hash()?;
        Ok(Self {
            id: Uuid::new_v4(),
            expiry: now + duration,
            state: SessionState::Idle,
            address: original.address(),
            original: Some(original),
            current: Some(current),
            incoming: Vec::new(),
            presence,
            released: false,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Hash under which this session holds the account online
    pub fn presence_hash(&self) -> AccountHash {
        self.presence
    }

    pub fn is_registration(&self) -> bool {
        self.original.is_none() && self.state != SessionState::Confirmed
    }

    /// Last computed state, without re-checking expiry or hashes
    pub fn last_state(&self) -> SessionState {
        self.state
    }

    pub fn incoming_len(&self) -> usize {
        self.incoming.len()
    }

    /// Fail if the session can no longer be used, closing it on expiry
    pub fn check(&mut self, now: DateTime<Utc>) -> Result<()> {
        match self.state {
            SessionState::Confirmed => Err(Error::SessionConfirmed),
            SessionState::Closed => Err(Error::SessionExpired),
            _ if now > self.expiry => {
                debug!(session = %self.id, "session expired");
                self.state = SessionState::Closed;
                Err(Error::SessionExpired)
            }
            _ => Ok(()),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            SessionState::Closed => true,
            SessionState::Confirmed => false,
            _ => now > self.expiry,
        }
    }

    /// Recompute Idle/Modified from the hashes; AwaitingConfirmation sticks
    pub fn touch_state(&mut self, now: DateTime<Utc>) -> Result<SessionState> {
        self.check(now)?;
        if self.state == SessionState::AwaitingConfirmation {
            return Ok(self.state);
        }

        let current = self.current()?.canonical_hash()?;
        self.state = match &self.original {
            Some(original) if original.canonical_hash()? == current => SessionState::Idle,
            _ => SessionState::Modified,
        };
        Ok(self.state)
    }

    /// Mutable access to the working copy
    pub fn account_mut(&mut self, now: DateTime<Utc>) -> Result<&mut Account<S>> {
        self.check(now)?;
        self.current
            .as_mut()
            .ok_or_else(|| Error::fatal("open session has no working copy"))
    }

    /// Apply polled envelopes to the working copy.
    ///
    /// Envelopes that cannot be consumed are dropped; the rest are kept so
    /// they can be returned to the mailbox if the session is abandoned.
    pub fn deliver(&mut self, envelopes: Vec<MailboxEnvelope>) -> usize {
        let Some(account) = self.current.as_mut() else {
            return 0;
        };

        let mut applied = 0;
        for envelope in envelopes {
            match account.consume(&envelope) {
                Ok(()) => {
                    self.incoming.push(envelope);
                    applied += 1;
                }
                Err(e) => warn!(session = %self.id, error = %e, "dropping undeliverable envelope"),
            }
        }
        applied
    }

    /// Produce the next account file and wait for the holder to confirm it
    pub fn initiate_save_attempt(
        &mut self,
        codec: &EncryptionService,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<u8>> {
        match self.touch_state(now)? {
            SessionState::Idle => return Err(Error::NotChanged),
            SessionState::AwaitingConfirmation => return Err(Error::AlreadyAwaitingConfirmation),
            _ => {}
        }

        let account = self
            .current
            .as_mut()
            .ok_or_else(|| Error::fatal("open session has no working copy"))?;
        let file = codec.encode_account(account, password)?;
        self.state = SessionState::AwaitingConfirmation;
        debug!(session = %self.id, "save issued, awaiting confirmation");
        Ok(file)
    }

    /// Accept the holder's proof that they stored the issued file
    ///
    /// A mismatched or undecodable file leaves the session awaiting.
    pub fn confirm_save(
        &mut self,
        codec: &EncryptionService,
        file: &[u8],
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<ConfirmedSave<S>> {
        self.check(now)?;
        if self.state != SessionState::AwaitingConfirmation {
            return Err(Error::NotAwaitingConfirmation);
        }

        let decoded = codec.decode_account::<S>(file, password)?;
        let expected = self.current()?.canonical_hash()?;
        if decoded.canonical_hash()? != expected {
            return Err(Error::invalid_format(
                "confirmed file does not match the pending save",
            ));
        }
        let previous = match &self.original {
            Some(original) => Some(original.canonical_hash()?),
            None => None,
        };

        self.state = SessionState::Confirmed;
        self.incoming.clear();
        self.original = None;
        let actions = self
            .current
            .take()
            .map(|mut account| account.take_actions())
            .unwrap_or_default();

        debug!(session = %self.id, actions = actions.len(), "save confirmed");
        Ok(ConfirmedSave {
            previous,
            confirmed: expected,
            actions,
        })
    }

    /// Close the session, handing back the envelopes it had consumed.
    /// Calling this more than once returns nothing the second time.
    pub fn close(&mut self) -> Vec<MailboxEnvelope> {
        self.state = SessionState::Closed;
        std::mem::take(&mut self.incoming)
    }

    /// Mark the presence and mail held by this session as given back.
    /// Returns `false` if that already happened.
    pub fn release(&mut self) -> bool {
        !std::mem::replace(&mut self.released, true)
    }

    fn current(&self) -> Result<&Account<S>> {
        self.current
            .as_ref()
            .ok_or_else(|| Error::fatal("open session has no working copy"))
    }
}
