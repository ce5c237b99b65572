//! Storage adapter port
//!
//! Four independent pools back the protocol. Each may live in a different
//! store; the orchestrator only sees these traits. Implementations must be
//! safe to call from many threads and report store failures as
//! `Error::AdapterFailure`.

use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{AccountHash, AccountState, Address, MailboxEnvelope, Session};

/// Shared handle to a live session; the mutex serializes operations on it
pub type SessionHandle<S> = Arc<Mutex<Session<S>>>;

/// Registry of every account version the server will accept
pub trait HashRegistry: Send + Sync {
    fn insert_hash(&self, hash: &AccountHash) -> Result<()>;

    fn remove_hash(&self, hash: &AccountHash) -> Result<()>;

    /// `Ok(())` if registered, otherwise `Error::NotValid`
    fn check_hash(&self, hash: &AccountHash) -> Result<()>;

    fn hash_count(&self) -> Result<u64>;

    fn export_hashes(&self) -> Result<Vec<AccountHash>>;

    /// Swap `old` for `new`; `Error::NotValid` if `old` is not registered.
    /// Backends that can do this atomically should.
    fn replace_hash(&self, old: &AccountHash, new: &AccountHash) -> Result<()> {
        self.check_hash(old)?;
        self.insert_hash(new)?;
        self.remove_hash(old)
    }
}

/// Set of account versions that currently have a live session
pub trait PresenceSet: Send + Sync {
    /// Atomic test-and-set; `Error::AlreadyOnline` if already present
    fn mark_online(&self, hash: &AccountHash) -> Result<()>;

    fn is_online(&self, hash: &AccountHash) -> Result<bool>;

    /// Idempotent
    fn mark_offline(&self, hash: &AccountHash) -> Result<()>;
}

/// Live sessions, keyed by session id
pub trait SessionPool<S: AccountState>: Send + Sync {
    fn put_session(&self, id: Uuid, session: SessionHandle<S>) -> Result<()>;

    fn contains_session(&self, id: &Uuid) -> Result<bool>;

    /// `Error::SessionExpired` if no such session exists
    fn get_session(&self, id: &Uuid) -> Result<SessionHandle<S>>;

    /// Idempotent
    fn remove_session(&self, id: &Uuid) -> Result<()>;

    /// Snapshot of every live session
    fn sessions(&self) -> Result<Vec<SessionHandle<S>>>;
}

/// Per-address queues of undelivered envelopes
pub trait MailboxPool: Send + Sync {
    fn add_envelope(&self, envelope: MailboxEnvelope, address: &Address) -> Result<()>;

    fn add_envelopes(&self, envelopes: Vec<MailboxEnvelope>, address: &Address) -> Result<()> {
        for envelope in envelopes {
            self.add_envelope(envelope, address)?;
        }
        Ok(())
    }

    /// Remove and return everything queued for `address`, oldest first
    fn poll_envelopes(&self, address: &Address) -> Result<Vec<MailboxEnvelope>>;

    /// Put polled envelopes back ahead of anything queued since
    fn requeue_envelopes(&self, envelopes: Vec<MailboxEnvelope>, address: &Address) -> Result<()> {
        let newer = self.poll_envelopes(address)?;
        self.add_envelopes(envelopes, address)?;
        self.add_envelopes(newer, address)
    }
}

/// Everything the orchestrator needs from storage
pub trait Adapter<S: AccountState>:
    HashRegistry + PresenceSet + SessionPool<S> + MailboxPool
{
}

impl<S, T> Adapter<S> for T
where
    S: AccountState,
    T: HashRegistry + PresenceSet + SessionPool<S> + MailboxPool,
{
}
