//! In-memory storage adapter
//!
//! Each pool sits behind its own lock so operations on different pools never
//! contend. The hash registry is pluggable: it defaults to an in-memory set
//! and can be swapped for a persistent backend.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{AccountHash, AccountState, Address, MailboxEnvelope};
use crate::ports::{HashRegistry, MailboxPool, PresenceSet, SessionHandle, SessionPool};

/// Volatile hash registry
#[derive(Debug, Default)]
pub struct MemoryHashRegistry {
    hashes: RwLock<HashSet<AccountHash>>,
}

impl MemoryHashRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HashRegistry for MemoryHashRegistry {
    fn insert_hash(&self, hash: &AccountHash) -> Result<()> {
        self.hashes.write().insert(*hash);
        Ok(())
    }

    fn remove_hash(&self, hash: &AccountHash) -> Result<()> {
        self.hashes.write().remove(hash);
        Ok(())
    }

    fn check_hash(&self, hash: &AccountHash) -> Result<()> {
        if self.hashes.read().contains(hash) {
            Ok(())
        } else {
            Err(Error::NotValid)
        }
    }

    fn hash_count(&self) -> Result<u64> {
        Ok(self.hashes.read().len() as u64)
    }

    fn export_hashes(&self) -> Result<Vec<AccountHash>> {
        let mut hashes: Vec<AccountHash> = self.hashes.read().iter().copied().collect();
        hashes.sort();
        Ok(hashes)
    }

    fn replace_hash(&self, old: &AccountHash, new: &AccountHash) -> Result<()> {
        let mut hashes = self.hashes.write();
        if !hashes.remove(old) {
            return Err(Error::NotValid);
        }
        hashes.insert(*new);
        Ok(())
    }
}

/// Adapter holding sessions, presence and mailboxes in process memory
pub struct MemoryAdapter<S: AccountState> {
    registry: Box<dyn HashRegistry>,
    online: Mutex<HashSet<AccountHash>>,
    sessions: RwLock<HashMap<Uuid, SessionHandle<S>>>,
    mailboxes: Mutex<HashMap<Address, Vec<MailboxEnvelope>>>,
}

impl<S: AccountState> Default for MemoryAdapter<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: AccountState> MemoryAdapter<S> {
    pub fn new() -> Self {
        Self::with_registry(Box::new(MemoryHashRegistry::new()))
    }

    pub fn with_registry(registry: Box<dyn HashRegistry>) -> Self {
        Self {
            registry,
            online: Mutex::new(HashSet::new()),
            sessions: RwLock::new(HashMap::new()),
            mailboxes: Mutex::new(HashMap::new()),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Envelopes waiting for `address`, without draining them
    pub fn queued_for(&self, address: &Address) -> usize {
        self.mailboxes.lock().get(address).map_or(0, Vec::len)
    }
}

impl<S: AccountState> HashRegistry for MemoryAdapter<S> {
    fn insert_hash(&self, hash: &AccountHash) -> Result<()> {
        self.registry.insert_hash(hash)
    }

    fn remove_hash(&self, hash: &AccountHash) -> Result<()> {
        self.registry.remove_hash(hash)
    }

    fn check_hash(&self, hash: &AccountHash) -> Result<()> {
        self.registry.check_hash(hash)
    }

    fn hash_count(&self) -> Result<u64> {
        self.registry.hash_count()
    }

    fn export_hashes(&self) -> Result<Vec<AccountHash>> {
        self.registry.export_hashes()
    }

    fn replace_hash(&self, old: &AccountHash, new: &AccountHash) -> Result<()> {
        self.registry.replace_hash(old, new)
    }
}

impl<S: AccountState> PresenceSet for MemoryAdapter<S> {
    fn mark_online(&self, hash: &AccountHash) -> Result<()> {
        if self.online.lock().insert(*hash) {
            Ok(())
        } else {
            Err(Error::AlreadyOnline)
        }
    }

    fn is_online(&self, hash: &AccountHash) -> Result<bool> {
        Ok(self.online.lock().contains(hash))
    }

    fn mark_offline(&self, hash: &AccountHash) -> Result<()> {
        self.online.lock().remove(hash);
        Ok(())
    }
}

impl<S: AccountState> SessionPool<S> for MemoryAdapter<S> {
    fn put_session(&self, id: Uuid, session: SessionHandle<S>) -> Result<()> {
        match self.sessions.write().entry(id) {
            Entry::Occupied(_) => Err(Error::fatal(format!("session id {id} already in use"))),
            Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(())
            }
        }
    }

    fn contains_session(&self, id: &Uuid) -> Result<bool> {
        Ok(self.sessions.read().contains_key(id))
    }

    fn get_session(&self, id: &Uuid) -> Result<SessionHandle<S>> {
        self.sessions
            .read()
            .get(id)
            .cloned()
            .ok_or(Error::SessionExpired)
    }

    fn remove_session(&self, id: &Uuid) -> Result<()> {
        self.sessions.write().remove(id);
        Ok(())
    }

    fn sessions(&self) -> Result<Vec<SessionHandle<S>>> {
        Ok(self.sessions.read().values().cloned().collect())
    }
}

impl<S: AccountState> MailboxPool for MemoryAdapter<S> {
    fn add_envelope(&self, envelope: MailboxEnvelope, address: &Address) -> Result<()> {
        self.mailboxes
            .lock()
            .entry(*address)
            .or_default()
            .push(envelope);
        Ok(())
    }

    fn add_envelopes(&self, envelopes: Vec<MailboxEnvelope>, address: &Address) -> Result<()> {
        if envelopes.is_empty() {
            return Ok(());
        }
        self.mailboxes
            .lock()
            .entry(*address)
            .or_default()
            .extend(envelopes);
        Ok(())
    }

    fn poll_envelopes(&self, address: &Address) -> Result<Vec<MailboxEnvelope>> {
        Ok(self.mailboxes.lock().remove(address).unwrap_or_default())
    }

    fn requeue_envelopes(&self, envelopes: Vec<MailboxEnvelope>, address: &Address) -> Result<()> {
        if envelopes.is_empty() {
            return Ok(());
        }
        self.mailboxes
            .lock()
            .entry(*address)
            .or_default()
            .splice(0..0, envelopes);
        Ok(())
    }
}
