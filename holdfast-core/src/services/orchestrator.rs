//! Core orchestrator
//!
//! The public face of the protocol. Composes the storage adapter, the
//! encryption service and the clock, and drives sessions through
//! register/login -> mutate -> save -> confirm.

use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use super::actions::{ActionReport, ActionRunner};
use super::encryption::{Cookie, EncryptionService};
use crate::config::Config;
use crate::domain::result::{Error, Escalate, Result};
use crate::domain::{
    Account, AccountHash, AccountState, Address, ConfirmedSave, MailboxEnvelope, ServerSecret,
    Session, SessionState,
};
use crate::ports::{Adapter, Clock, SystemClock};

/// Result of registering a new account
#[derive(Debug)]
pub struct Registration {
    pub cookie: Cookie,
    /// First account file; must be confirmed before the account exists
    pub file: Vec<u8>,
}

/// Result of a confirmed save
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmOutcome {
    pub hash: AccountHash,
    pub actions: ActionReport,
}

/// Protocol orchestrator over a storage adapter `A` for account type `S`
pub struct Core<S: AccountState, A: Adapter<S>> {
    adapter: Arc<A>,
    encryption: EncryptionService,
    clock: Arc<dyn Clock>,
    session_duration: Duration,
    _state: PhantomData<fn() -> S>,
}

impl<S: AccountState, A: Adapter<S>> Core<S, A> {
    pub fn new(config: &Config, secret: &ServerSecret, adapter: Arc<A>) -> Result<Self> {
        Self::with_clock(config, secret, adapter, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &Config,
        secret: &ServerSecret,
        adapter: Arc<A>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let session_duration = Duration::try_seconds(config.session_duration_secs as i64)
            .ok_or_else(|| Error::fatal("session duration out of range"))?;
        Ok(Self {
            adapter,
            encryption: EncryptionService::new(secret, config.argon2.clone())?,
            clock,
            session_duration,
            _state: PhantomData,
        })
    }

    pub fn adapter(&self) -> &Arc<A> {
        &self.adapter
    }

    pub fn session_duration(&self) -> Duration {
        self.session_duration
    }

    // === Session lifecycle ===

    /// Register a new account. It is not valid until the returned file is
    /// confirmed.
    pub fn register(&self, account: Account<S>, password: &str) -> Result<Registration> {
        let now = self.clock.now();
        let mut session = Session::register(account, now, self.session_duration)?;
        self.adapter.mark_online(&session.presence_hash()).escalate()?;

        let file = match session.initiate_save_attempt(&self.encryption, password, now) {
            Ok(file) => file,
            Err(e) => {
                self.rollback(&mut session);
                return Err(e);
            }
        };
        let id = session.id();
        let cookie = self.admit(session)?;
        info!(session = %id, "account registered, awaiting confirmation");
        Ok(Registration { cookie, file })
    }

    /// Open a session from an account file and deliver pending mail
    pub fn login(&self, file: &[u8], password: &str) -> Result<Cookie> {
        let now = self.clock.now();
        let mut session = Session::open(&self.encryption, file, password, now, self.session_duration)?;
        let presence = session.presence_hash();

        self.adapter.check_hash(&presence).escalate()?;
        self.adapter.mark_online(&presence).escalate()?;
        // A confirm of this version may have committed between the check and
        // taking presence; only a version still registered once we hold it
        // may open.
        if let Err(e) = self.adapter.check_hash(&presence).escalate() {
            self.rollback(&mut session);
            return Err(e);
        }

        let address = session.address();
        let incoming = match self.adapter.poll_envelopes(&address).escalate() {
            Ok(incoming) => incoming,
            Err(e) => {
                self.rollback(&mut session);
                return Err(e);
            }
        };
        let polled = incoming.len();
        let delivered =
            panic::catch_unwind(AssertUnwindSafe(|| session.deliver(incoming.clone())));
        let applied = match delivered {
            Ok(applied) => applied,
            Err(_) => {
                error!(%address, polled, "envelope delivery panicked, login abandoned");
                session.close();
                session.release();
                if let Err(e) = self.adapter.requeue_envelopes(incoming, &address) {
                    error!(%address, error = %e, "failed to return envelopes after panic");
                }
                if let Err(e) = self.adapter.mark_offline(&presence) {
                    error!(%address, error = %e, "failed to clear presence after panic");
                }
                return Err(Error::fatal("envelope delivery panicked"));
            }
        };

        let id = session.id();
        let cookie = self.admit(session)?;
        info!(session = %id, applied, dropped = polled - applied, "logged in");
        Ok(cookie)
    }

    /// Current state of the session, recomputed from the account hashes
    pub fn state(&self, cookie: &Cookie) -> Result<SessionState> {
        self.with_session(cookie, |session, now| session.touch_state(now))
    }

    /// Run `f` against the session's working copy of the account.
    ///
    /// `f` runs with the session locked, so it must not call back into this
    /// `Core` with the same cookie; the lock is not reentrant and the call
    /// would deadlock.
    pub fn with_account<T>(
        &self,
        cookie: &Cookie,
        f: impl FnOnce(&mut Account<S>) -> T,
    ) -> Result<T> {
        self.with_session(cookie, |session, now| Ok(f(session.account_mut(now)?)))
    }

    /// Issue a new account file; the session then awaits confirmation
    pub fn save(&self, cookie: &Cookie, password: &str) -> Result<Vec<u8>> {
        self.with_session(cookie, |session, now| {
            session.initiate_save_attempt(&self.encryption, password, now)
        })
    }

    /// Accept the holder's copy of the last issued file, commit the new
    /// version and release the queued actions
    pub fn confirm(&self, cookie: &Cookie, file: &[u8], password: &str) -> Result<ConfirmOutcome> {
        let ConfirmedSave {
            confirmed, actions, ..
        } = self.with_session(cookie, |session, now| {
            let confirmed = session.confirm_save(&self.encryption, file, password, now)?;
            self.commit(session, &confirmed)?;
            Ok(confirmed)
        })?;

        let report = ActionRunner::new(&*self.adapter).run(actions)?;
        info!(
            executed = report.executed,
            failed = report.failures.len(),
            "save confirmed"
        );
        Ok(ConfirmOutcome {
            hash: confirmed,
            actions: report,
        })
    }

    /// Abandon a session without committing. Unknown sessions are ignored.
    pub fn shred(&self, cookie: &Cookie) -> Result<()> {
        let id = self.encryption.decode_cookie(cookie)?;
        let handle = match self.adapter.get_session(&id) {
            Ok(handle) => handle,
            Err(Error::SessionExpired) => return Ok(()),
            Err(e) => return Err(e.escalate()),
        };
        let mut session = handle.lock();
        self.retire(&mut session)?;
        debug!(session = %id, "session shredded");
        Ok(())
    }

    /// Close every session past its deadline; returns how many were closed
    pub fn prune(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut pruned = 0;
        for handle in self.adapter.sessions().escalate()? {
            let mut session = handle.lock();
            if session.is_expired(now) && self.retire(&mut session)? {
                pruned += 1;
            }
        }
        if pruned > 0 {
            info!(pruned, "expired sessions pruned");
        }
        Ok(pruned)
    }

    // === Mailbox ===

    /// Queue an influence for `address` from outside any session
    pub fn send_influence(&self, influence: &S::Influence, address: &Address) -> Result<()> {
        let envelope = MailboxEnvelope::wrap(influence, address)?;
        self.adapter.add_envelope(envelope, address).escalate()
    }

    // === Registry ===

    pub fn registered_count(&self) -> Result<u64> {
        self.adapter.hash_count().escalate()
    }

    pub fn export_hashes(&self) -> Result<Vec<AccountHash>> {
        self.adapter.export_hashes().escalate()
    }

    pub fn is_registered(&self, hash: &AccountHash) -> Result<bool> {
        match self.adapter.check_hash(hash) {
            Ok(()) => Ok(true),
            Err(Error::NotValid) => Ok(false),
            Err(e) => Err(e.escalate()),
        }
    }

    pub fn is_online(&self, hash: &AccountHash) -> Result<bool> {
        self.adapter.is_online(hash).escalate()
    }

    // === Internals ===

    fn with_session<T>(
        &self,
        cookie: &Cookie,
        op: impl FnOnce(&mut Session<S>, DateTime<Utc>) -> Result<T>,
    ) -> Result<T> {
        let id = self.encryption.decode_cookie(cookie)?;
        let handle = self.adapter.get_session(&id).escalate()?;
        let now = self.clock.now();

        let mut session = handle.lock();
        let result = op(&mut *session, now);
        if matches!(result, Err(Error::SessionExpired))
            && session.last_state() == SessionState::Closed
        {
            self.retire(&mut session)?;
        }
        result
    }

    /// Store the session and hand out its cookie
    fn admit(&self, mut session: Session<S>) -> Result<Cookie> {
        let id = session.id();
        let cookie = match self.encryption.encode_cookie(&id) {
            Ok(cookie) => cookie,
            Err(e) => {
                self.rollback(&mut session);
                return Err(e);
            }
        };

        let handle = Arc::new(Mutex::new(session));
        if let Err(e) = self.adapter.put_session(id, Arc::clone(&handle)).escalate() {
            self.rollback(&mut handle.lock());
            return Err(e);
        }
        Ok(cookie)
    }

    fn commit(&self, session: &mut Session<S>, confirmed: &ConfirmedSave<S>) -> Result<()> {
        session.release();
        let registered = match confirmed.previous {
            Some(previous) => self.adapter.replace_hash(&previous, &confirmed.confirmed),
            None => self.adapter.insert_hash(&confirmed.confirmed),
        };
        self.adapter.mark_offline(&session.presence_hash()).escalate()?;
        self.adapter.remove_session(&session.id()).escalate()?;
        if let Err(e) = &registered {
            error!(session = %session.id(), error = %e, "registry refused the confirmed version");
        }
        registered.escalate()
    }

    /// Close a session and undo everything it holds: return consumed mail,
    /// release presence, drop it from the pool. `false` if another caller
    /// already retired it.
    fn retire(&self, session: &mut Session<S>) -> Result<bool> {
        if !self.give_back(session)? {
            return Ok(false);
        }
        self.adapter.remove_session(&session.id()).escalate()?;
        Ok(true)
    }

    fn give_back(&self, session: &mut Session<S>) -> Result<bool> {
        let incoming = session.close();
        if !session.release() {
            return Ok(false);
        }
        if !incoming.is_empty() {
            debug!(session = %session.id(), returned = incoming.len(), "returning envelopes to mailbox");
            self.adapter
                .requeue_envelopes(incoming, &session.address())
                .escalate()?;
        }
        self.adapter.mark_offline(&session.presence_hash()).escalate()?;
        Ok(true)
    }

    /// Undo a session that never made it into the pool
    fn rollback(&self, session: &mut Session<S>) {
        if let Err(e) = self.give_back(session) {
            error!(session = %session.id(), error = %e, "failed to roll back session");
        }
    }
}
