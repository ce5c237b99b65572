//! Holdfast Core - accounts held by their owners, not the server
//!
//! The server keeps no account data. Each account lives in a file that only
//! its holder can decrypt; the server keeps a registry of valid file hashes,
//! a mailbox for changes sent to offline accounts, and short-lived sessions.
//!
//! This crate follows hexagonal architecture:
//!
//! - **crypto**: AEAD, sealed boxes, key derivation, canonical hashing
//! - **domain**: Accounts, influences, actions and the session state machine
//! - **ports**: Trait definitions for storage and time
//! - **services**: The `Core` orchestrator and its building blocks
//! - **adapters**: In-memory and file-backed storage

pub mod adapters;
pub mod config;
pub mod crypto;
pub mod demo;
pub mod domain;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use adapters::{FileHashRegistry, MemoryAdapter};
use config::Config;
use services::Core;

// Re-export commonly used types at crate root
pub use domain::result::{Error, ErrorCategory};
pub use domain::{
    Account, AccountHash, AccountState, Action, Address, Influence, MailboxEnvelope, SessionState,
};
pub use services::{ConfirmOutcome, Cookie, Registration};

/// Main context for a Holdfast server
///
/// Loads configuration and the server secret from a data directory and wires
/// the in-memory adapter (with a persistent hash registry when
/// `saveDatabase` is on) into a `Core`.
pub struct HoldfastContext<S: AccountState> {
    pub config: Config,
    pub core: Core<S, MemoryAdapter<S>>,
}

impl<S: AccountState> HoldfastContext<S> {
    pub fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;
        let secret = config::load_or_create_secret(data_dir)?;

        let adapter = if config.save_database {
            let registry = FileHashRegistry::open(data_dir.join(&config.hash_database))?;
            MemoryAdapter::with_registry(Box::new(registry))
        } else {
            MemoryAdapter::new()
        };

        let core = Core::new(&config, &secret, Arc::new(adapter))?;
        tracing::info!(
            persistent_registry = config.save_database,
            session_duration_secs = config.session_duration_secs,
            "holdfast core ready"
        );
        Ok(Self { config, core })
    }
}
