//! Core domain entities
//!
//! Accounts, influences, actions and sessions. These are pure data structures
//! with protocol logic; no storage or clock access happens in here.

mod account;
mod action;
mod encryption;
mod envelope;
mod identity;
mod influence;
pub mod result;
mod session;

pub use account::{Account, AccountHash, AccountState, FieldSet, ACCOUNT_NONCE_SIZE};
pub use action::{Action, DeferredEffect, Dispatch, Errorable, Handshake, Sourced, Targeted};
pub use encryption::{Argon2Params, ServerSecret, SERVER_SECRET_SIZE};
pub use envelope::MailboxEnvelope;
pub use identity::{Address, Identity};
pub use influence::{CannotProduce, Influence, Produced};
pub use session::{ConfirmedSave, Session, SessionState};
