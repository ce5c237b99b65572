//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The orchestrator
//! depends only on these traits, not on concrete implementations.

mod adapter;
mod clock;

pub use adapter::{Adapter, HashRegistry, MailboxPool, PresenceSet, SessionHandle, SessionPool};
pub use clock::{Clock, ManualClock, SystemClock};
