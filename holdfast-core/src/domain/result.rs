//! Result and error types for the core library

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core library error type
///
/// Every failure a caller can observe from the protocol maps to one of these
/// variants. `AdapterFailure` only travels between a storage adapter and the
/// orchestrator; the orchestrator escalates it to `Fatal` before returning.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid credential: the account file could not be opened with this password")]
    InvalidCredential,

    #[error("Invalid account format: {0}")]
    InvalidAccountFormat(String),

    #[error("Account file is not the latest registered version")]
    NotValid,

    #[error("Session expired")]
    SessionExpired,

    #[error("Session already confirmed")]
    SessionConfirmed,

    #[error("Session is not awaiting confirmation")]
    NotAwaitingConfirmation,

    #[error("Session is already awaiting confirmation")]
    AlreadyAwaitingConfirmation,

    #[error("Account has no changes to save")]
    NotChanged,

    #[error("Account is already online")]
    AlreadyOnline,

    #[error("Bad cookie")]
    BadCookie,

    #[error("Bad envelope: {0}")]
    BadEnvelope(String),

    #[error("Adapter failure: {0}")]
    AdapterFailure(String),

    #[error("Fatal error: {0}")]
    Fatal(String),
}

/// Coarse grouping of [`Error`] variants, mirroring how callers react to them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Wrong password, unreadable file or stale version; re-prompt
    Credential,
    /// The session is in the wrong state for the call
    SessionLifecycle,
    /// Already online, or a cookie that is not ours
    Conflict,
    /// Undeliverable mail; logged and dropped, never surfaced to the sender
    Envelope,
    /// Storage or internal invariant failure
    Fatal,
}

impl Error {
    /// Create an invalid account format error
    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Self::InvalidAccountFormat(msg.into())
    }

    /// Create a bad envelope error
    pub fn bad_envelope(msg: impl Into<String>) -> Self {
        Self::BadEnvelope(msg.into())
    }

    /// Create an adapter failure
    pub fn adapter(msg: impl Into<String>) -> Self {
        Self::AdapterFailure(msg.into())
    }

    /// Create a fatal error
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidCredential | Self::InvalidAccountFormat(_) | Self::NotValid => {
                ErrorCategory::Credential
            }
            Self::SessionExpired
            | Self::SessionConfirmed
            | Self::NotAwaitingConfirmation
            | Self::AlreadyAwaitingConfirmation
            | Self::NotChanged => ErrorCategory::SessionLifecycle,
            Self::AlreadyOnline | Self::BadCookie => ErrorCategory::Conflict,
            Self::BadEnvelope(_) => ErrorCategory::Envelope,
            Self::AdapterFailure(_) | Self::Fatal(_) => ErrorCategory::Fatal,
        }
    }

    /// Escalate adapter failures to `Fatal`, leaving everything else untouched
    pub fn escalate(self) -> Self {
        match self {
            Self::AdapterFailure(msg) => Self::Fatal(format!("storage adapter: {msg}")),
            other => other,
        }
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Extension for results coming back from a storage adapter
pub trait Escalate<T> {
    fn escalate(self) -> Result<T>;
}

impl<T> Escalate<T> for Result<T> {
    fn escalate(self) -> Result<T> {
        self.map_err(Error::escalate)
    }
}
