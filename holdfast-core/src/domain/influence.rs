//! Influences: typed, serializable mutations delivered through the mailbox

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::account::{Account, AccountState};
use super::result::Result;

/// A mutation one account asks to apply to another
///
/// Influences are usually a serde enum per account type; `apply_to` is the
/// only place that may change the recipient's state on their behalf.
pub trait Influence<S: AccountState>: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Apply to the recipient. On error the account must be left untouched;
    /// the envelope is then dropped as undeliverable.
    fn apply_to(self, account: &mut Account<S>) -> Result<()>;
}

/// Failure to produce an influence, optionally carrying a response for the
/// party that asked
#[derive(Debug, Clone, PartialEq)]
pub struct CannotProduce<I> {
    response: Option<I>,
}

impl<I> CannotProduce<I> {
    /// Fail silently
    pub fn silent() -> Self {
        Self { response: None }
    }

    /// Fail and send `response` back to the source
    pub fn with_response(response: I) -> Self {
        Self {
            response: Some(response),
        }
    }

    pub fn response(&self) -> Option<&I> {
        self.response.as_ref()
    }

    pub fn into_response(self) -> Option<I> {
        self.response
    }
}

/// Outcome of producing an influence: `Ok(None)` means nothing to send
pub type Produced<I> = std::result::Result<Option<I>, CannotProduce<I>>;
