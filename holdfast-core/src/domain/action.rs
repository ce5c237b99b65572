//! Actions: deferred side effects released when a save is confirmed
//!
//! An action lives inside an account's pending list until the holder proves
//! they stored the new file. It then runs once: `process` for local effects,
//! `dispatches` for the influences it sends, then `purge`.
//!
//! Untargeted actions implement [`Action`] directly. Actions that talk to
//! other accounts wrap a [`DeferredEffect`] in one of the capability types
//! below, which own the addresses and decide where each influence goes.

use super::account::AccountState;
use super::identity::Address;
use super::influence::Produced;
use super::result::{Error, Result};

/// An influence bound for a specific mailbox
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch<I> {
    pub address: Address,
    pub influence: I,
}

impl<I> Dispatch<I> {
    pub fn new(address: Address, influence: I) -> Self {
        Self { address, influence }
    }
}

/// A side effect executed after a confirmed save
pub trait Action<S: AccountState>: Send {
    /// Local side effects
    fn process(&mut self) {}

    /// Influences to deliver. Called once, after `process`.
    fn dispatches(&mut self) -> Result<Vec<Dispatch<S::Influence>>> {
        Ok(Vec::new())
    }

    /// Release any addresses or data held by the action
    fn purge(&mut self) {}

    /// Label used in logs and failure reports
    fn label(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// The influence-producing half of a targeted action
pub trait DeferredEffect<S: AccountState>: Send {
    /// Local side effects, run before any influence is produced
    fn process(&mut self) {}

    /// The influence for the target, or a failure with an optional response
    fn target_influence(&self) -> Produced<S::Influence>;

    /// For handshakes: the influence returned to the source on success
    fn returned_influence(&self) -> Option<S::Influence> {
        None
    }
}

fn purged<T>() -> Result<T> {
    Err(Error::fatal("action ran after it was purged"))
}

/// Sends an influence to a target; never answers the source
pub struct Targeted<E> {
    target: Option<Address>,
    effect: E,
}

impl<E> Targeted<E> {
    pub fn new(target: Address, effect: E) -> Self {
        Self {
            target: Some(target),
            effect,
        }
    }
}

impl<S: AccountState, E: DeferredEffect<S>> Action<S> for Targeted<E> {
    fn process(&mut self) {
        self.effect.process();
    }

    fn dispatches(&mut self) -> Result<Vec<Dispatch<S::Influence>>> {
        let Some(target) = self.target else {
            return purged();
        };
        match self.effect.target_influence() {
            Ok(Some(influence)) => Ok(vec![Dispatch::new(target, influence)]),
            Ok(None) => Ok(Vec::new()),
            Err(failure) if failure.response().is_some() => Err(Error::fatal(
                "targeted action produced a response but has no source to return it to",
            )),
            Err(_) => Ok(Vec::new()),
        }
    }

    fn purge(&mut self) {
        self.target = None;
    }

    fn label(&self) -> &'static str {
        std::any::type_name::<E>()
    }
}

/// Like [`Targeted`], but a failure response is routed back to the source
pub struct Sourced<E> {
    addresses: Option<(Address, Address)>,
    effect: E,
}

impl<E> Sourced<E> {
    pub fn new(source: Address, target: Address, effect: E) -> Self {
        Self {
            addresses: Some((source, target)),
            effect,
        }
    }
}

impl<S: AccountState, E: DeferredEffect<S>> Action<S> for Sourced<E> {
    fn process(&mut self) {
        self.effect.process();
    }

    fn dispatches(&mut self) -> Result<Vec<Dispatch<S::Influence>>> {
        let Some((source, target)) = self.addresses else {
            return purged();
        };
        Ok(match self.effect.target_influence() {
            Ok(produced) => produced
                .map(|influence| Dispatch::new(target, influence))
                .into_iter()
                .collect(),
            Err(failure) => failure
                .into_response()
                .map(|response| Dispatch::new(source, response))
                .into_iter()
                .collect(),
        })
    }

    fn purge(&mut self) {
        self.addresses = None;
    }

    fn label(&self) -> &'static str {
        std::any::type_name::<E>()
    }
}

/// On success sends to the target and returns an influence to the source
pub struct Handshake<E> {
    addresses: Option<(Address, Address)>,
    effect: E,
}

impl<E> Handshake<E> {
    pub fn new(source: Address, target: Address, effect: E) -> Self {
        Self {
            addresses: Some((source, target)),
            effect,
        }
    }
}

impl<S: AccountState, E: DeferredEffect<S>> Action<S> for Handshake<E> {
    fn process(&mut self) {
        self.effect.process();
    }

    fn dispatches(&mut self) -> Result<Vec<Dispatch<S::Influence>>> {
        let Some((source, target)) = self.addresses else {
            return purged();
        };
        match self.effect.target_influence() {
            Ok(produced) => {
                let mut out = Vec::with_capacity(2);
                if let Some(influence) = produced {
                    out.push(Dispatch::new(target, influence));
                }
                if let Some(returned) = self.effect.returned_influence() {
                    out.push(Dispatch::new(source, returned));
                }
                Ok(out)
            }
            Err(failure) => Ok(failure
                .into_response()
                .map(|response| Dispatch::new(source, response))
                .into_iter()
                .collect()),
        }
    }

    fn purge(&mut self) {
        self.addresses = None;
    }

    fn label(&self) -> &'static str {
        std::any::type_name::<E>()
    }
}

/// Targets the source account itself; failures answer the source too
pub struct Errorable<E> {
    source: Option<Address>,
    effect: E,
}

impl<E> Errorable<E> {
    pub fn new(source: Address, effect: E) -> Self {
        Self {
            source: Some(source),
            effect,
        }
    }
}

impl<S: AccountState, E: DeferredEffect<S>> Action<S> for Errorable<E> {
    fn process(&mut self) {
        self.effect.process();
    }

    fn dispatches(&mut self) -> Result<Vec<Dispatch<S::Influence>>> {
        let Some(source) = self.source else {
            return purged();
        };
        let influence = match self.effect.target_influence() {
            Ok(produced) => produced,
            Err(failure) => failure.into_response(),
        };
        Ok(influence
            .map(|influence| Dispatch::new(source, influence))
            .into_iter()
            .collect())
    }

    fn purge(&mut self) {
        self.source = None;
    }

    fn label(&self) -> &'static str {
        std::any::type_name::<E>()
    }
}
