//! Demo application: a wallet passing money between accounts
//!
//! Exercises every action capability and is used throughout the test suite.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};
use crate::domain::{
    Account, AccountState, Action, Address, CannotProduce, DeferredEffect, Errorable, FieldSet,
    Handshake, Influence, Produced, Sourced, Targeted,
};

/// Receipt left when a funds request is declined
pub const REQUEST_DECLINED: &str = "Could not request.";

/// Wallet account state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub username: String,
    pub balance: i64,
    pub receipts: Vec<String>,
    /// Scratch text, persisted but not part of the account version
    #[serde(default)]
    pub note: String,
}

impl Wallet {
    pub fn new(username: impl Into<String>, balance: i64) -> Self {
        Self {
            username: username.into(),
            balance,
            receipts: Vec::new(),
            note: String::new(),
        }
    }
}

impl AccountState for Wallet {
    const TYPE_TAG: &'static str = "holdfast.demo.wallet.v1";
    type Influence = WalletInfluence;

    fn hashed_fields(&self, fields: &mut FieldSet) {
        fields
            .put("username", &self.username)
            .put("balance", &self.balance)
            .put("receipts", &self.receipts);
    }
}

/// Mutations one wallet can apply to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletInfluence {
    Credit { amount: i64 },
    /// Credit that names its payer in a receipt
    CreditFrom { payer: Address, amount: i64 },
    /// Credit that sends a receipt back to the payer once saved
    CreditReceipted { payer: Address, amount: i64 },
    AddReceipt { receipt: String },
}

impl Influence<Wallet> for WalletInfluence {
    fn apply_to(self, account: &mut Account<Wallet>) -> Result<()> {
        match self {
            WalletInfluence::Credit { amount } => {
                let wallet = account.state_mut();
                wallet.balance = credited(wallet.balance, amount)?;
            }
            WalletInfluence::CreditFrom { payer, amount } => {
                let wallet = account.state_mut();
                wallet.balance = credited(wallet.balance, amount)?;
                wallet.receipts.push(format!("Received {amount} from {payer}"));
            }
            WalletInfluence::CreditReceipted { payer, amount } => {
                let wallet = account.state_mut();
                wallet.balance = credited(wallet.balance, amount)?;
                let receipt = format!("{amount} received by {}", account.address());
                account.add_action(send_receipt(payer, receipt));
            }
            WalletInfluence::AddReceipt { receipt } => {
                account.state_mut().receipts.push(receipt);
            }
        }
        Ok(())
    }
}

fn credited(balance: i64, amount: i64) -> Result<i64> {
    balance
        .checked_add(amount)
        .ok_or_else(|| Error::bad_envelope(format!("credit of {amount} overflows balance")))
}

// === Effects ===

pub struct Transfer {
    amount: i64,
}

impl DeferredEffect<Wallet> for Transfer {
    fn target_influence(&self) -> Produced<WalletInfluence> {
        Ok(Some(WalletInfluence::Credit {
            amount: self.amount,
        }))
    }
}

pub struct SourcedTransfer {
    payer: Address,
    amount: i64,
}

impl DeferredEffect<Wallet> for SourcedTransfer {
    fn target_influence(&self) -> Produced<WalletInfluence> {
        if self.amount <= 0 {
            return Err(CannotProduce::with_response(WalletInfluence::AddReceipt {
                receipt: format!("Could not send {}", self.amount),
            }));
        }
        Ok(Some(WalletInfluence::CreditFrom {
            payer: self.payer,
            amount: self.amount,
        }))
    }
}

pub struct ReceiptedTransfer {
    payer: Address,
    amount: i64,
}

impl DeferredEffect<Wallet> for ReceiptedTransfer {
    fn target_influence(&self) -> Produced<WalletInfluence> {
        Ok(Some(WalletInfluence::CreditReceipted {
            payer: self.payer,
            amount: self.amount,
        }))
    }

    fn returned_influence(&self) -> Option<WalletInfluence> {
        Some(WalletInfluence::AddReceipt {
            receipt: format!("Sent {}", self.amount),
        })
    }
}

pub struct SendReceipt {
    receipt: String,
}

impl DeferredEffect<Wallet> for SendReceipt {
    fn target_influence(&self) -> Produced<WalletInfluence> {
        Ok(Some(WalletInfluence::AddReceipt {
            receipt: self.receipt.clone(),
        }))
    }
}

pub struct RequestFunds {
    amount: i64,
    approved: bool,
}

impl DeferredEffect<Wallet> for RequestFunds {
    fn target_influence(&self) -> Produced<WalletInfluence> {
        if self.approved {
            Ok(Some(WalletInfluence::Credit {
                amount: self.amount,
            }))
        } else {
            Err(CannotProduce::with_response(WalletInfluence::AddReceipt {
                receipt: REQUEST_DECLINED.to_string(),
            }))
        }
    }
}

/// Untargeted action that bumps a shared counter when it runs
pub struct Tally {
    counter: Arc<AtomicUsize>,
}

impl Tally {
    pub fn new(counter: Arc<AtomicUsize>) -> Self {
        Self { counter }
    }
}

impl Action<Wallet> for Tally {
    fn process(&mut self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }
}

// === Constructors ===

pub fn send_funds(to: Address, amount: i64) -> Targeted<Transfer> {
    Targeted::new(to, Transfer { amount })
}

pub fn send_funds_sourced(from: Address, to: Address, amount: i64) -> Sourced<SourcedTransfer> {
    Sourced::new(from, to, SourcedTransfer { payer: from, amount })
}

pub fn send_funds_receipted(
    from: Address,
    to: Address,
    amount: i64,
) -> Handshake<ReceiptedTransfer> {
    Handshake::new(from, to, ReceiptedTransfer { payer: from, amount })
}

pub fn send_receipt(to: Address, receipt: impl Into<String>) -> Targeted<SendReceipt> {
    Targeted::new(
        to,
        SendReceipt {
            receipt: receipt.into(),
        },
    )
}

/// Ask for funds; the outcome is decided when the save is confirmed
pub fn request_funds(from: Address, amount: i64, approved: bool) -> Errorable<RequestFunds> {
    Errorable::new(from, RequestFunds { amount, approved })
}

/// Debit the wallet and queue a transfer. `false` if funds are short.
pub fn pay(account: &mut Account<Wallet>, to: Address, amount: i64) -> bool {
    if amount <= 0 || account.state().balance < amount {
        return false;
    }
    account.state_mut().balance -= amount;
    account.add_action(send_funds(to, amount));
    true
}
