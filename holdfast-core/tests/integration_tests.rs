//! Integration tests for holdfast-core
//!
//! These tests drive the full protocol through `Core` with the in-memory
//! adapter: registration, login, mailbox delivery, two-phase saves and
//! every action capability of the demo wallet.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};

use holdfast_core::adapters::MemoryAdapter;
use holdfast_core::config::Config;
use holdfast_core::demo::{self, Wallet, WalletInfluence, REQUEST_DECLINED};
use holdfast_core::domain::{Account, AccountHash, Address, Argon2Params, ServerSecret, SessionState};
use holdfast_core::ports::ManualClock;
use holdfast_core::services::{logging, Cookie, Core};
use holdfast_core::{Error, ErrorCategory};

const PW: &str = "correct horse battery staple";

type WalletCore = Core<Wallet, MemoryAdapter<Wallet>>;

// ============================================================================
// Test Helpers
// ============================================================================

/// An account as seen by its holder: the latest file plus its address
struct Holder {
    file: Vec<u8>,
    address: Address,
    hash: AccountHash,
}

fn create_core() -> (WalletCore, Arc<ManualClock>) {
    logging::init_for_tests();
    let config = Config {
        argon2: Argon2Params::light(),
        ..Config::default()
    };
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let core = Core::with_clock(
        &config,
        &ServerSecret::generate(),
        Arc::new(MemoryAdapter::new()),
        clock.clone(),
    )
    .expect("Failed to create core");
    (core, clock)
}

/// Register and confirm a wallet
fn register(core: &WalletCore, name: &str, balance: i64) -> Holder {
    let account = Account::create(Wallet::new(name, balance));
    let address = account.address();
    let reg = core.register(account, PW).expect("register");
    let outcome = core.confirm(&reg.cookie, &reg.file, PW).expect("confirm registration");
    Holder {
        file: reg.file,
        address,
        hash: outcome.hash,
    }
}

/// Log in, apply `change`, save and confirm, tracking the new file
fn update<F>(core: &WalletCore, holder: &mut Holder, change: F) -> holdfast_core::ConfirmOutcome
where
    F: FnOnce(&mut Account<Wallet>),
{
    let cookie = core.login(&holder.file, PW).expect("login");
    core.with_account(&cookie, change).expect("mutate");
    let file = core.save(&cookie, PW).expect("save");
    let outcome = core.confirm(&cookie, &file, PW).expect("confirm");
    holder.file = file;
    holder.hash = outcome.hash;
    outcome
}

/// Log in, read the wallet, and shred the session
fn peek(core: &WalletCore, holder: &Holder) -> Wallet {
    let cookie = core.login(&holder.file, PW).expect("login");
    let wallet = core
        .with_account(&cookie, |account| account.state().clone())
        .expect("read");
    core.shred(&cookie).expect("shred");
    wallet
}

/// Log in and confirm whatever the mailbox delivered
fn collect_mail(core: &WalletCore, holder: &mut Holder) -> Wallet {
    let cookie = core.login(&holder.file, PW).expect("login");
    let wallet = core
        .with_account(&cookie, |account| account.state().clone())
        .unwrap();
    if core.state(&cookie).unwrap() == SessionState::Modified {
        let file = core.save(&cookie, PW).unwrap();
        holder.hash = core.confirm(&cookie, &file, PW).unwrap().hash;
        holder.file = file;
    } else {
        core.shred(&cookie).unwrap();
    }
    wallet
}

// ============================================================================
// Registration and Login
// ============================================================================

#[test]
fn test_registration_becomes_valid_only_after_confirm() {
    let (core, _) = create_core();
    let account = Account::create(Wallet::new("alice", 10));
    let reg = core.register(account, PW).unwrap();

    assert_eq!(core.registered_count().unwrap(), 0);
    assert_eq!(core.login(&reg.file, PW).unwrap_err(), Error::NotValid);

    core.confirm(&reg.cookie, &reg.file, PW).unwrap();
    assert_eq!(core.registered_count().unwrap(), 1);
    assert!(core.login(&reg.file, PW).is_ok());
}

#[test]
fn test_login_wrong_password() {
    let (core, _) = create_core();
    let alice = register(&core, "alice", 10);
    let err = core.login(&alice.file, "wrong").unwrap_err();
    assert_eq!(err, Error::InvalidCredential);
    assert_eq!(err.category(), ErrorCategory::Credential);
    assert!(!core.is_online(&alice.hash).unwrap());
}

#[test]
fn test_login_from_another_server_fails() {
    let (core, _) = create_core();
    let (other, _) = create_core();
    let alice = register(&core, "alice", 10);
    assert_eq!(other.login(&alice.file, PW).unwrap_err(), Error::InvalidCredential);
}

#[test]
fn test_login_garbage_file() {
    let (core, _) = create_core();
    assert!(matches!(
        core.login(&[9, 2, 3, 4], PW),
        Err(Error::InvalidAccountFormat(_))
    ));
    assert_eq!(
        core.login(&[1u8; 200], PW).unwrap_err(),
        Error::InvalidCredential
    );
}

#[test]
fn test_one_session_per_version() {
    let (core, _) = create_core();
    let alice = register(&core, "alice", 10);
    let cookie = core.login(&alice.file, PW).unwrap();
    assert_eq!(core.login(&alice.file, PW).unwrap_err(), Error::AlreadyOnline);

    core.shred(&cookie).unwrap();
    assert!(core.login(&alice.file, PW).is_ok());
}

#[test]
fn test_fresh_login_is_idle() {
    let (core, _) = create_core();
    let alice = register(&core, "alice", 10);
    let cookie = core.login(&alice.file, PW).unwrap();
    assert_eq!(core.state(&cookie).unwrap(), SessionState::Idle);
    assert_eq!(core.save(&cookie, PW).unwrap_err(), Error::NotChanged);
}

// ============================================================================
// Two-Phase Save
// ============================================================================

#[test]
fn test_confirmed_save_retires_old_version() {
    let (core, _) = create_core();
    let mut alice = register(&core, "alice", 10);
    let old_file = alice.file.clone();
    let old_hash = alice.hash;

    update(&core, &mut alice, |a| a.state_mut().username = "alice2".into());

    assert_eq!(core.login(&old_file, PW).unwrap_err(), Error::NotValid);
    assert_eq!(core.registered_count().unwrap(), 1);
    assert_eq!(core.export_hashes().unwrap(), vec![alice.hash]);
    assert_ne!(alice.hash, old_hash);
    assert_eq!(peek(&core, &alice).username, "alice2");
}

#[test]
fn test_unconfirmed_save_keeps_old_version() {
    let (core, _) = create_core();
    let alice = register(&core, "alice", 10);
    let cookie = core.login(&alice.file, PW).unwrap();
    core.with_account(&cookie, |a| a.state_mut().balance = 999).unwrap();
    let new_file = core.save(&cookie, PW).unwrap();
    core.shred(&cookie).unwrap();

    assert_eq!(core.login(&new_file, PW).unwrap_err(), Error::NotValid);
    assert_eq!(peek(&core, &alice).balance, 10);
}

#[test]
fn test_save_twice_without_confirm() {
    let (core, _) = create_core();
    let alice = register(&core, "alice", 10);
    let cookie = core.login(&alice.file, PW).unwrap();
    core.with_account(&cookie, |a| a.state_mut().balance = 11).unwrap();
    core.save(&cookie, PW).unwrap();
    assert_eq!(
        core.save(&cookie, PW).unwrap_err(),
        Error::AlreadyAwaitingConfirmation
    );
    assert_eq!(core.state(&cookie).unwrap(), SessionState::AwaitingConfirmation);
}

#[test]
fn test_confirm_without_save() {
    let (core, _) = create_core();
    let alice = register(&core, "alice", 10);
    let cookie = core.login(&alice.file, PW).unwrap();
    assert_eq!(
        core.confirm(&cookie, &alice.file, PW).unwrap_err(),
        Error::NotAwaitingConfirmation
    );
}

#[test]
fn test_confirm_mismatch_then_retry() {
    let (core, _) = create_core();
    let alice = register(&core, "alice", 10);
    let cookie = core.login(&alice.file, PW).unwrap();
    core.with_account(&cookie, |a| a.state_mut().balance = 12).unwrap();
    let file = core.save(&cookie, PW).unwrap();

    assert!(matches!(
        core.confirm(&cookie, &alice.file, PW),
        Err(Error::InvalidAccountFormat(_))
    ));
    assert_eq!(
        core.confirm(&cookie, &file, "wrong").unwrap_err(),
        Error::InvalidCredential
    );
    assert_eq!(core.state(&cookie).unwrap(), SessionState::AwaitingConfirmation);

    core.confirm(&cookie, &file, PW).unwrap();
    assert_eq!(core.state(&cookie).unwrap_err(), Error::SessionExpired);
}

#[test]
fn test_files_differ_between_saves_of_same_state() {
    let (core, _) = create_core();
    let mut alice = register(&core, "alice", 10);
    let first = alice.file.clone();
    update(&core, &mut alice, |a| a.state_mut().balance = 11);
    update(&core, &mut alice, |a| a.state_mut().balance = 10);
    assert_ne!(first, alice.file);
}

#[test]
fn test_unhashed_change_is_not_a_new_version() {
    let (core, _) = create_core();
    let alice = register(&core, "alice", 10);
    let cookie = core.login(&alice.file, PW).unwrap();
    core.with_account(&cookie, |a| a.state_mut().note = "draft".into())
        .unwrap();
    assert_eq!(core.state(&cookie).unwrap(), SessionState::Idle);
    assert_eq!(core.save(&cookie, PW).unwrap_err(), Error::NotChanged);
}

// ============================================================================
// Expiry
// ============================================================================

#[test]
fn test_session_expires() {
    let (core, clock) = create_core();
    let alice = register(&core, "alice", 10);
    let cookie = core.login(&alice.file, PW).unwrap();

    clock.advance(Duration::minutes(29));
    assert_eq!(core.state(&cookie).unwrap(), SessionState::Idle);

    clock.advance(Duration::minutes(2));
    assert_eq!(core.state(&cookie).unwrap_err(), Error::SessionExpired);
    assert!(!core.is_online(&alice.hash).unwrap());
    assert!(core.login(&alice.file, PW).is_ok());
}

#[test]
fn test_expired_awaiting_session_cannot_confirm() {
    let (core, clock) = create_core();
    let alice = register(&core, "alice", 10);
    let cookie = core.login(&alice.file, PW).unwrap();
    core.with_account(&cookie, |a| a.state_mut().balance = 1).unwrap();
    let file = core.save(&cookie, PW).unwrap();

    clock.advance(Duration::hours(1));
    assert_eq!(
        core.confirm(&cookie, &file, PW).unwrap_err(),
        Error::SessionExpired
    );
    assert_eq!(peek(&core, &alice).balance, 10);
}

#[test]
fn test_prune_counts_only_expired() {
    let (core, clock) = create_core();
    let alice = register(&core, "alice", 10);
    let bob = register(&core, "bob", 10);
    let _a = core.login(&alice.file, PW).unwrap();
    clock.advance(Duration::minutes(20));
    let _b = core.login(&bob.file, PW).unwrap();

    clock.advance(Duration::minutes(15));
    assert_eq!(core.prune().unwrap(), 1);
    assert!(!core.is_online(&alice.hash).unwrap());
    assert!(core.is_online(&bob.hash).unwrap());
}

// ============================================================================
// Mailbox
// ============================================================================

#[test]
fn test_mail_delivered_on_login() {
    let (core, _) = create_core();
    let mut alice = register(&core, "alice", 10);
    core.send_influence(&WalletInfluence::Credit { amount: 5 }, &alice.address)
        .unwrap();
    core.send_influence(
        &WalletInfluence::AddReceipt {
            receipt: "welcome".into(),
        },
        &alice.address,
    )
    .unwrap();

    let wallet = collect_mail(&core, &mut alice);
    assert_eq!(wallet.balance, 15);
    assert_eq!(wallet.receipts, vec!["welcome".to_string()]);
    assert_eq!(core.adapter().queued_for(&alice.address), 0);

    // Delivered exactly once
    assert_eq!(collect_mail(&core, &mut alice).balance, 15);
}

#[test]
fn test_shred_returns_mail() {
    let (core, _) = create_core();
    let mut alice = register(&core, "alice", 10);
    core.send_influence(&WalletInfluence::Credit { amount: 5 }, &alice.address)
        .unwrap();

    let cookie = core.login(&alice.file, PW).unwrap();
    assert_eq!(core.state(&cookie).unwrap(), SessionState::Modified);
    core.shred(&cookie).unwrap();
    assert_eq!(core.adapter().queued_for(&alice.address), 1);

    assert_eq!(collect_mail(&core, &mut alice).balance, 15);
}

#[test]
fn test_mail_for_unregistered_account_waits() {
    let (core, _) = create_core();
    let account = Account::create(Wallet::new("late", 0));
    let address = account.address();
    core.send_influence(&WalletInfluence::Credit { amount: 3 }, &address)
        .unwrap();

    let reg = core.register(account, PW).unwrap();
    core.confirm(&reg.cookie, &reg.file, PW).unwrap();
    let mut late = Holder {
        file: reg.file,
        address,
        hash: AccountHash::from_bytes([0; 64]),
    };
    assert_eq!(collect_mail(&core, &mut late).balance, 3);
}

// ============================================================================
// Actions
// ============================================================================

#[test]
fn test_send_funds() {
    let (core, _) = create_core();
    let mut alice = register(&core, "alice", 100);
    let mut bob = register(&core, "bob", 0);
    let to = bob.address;

    let outcome = update(&core, &mut alice, |a| assert!(demo::pay(a, to, 40)));
    assert_eq!(outcome.actions.executed, 1);
    assert_eq!(outcome.actions.envelopes_sent, 1);

    assert_eq!(peek(&core, &alice).balance, 60);
    assert_eq!(collect_mail(&core, &mut bob).balance, 40);
}

#[test]
fn test_actions_wait_for_confirmation() {
    let (core, _) = create_core();
    let alice = register(&core, "alice", 100);
    let bob = register(&core, "bob", 0);

    let cookie = core.login(&alice.file, PW).unwrap();
    core.with_account(&cookie, |a| demo::pay(a, bob.address, 40))
        .unwrap();
    core.save(&cookie, PW).unwrap();
    assert_eq!(core.adapter().queued_for(&bob.address), 0);

    core.shred(&cookie).unwrap();
    assert_eq!(core.adapter().queued_for(&bob.address), 0);
    assert_eq!(peek(&core, &alice).balance, 100);
}

#[test]
fn test_sourced_failure_answers_sender() {
    let (core, _) = create_core();
    let mut alice = register(&core, "alice", 100);
    let mut bob = register(&core, "bob", 0);
    let (from, to) = (alice.address, bob.address);

    update(&core, &mut alice, |a| {
        a.add_action(demo::send_funds_sourced(from, to, 0));
        a.state_mut().receipts.push("sent zero".into());
    });

    let wallet = collect_mail(&core, &mut alice);
    assert_eq!(wallet.receipts.last().unwrap(), "Could not send 0");
    assert_eq!(collect_mail(&core, &mut bob).balance, 0);
}

#[test]
fn test_sourced_success_names_payer() {
    let (core, _) = create_core();
    let mut alice = register(&core, "alice", 100);
    let mut bob = register(&core, "bob", 0);
    let (from, to) = (alice.address, bob.address);

    update(&core, &mut alice, |a| {
        a.state_mut().balance -= 30;
        a.add_action(demo::send_funds_sourced(from, to, 30));
    });

    let wallet = collect_mail(&core, &mut bob);
    assert_eq!(wallet.balance, 30);
    assert_eq!(wallet.receipts, vec![format!("Received 30 from {}", from)]);
}

#[test]
fn test_handshake_receipts_flow_both_ways() {
    let (core, _) = create_core();
    let mut alice = register(&core, "alice", 100);
    let mut bob = register(&core, "bob", 0);
    let (from, to) = (alice.address, bob.address);

    let outcome = update(&core, &mut alice, |a| {
        a.state_mut().balance -= 10;
        a.add_action(demo::send_funds_receipted(from, to, 10));
    });
    assert_eq!(outcome.actions.envelopes_sent, 2);

    // Bob's credit queues a receipt that is only sent once he confirms
    let bob_wallet = collect_mail(&core, &mut bob);
    assert_eq!(bob_wallet.balance, 10);

    let alice_wallet = collect_mail(&core, &mut alice);
    assert_eq!(
        alice_wallet.receipts,
        vec!["Sent 10".to_string(), format!("10 received by {}", to)]
    );
}

#[test]
fn test_request_funds() {
    let (core, _) = create_core();
    let mut alice = register(&core, "alice", 0);
    let me = alice.address;

    update(&core, &mut alice, |a| {
        a.state_mut().username = "alice (requesting)".into();
        a.add_action(demo::request_funds(me, 25, true));
    });
    assert_eq!(collect_mail(&core, &mut alice).balance, 25);
}

#[test]
fn test_risky_request_declined() {
    let (core, _) = create_core();
    let mut alice = register(&core, "alice", 0);
    let me = alice.address;

    update(&core, &mut alice, |a| {
        a.state_mut().username = "alice (risky)".into();
        a.add_action(demo::request_funds(me, 25, false));
    });
    let wallet = collect_mail(&core, &mut alice);
    assert_eq!(wallet.balance, 0);
    assert_eq!(wallet.receipts, vec![REQUEST_DECLINED.to_string()]);
}

#[test]
fn test_untargeted_action_runs_once_on_confirm() {
    let (core, _) = create_core();
    let alice = register(&core, "alice", 0);
    let counter = Arc::new(AtomicUsize::new(0));

    let cookie = core.login(&alice.file, PW).unwrap();
    let tally = demo::Tally::new(Arc::clone(&counter));
    core.with_account(&cookie, move |a| {
        a.state_mut().balance = 1;
        a.add_action(tally);
    })
    .unwrap();
    let file = core.save(&cookie, PW).unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    let outcome = core.confirm(&cookie, &file, PW).unwrap();
    assert_eq!(outcome.actions.executed, 1);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_actions_are_not_persisted_in_files() {
    let (core, _) = create_core();
    let alice = register(&core, "alice", 100);
    let bob = register(&core, "bob", 0);

    let cookie = core.login(&alice.file, PW).unwrap();
    core.with_account(&cookie, |a| demo::pay(a, bob.address, 1)).unwrap();
    let file = core.save(&cookie, PW).unwrap();
    core.confirm(&cookie, &file, PW).unwrap();

    let again = core.login(&file, PW).unwrap();
    assert_eq!(
        core.with_account(&again, |a| a.pending_actions()).unwrap(),
        0
    );
}

// ============================================================================
// Cookies
// ============================================================================

#[test]
fn test_forged_cookie() {
    let (core, _) = create_core();
    let cookie = Cookie::from_bytes(vec![7u8; 76]);
    assert_eq!(core.state(&cookie).unwrap_err(), Error::BadCookie);
    assert_eq!(
        core.save(&cookie, PW).unwrap_err().category(),
        ErrorCategory::Conflict
    );
}

#[test]
fn test_cookie_from_other_server() {
    let (core, _) = create_core();
    let (other, _) = create_core();
    let alice = register(&core, "alice", 10);
    let cookie = core.login(&alice.file, PW).unwrap();
    assert_eq!(other.state(&cookie).unwrap_err(), Error::BadCookie);
}
