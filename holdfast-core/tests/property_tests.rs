//! Property-based tests for the account file and session protocol
//!
//! Argon2 runs on every case, so case counts are kept small and the light
//! parameters are used throughout.

use std::sync::Arc;

use proptest::prelude::*;

use holdfast_core::adapters::MemoryAdapter;
use holdfast_core::config::Config;
use holdfast_core::demo::{Wallet, WalletInfluence};
use holdfast_core::domain::{Argon2Params, ServerSecret};
use holdfast_core::services::{Core, EncryptionService};
use holdfast_core::{Account, Cookie, Error};

const PW: &str = "pw";

fn proptest_config() -> ProptestConfig {
    ProptestConfig::with_cases(12)
}

fn create_core() -> Core<Wallet, MemoryAdapter<Wallet>> {
    let config = Config {
        argon2: Argon2Params::light(),
        ..Config::default()
    };
    Core::new(
        &config,
        &ServerSecret::generate(),
        Arc::new(MemoryAdapter::new()),
    )
    .unwrap()
}

fn wallet_strategy() -> impl Strategy<Value = Wallet> {
    (
        "[a-z]{1,12}",
        -1_000i64..1_000,
        prop::collection::vec("[ -~]{0,16}", 0..4),
    )
        .prop_map(|(name, balance, receipts)| {
            let mut wallet = Wallet::new(name, balance);
            wallet.receipts = receipts;
            wallet
        })
}

proptest! {
    #![proptest_config(proptest_config())]

    /// Re-saving an unchanged account yields a new file with the same hash
    #[test]
    fn prop_hash_ignores_save_nonce(wallet in wallet_strategy()) {
        let service = EncryptionService::new(&ServerSecret::generate(), Argon2Params::light()).unwrap();
        let mut account = Account::create(wallet);

        let first = service.encode_account(&mut account, PW).unwrap();
        let second = service.encode_account(&mut account, PW).unwrap();
        prop_assert_ne!(&first, &second);

        let a = service.decode_account::<Wallet>(&first, PW).unwrap();
        let b = service.decode_account::<Wallet>(&second, PW).unwrap();
        prop_assert_eq!(a.canonical_hash().unwrap(), b.canonical_hash().unwrap());
        prop_assert_eq!(a.state(), b.state());
    }

    /// Any single flipped byte makes the file unusable
    #[test]
    fn prop_tampered_file_is_rejected(index in any::<prop::sample::Index>(), mask in 1u8..=255) {
        let core = create_core();
        let reg = core.register(Account::create(Wallet::new("alice", 3)), PW).unwrap();
        core.confirm(&reg.cookie, &reg.file, PW).unwrap();

        let mut file = reg.file.clone();
        let at = index.index(file.len());
        file[at] ^= mask;

        let err = core.login(&file, PW).unwrap_err();
        prop_assert!(
            matches!(err, Error::InvalidCredential | Error::InvalidAccountFormat(_)),
            "unexpected error {:?}", err
        );
        prop_assert!(core.login(&reg.file, PW).is_ok());
    }

    /// A cookie with any byte changed is refused and the session survives
    #[test]
    fn prop_tampered_cookie_is_rejected(index in any::<prop::sample::Index>(), mask in 1u8..=255) {
        let core = create_core();
        let reg = core.register(Account::create(Wallet::new("alice", 3)), PW).unwrap();
        core.confirm(&reg.cookie, &reg.file, PW).unwrap();
        let cookie = core.login(&reg.file, PW).unwrap();

        let mut bytes = cookie.as_bytes().to_vec();
        let at = index.index(bytes.len());
        bytes[at] ^= mask;

        prop_assert_eq!(core.state(&Cookie::from_bytes(bytes)).unwrap_err(), Error::BadCookie);
        prop_assert!(core.state(&cookie).is_ok());
    }

    /// Mail is applied in the order it was sent
    #[test]
    fn prop_mailbox_preserves_order(receipts in prop::collection::vec("[a-z0-9]{1,8}", 1..8)) {
        let core = create_core();
        let account = Account::create(Wallet::new("bob", 0));
        let address = account.address();
        let reg = core.register(account, PW).unwrap();
        core.confirm(&reg.cookie, &reg.file, PW).unwrap();

        for receipt in &receipts {
            core.send_influence(&WalletInfluence::AddReceipt { receipt: receipt.clone() }, &address)
                .unwrap();
        }

        let cookie = core.login(&reg.file, PW).unwrap();
        let (delivered, counted) = core
            .with_account(&cookie, |a| (a.state().receipts.clone(), a.influences()))
            .unwrap();
        prop_assert_eq!(delivered, receipts.clone());
        prop_assert_eq!(counted, receipts.len() as u64);
    }
}
