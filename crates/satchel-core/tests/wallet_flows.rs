//! End-to-end wallet flows against in-memory collaborators.
//!
//! These tests drive the public `Core` surface the way a GUI would:
//! register → verify email → login → derive → sign → broadcast, plus
//! the recovery and failure paths.

use std::sync::Arc;

use satchel_core::{Core, CoreError, LoginOutcome};
use satchel_explorer::mock::{MockBtcExplorer, MockEvmExplorer};
use satchel_keys::address::Chain;
use satchel_notify::{RecordingMailer, UnavailableMailer};
use satchel_store::Vault;
use satchel_tx::btc::{self, Utxo};
use tempfile::TempDir;

const VAULT_KEY: &[u8; 32] = b"test-vault-key-0123456789abcdef0";
const PASSWORD: &str = "Correct-horse-7!";

/// The reference mnemonic used for deterministic derivation checks.
const TEST_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

struct Fixture {
    _dir: TempDir,
    core: Core,
    mailer: Arc<RecordingMailer>,
    btc: Arc<MockBtcExplorer>,
    evm: Arc<MockEvmExplorer>,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let vault = Vault::open(&dir.path().join("vault.db"), VAULT_KEY).unwrap();
    let mailer = Arc::new(RecordingMailer::new());
    let btc = Arc::new(MockBtcExplorer::new(2));
    let evm = Arc::new(MockEvmExplorer::new());
    let core = Core::new(vault, mailer.clone(), btc.clone(), evm.clone());
    Fixture {
        _dir: dir,
        core,
        mailer,
        btc,
        evm,
    }
}

/// Pull the 6-digit code out of the last recorded email.
fn last_code(mailer: &RecordingMailer) -> String {
    let sent = mailer.sent();
    let body = &sent.last().expect("an email was sent").2;
    body.split_whitespace()
        .find(|w| w.len() == 6 && w.bytes().all(|b| b.is_ascii_digit()))
        .expect("code in body")
        .to_string()
}

/// register → verify → login, returning a live session id.
fn onboard(f: &Fixture, username: &str) -> String {
    f.core
        .register(username, &format!("{username}@example.com"), PASSWORD)
        .unwrap();
    match f.core.login(username, PASSWORD, None).unwrap() {
        LoginOutcome::RequiresEmailVerification => {}
        other => panic!("expected verification gate, got {other:?}"),
    }
    let code = last_code(&f.mailer);
    f.core.verify_email_code(username, &code).unwrap();
    match f.core.login(username, PASSWORD, None).unwrap() {
        LoginOutcome::SessionIssued { session_id } => session_id,
        other => panic!("expected session, got {other:?}"),
    }
}

#[test]
fn register_returns_valid_mnemonic_once() {
    let f = fixture();
    let reg = f.core.register("alice", "alice@example.com", PASSWORD).unwrap();
    let words: Vec<&str> = reg.mnemonic.split_whitespace().collect();
    assert_eq!(words.len(), 12);
    // The phrase survives a BIP-39 parse
    satchel_keys::Mnemonic::from_phrase(&reg.mnemonic).unwrap();
}

#[test]
fn register_rejects_bad_inputs() {
    let f = fixture();
    assert!(matches!(
        f.core.register("al", "a@example.com", PASSWORD),
        Err(CoreError::InvalidInput(_))
    ));
    assert!(matches!(
        f.core.register("alice", "not-an-email", PASSWORD),
        Err(CoreError::InvalidInput(_))
    ));
    assert!(matches!(
        f.core.register("alice", "a@example.com", "weakpass"),
        Err(CoreError::InvalidInput(_))
    ));
    // Duplicate username
    f.core.register("alice", "a@example.com", PASSWORD).unwrap();
    assert!(matches!(
        f.core.register("alice", "b@example.com", PASSWORD),
        Err(CoreError::AlreadyExists)
    ));
}

#[test]
fn login_gates_on_email_verification() {
    let f = fixture();
    f.core.register("bob", "bob@example.com", PASSWORD).unwrap();

    // First login sends a code instead of a session
    assert!(matches!(
        f.core.login("bob", PASSWORD, None).unwrap(),
        LoginOutcome::RequiresEmailVerification
    ));
    assert_eq!(f.mailer.sent().len(), 1);
    assert_eq!(f.mailer.sent()[0].0, "bob@example.com");

    // A second login inside the resend window does not re-send
    assert!(matches!(
        f.core.login("bob", PASSWORD, None).unwrap(),
        LoginOutcome::RequiresEmailVerification
    ));
    assert_eq!(f.mailer.sent().len(), 1);

    // Wrong code counts down; right code verifies
    let code = last_code(&f.mailer);
    assert!(matches!(
        f.core.verify_email_code("bob", "000000"),
        Err(CoreError::InvalidCredentials {
            remaining_attempts: Some(4)
        })
    ));
    f.core.verify_email_code("bob", &code).unwrap();

    assert!(matches!(
        f.core.login("bob", PASSWORD, None).unwrap(),
        LoginOutcome::SessionIssued { .. }
    ));
}

#[test]
fn login_rate_limits_after_failures() {
    let f = fixture();
    f.core.register("carol", "c@example.com", PASSWORD).unwrap();

    for expected in [4u32, 3, 2, 1, 0] {
        match f.core.login("carol", "Wrong-pass-1!", None) {
            Err(CoreError::InvalidCredentials { remaining_attempts }) => {
                assert_eq!(remaining_attempts, Some(expected));
            }
            other => panic!("expected credential failure, got {other:?}"),
        }
    }
    // Sixth attempt, even with the right password, is locked out
    assert!(matches!(
        f.core.login("carol", PASSWORD, None),
        Err(CoreError::RateLimited { .. })
    ));
}

#[test]
fn unknown_user_fails_like_wrong_password() {
    let f = fixture();
    let err = f.core.login("ghost", PASSWORD, None).unwrap_err();
    assert!(matches!(
        err,
        CoreError::InvalidCredentials {
            remaining_attempts: Some(4)
        }
    ));
    assert_eq!(err.to_string(), "Invalid credentials");
}

#[test]
fn mail_outage_surfaces_as_external_unavailable() {
    let dir = TempDir::new().unwrap();
    let vault = Vault::open(&dir.path().join("vault.db"), VAULT_KEY).unwrap();
    let core = Core::new(
        vault,
        Arc::new(UnavailableMailer),
        Arc::new(MockBtcExplorer::new(2)),
        Arc::new(MockEvmExplorer::new()),
    );
    core.register("dave", "d@example.com", PASSWORD).unwrap();
    assert!(matches!(
        core.login("dave", PASSWORD, None),
        Err(CoreError::ExternalUnavailable(_))
    ));
}

#[test]
fn restore_then_derive_known_addresses() {
    let f = fixture();
    let session = onboard(&f, "erin");

    f.core
        .restore_from_seed("erin", TEST_MNEMONIC, "", PASSWORD)
        .unwrap();
    // Restore revoked the session; a new login is required
    assert!(matches!(
        f.core.derive_address(&session, Chain::Bitcoin, 0, 0, 0),
        Err(CoreError::InvalidCredentials { .. })
    ));

    let session = match f.core.login("erin", PASSWORD, None).unwrap() {
        LoginOutcome::SessionIssued { session_id } => session_id,
        other => panic!("expected session, got {other:?}"),
    };

    // Reference BIP-44 addresses for the test mnemonic
    let btc0 = f
        .core
        .derive_address(&session, Chain::Bitcoin, 0, 0, 0)
        .unwrap();
    assert_eq!(btc0, "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA");

    let eth0 = f
        .core
        .derive_address(&session, Chain::Ethereum, 0, 0, 0)
        .unwrap();
    assert!(eth0.eq_ignore_ascii_case("0x9858effd232b4033e47d90003d41ec34ecaeda94"));
    assert!(satchel_keys::address::is_valid_evm_address(&eth0));

    // Different chains and indices yield distinct addresses
    let btc1 = f
        .core
        .derive_address(&session, Chain::Bitcoin, 0, 0, 1)
        .unwrap();
    let ltc0 = f
        .core
        .derive_address(&session, Chain::Litecoin, 0, 0, 0)
        .unwrap();
    assert_ne!(btc0, btc1);
    assert!(ltc0.starts_with('L'));

    // Determinism across sessions
    f.core.logout(&session).unwrap();
    let session2 = match f.core.login("erin", PASSWORD, None).unwrap() {
        LoginOutcome::SessionIssued { session_id } => session_id,
        other => panic!("expected session, got {other:?}"),
    };
    assert_eq!(
        f.core
            .derive_address(&session2, Chain::Bitcoin, 0, 0, 0)
            .unwrap(),
        btc0
    );
}

#[test]
fn reveal_seed_requires_password() {
    let f = fixture();
    onboard(&f, "frank");

    let hex_seed = f.core.reveal_seed("frank", PASSWORD).unwrap();
    assert_eq!(hex_seed.len(), 128); // 64 bytes

    assert!(matches!(
        f.core.reveal_seed("frank", "Wrong-pass-1!"),
        Err(CoreError::InvalidCredentials { .. })
    ));
}

#[test]
fn restore_reveal_roundtrip_matches_bip39_seed() {
    let f = fixture();
    onboard(&f, "grace");
    f.core
        .restore_from_seed("grace", TEST_MNEMONIC, "TREZOR", PASSWORD)
        .unwrap();

    let revealed = f.core.reveal_seed("grace", PASSWORD).unwrap();
    // The Trezor reference vector for this mnemonic + passphrase
    assert_eq!(
        &revealed[..32],
        "c55257c360c07c72029aebc1b53c05ed"
    );
}

#[test]
fn restore_rejects_bad_mnemonic() {
    let f = fixture();
    onboard(&f, "heidi");
    let bad = TEST_MNEMONIC.replace("about", "abandon");
    assert!(matches!(
        f.core.restore_from_seed("heidi", &bad, "", PASSWORD),
        Err(CoreError::InvalidInput(_))
    ));
}

#[test]
fn logout_revokes_and_locks() {
    let f = fixture();
    let session = onboard(&f, "ivan");
    f.core
        .derive_address(&session, Chain::Bitcoin, 0, 0, 0)
        .unwrap();

    f.core.logout(&session).unwrap();
    assert!(matches!(
        f.core.derive_address(&session, Chain::Bitcoin, 0, 0, 0),
        Err(CoreError::InvalidCredentials { .. })
    ));
}

#[test]
fn btc_sign_and_broadcast_flow() {
    let f = fixture();
    let session = onboard(&f, "judy");
    f.core
        .restore_from_seed("judy", TEST_MNEMONIC, "", PASSWORD)
        .unwrap();
    drop(session);
    let session = match f.core.login("judy", PASSWORD, None).unwrap() {
        LoginOutcome::SessionIssued { session_id } => session_id,
        other => panic!("expected session, got {other:?}"),
    };

    let from = f
        .core
        .derive_address(&session, Chain::Bitcoin, 0, 0, 0)
        .unwrap();

    // Fund the address with two fake coins
    let pkh = satchel_keys::address::p2pkh_pubkey_hash(Chain::Bitcoin, &from).unwrap();
    let script = btc::p2pkh_script(&pkh);
    let utxos = vec![
        Utxo {
            txid: [0x11; 32],
            vout: 0,
            amount: 80_000,
            address: from.clone(),
            script_pubkey: script.clone(),
            confirmations: 12,
        },
        Utxo {
            txid: [0x22; 32],
            vout: 1,
            amount: 30_000,
            address: from.clone(),
            script_pubkey: script.clone(),
            confirmations: 3,
        },
    ];

    let signed = f
        .core
        .build_and_sign_btc_tx(
            &session,
            &[from.clone()],
            utxos.clone(),
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa",
            50_000,
            2,
            PASSWORD,
        )
        .unwrap();

    // The serialization parses back; every input is signed
    let parsed = btc::deserialize(&hex::decode(&signed.raw_hex).unwrap()).unwrap();
    assert!(parsed.inputs.iter().all(|i| !i.script_sig.is_empty()));
    assert_eq!(parsed.outputs[0].amount, 50_000);
    assert_eq!(btc::txid(&parsed), signed.txid);

    // Broadcast goes through the explorer
    f.core.broadcast_btc_tx(&signed.raw_hex).unwrap();
    assert_eq!(f.btc.broadcasts(), vec![signed.raw_hex.clone()]);

    // Insufficient funds and wrong password both refuse
    assert!(matches!(
        f.core.build_and_sign_btc_tx(
            &session,
            &[from.clone()],
            utxos.clone(),
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa",
            10_000_000,
            2,
            PASSWORD,
        ),
        Err(CoreError::InsufficientFunds { .. })
    ));
    assert!(matches!(
        f.core.build_and_sign_btc_tx(
            &session,
            &[from],
            utxos,
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa",
            50_000,
            2,
            "Wrong-pass-1!",
        ),
        Err(CoreError::InvalidCredentials { .. })
    ));
}

#[test]
fn evm_sign_uses_explorer_nonce_and_recovers_sender() {
    let f = fixture();
    let session = onboard(&f, "kim");
    f.core
        .restore_from_seed("kim", TEST_MNEMONIC, "", PASSWORD)
        .unwrap();
    let session = match f.core.login("kim", PASSWORD, None).unwrap() {
        LoginOutcome::SessionIssued { session_id } => session_id,
        other => panic!("expected session, got {other:?}"),
    };

    let from = f
        .core
        .derive_address(&session, Chain::Ethereum, 0, 0, 0)
        .unwrap();
    f.evm.set_nonce(&from, 7);

    let raw = f
        .core
        .build_and_sign_evm_tx(
            &session,
            &from,
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "1000000000000000000",
            "20000000000",
            21_000,
            1,
            PASSWORD,
        )
        .unwrap();
    assert!(raw.starts_with("0x"));

    f.core.broadcast_evm_tx(&raw).unwrap();
    assert_eq!(f.evm.broadcasts(), vec![raw]);

    // Explorer outage surfaces as ExternalUnavailable
    f.evm.set_offline(true);
    assert!(matches!(
        f.core.build_and_sign_evm_tx(
            &session,
            &from,
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "1",
            "1",
            21_000,
            1,
            PASSWORD,
        ),
        Err(CoreError::ExternalUnavailable(_))
    ));

    // A foreign sender address is rejected before any signing
    f.evm.set_offline(false);
    assert!(matches!(
        f.core.build_and_sign_evm_tx(
            &session,
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            &from,
            "1",
            "1",
            21_000,
            1,
            PASSWORD,
        ),
        Err(CoreError::InvalidInput(_))
    ));
}

#[test]
fn token_registry_flow() {
    let f = fixture();
    let session = onboard(&f, "leo");

    f.core
        .register_token(
            &session,
            "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
            "USDC",
            "USD Coin",
            6,
        )
        .unwrap();
    let tokens = f.core.list_tokens(&session).unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].symbol, "USDC");

    assert!(matches!(
        f.core.register_token(&session, "nonsense", "X", "X", 18),
        Err(CoreError::InvalidInput(_))
    ));
}

#[test]
fn audit_log_traces_the_flow() {
    let f = fixture();
    let session = onboard(&f, "mallory");
    f.core.logout(&session).unwrap();

    let entries = f.core.audit_recent(0).join("\n");
    assert!(entries.contains("op=register"));
    assert!(entries.contains("op=insert_session"));
    assert!(entries.contains("op=deactivate_session"));
}
