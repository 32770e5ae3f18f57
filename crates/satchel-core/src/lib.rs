//! Satchel core
//!
//! One explicit [`Core`] value owns the vault handle, the session
//! table, the rate limiter, and the injected collaborators (mailer,
//! explorers). Everything the GUI/CLI calls goes through it; nothing
//! here is a process-wide singleton except the secp256k1 context the
//! crypto layer manages.
//!
//! Seed handling: a successful login unseals the wallet seed into a
//! per-session zeroizing buffer, wiped on logout or expiry. Spending
//! and seed-reveal operations re-authenticate with the password even
//! inside a live session.

pub mod error;

pub use error::CoreError;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use zeroize::Zeroizing;

use satchel_auth::rate_limit::RateLimiter;
use satchel_auth::session::SessionManager;
use satchel_auth::{password, seal, verification, AuthError};
use satchel_crypto::memory;
use satchel_explorer::{BtcExplorer, EvmExplorer};
use satchel_keys::address::{self, Chain};
use satchel_keys::mnemonic::Mnemonic;
use satchel_keys::path::DerivationPath;
use satchel_keys::xkey::Xprv;
use satchel_notify::{templates, Mailer};
use satchel_store::users::NewUser;
use satchel_store::wallets::WalletSeed;
use satchel_store::{sessions, users, wallets, Vault, VaultError};
use satchel_tx::btc::{self, Utxo};
use satchel_tx::evm::{self, EvmTx};

/// How many indices per change branch are scanned when matching the
/// caller's addresses back to keys. Callers with deeper wallets chunk
/// their requests.
pub const ADDRESS_SCAN_LIMIT: u32 = 100;

const VERIFICATION_EXPIRY_MINUTES: u64 = 10;

/// Result of a successful registration. The mnemonic is shown once and
/// never stored.
pub struct Registration {
    pub user_id: i64,
    pub mnemonic: Zeroizing<String>,
}

/// Outcome of a login attempt that passed credential checks.
#[derive(Debug)]
pub enum LoginOutcome {
    SessionIssued { session_id: String },
    /// A verification code was issued (or is still outstanding); the
    /// caller must complete `verify_email_code` and log in again.
    RequiresEmailVerification,
}

/// A signed, broadcast-ready Bitcoin transaction.
pub struct SignedBtcTx {
    pub raw_hex: String,
    pub txid: String,
}

pub struct Core {
    vault: Arc<Vault>,
    sessions: SessionManager,
    limiter: RateLimiter,
    mailer: Arc<dyn Mailer>,
    btc_explorer: Arc<dyn BtcExplorer>,
    evm_explorer: Arc<dyn EvmExplorer>,
    unlocked: Mutex<HashMap<String, Zeroizing<[u8; 64]>>>,
}

impl Core {
    /// Assemble the core around an opened vault and its collaborators.
    pub fn new(
        vault: Vault,
        mailer: Arc<dyn Mailer>,
        btc_explorer: Arc<dyn BtcExplorer>,
        evm_explorer: Arc<dyn EvmExplorer>,
    ) -> Self {
        memory::disable_core_dumps();
        let vault = Arc::new(vault);
        Self {
            sessions: SessionManager::new(vault.clone()),
            limiter: RateLimiter::new(),
            mailer,
            btc_explorer,
            evm_explorer,
            unlocked: Mutex::new(HashMap::new()),
            vault,
        }
    }

    /// The underlying vault, for maintenance operations (backup, key
    /// rotation, integrity checks).
    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    // ------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------

    /// Create a user and a fresh 12-word wallet in one transaction.
    /// Returns the mnemonic exactly once for the user to back up.
    pub fn register(
        &self,
        username: &str,
        email: &str,
        pass: &str,
    ) -> Result<Registration, CoreError> {
        password::validate_username(username)?;
        password::validate_email(email)?;
        password::validate_password(pass)?;

        let mnemonic = Mnemonic::generate(128)?;
        let seed = mnemonic.to_seed("");
        let sealed = seal::seal_seed(pass, &seed)?;

        let (user_id, _wallet_id) = wallets::create_user_with_wallet(
            &self.vault,
            &NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash: password::create_hash(pass)?,
            },
            &WalletSeed {
                name: "default".to_string(),
                encrypted_seed: sealed.encrypted_seed,
                salt: sealed.salt,
                verification_hash: sealed.verification_hash,
                kdf_iterations: sealed.kdf_iterations,
            },
        )?;

        log::info!("registered user {username}");
        Ok(Registration {
            user_id,
            mnemonic: mnemonic.phrase(),
        })
    }

    /// Authenticate. First-time users must verify their email before a
    /// session is issued.
    pub fn login(
        &self,
        username: &str,
        pass: &str,
        client_metadata: Option<String>,
    ) -> Result<LoginOutcome, CoreError> {
        self.limiter.check(username)?;

        let user = match users::get_by_username(&self.vault, username) {
            Ok(user) => user,
            Err(VaultError::NotFound) => return Err(self.credential_failure(username)),
            Err(e) => return Err(e.into()),
        };

        if !password::verify(pass, &user.password_hash) {
            return Err(self.credential_failure(username));
        }
        self.limiter.clear(username);

        if !user.email_verified {
            match verification::issue_code(&self.vault, &user, Vault::now()) {
                Ok(code) => {
                    let msg = templates::verification_code(
                        &user.username,
                        &code,
                        VERIFICATION_EXPIRY_MINUTES,
                    );
                    self.mailer.send_mail(&user.email, &msg.subject, &msg.body)?;
                }
                // A code is already outstanding; no new mail
                Err(AuthError::ResendThrottled { .. }) => {}
                Err(e) => return Err(e.into()),
            }
            return Ok(LoginOutcome::RequiresEmailVerification);
        }

        users::touch_last_login(&self.vault, user.id)?;

        let wallet = wallets::get_by_user(&self.vault, user.id)?;
        let seed = seal::open_seed(pass, &wallet)?;

        let session_id = self.sessions.create(user.id, false, client_metadata)?;
        self.unlocked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session_id.clone(), seed);

        log::info!("user {username} logged in");
        Ok(LoginOutcome::SessionIssued { session_id })
    }

    /// Check a submitted email verification code.
    pub fn verify_email_code(&self, username: &str, code: &str) -> Result<(), CoreError> {
        let user = users::get_by_username(&self.vault, username)?;
        verification::check_code(&self.vault, &user, code, Vault::now())?;
        log::info!("email verified for {username}");
        Ok(())
    }

    /// Re-send the verification code, honoring the 60-second throttle.
    pub fn resend_code(&self, username: &str) -> Result<(), CoreError> {
        let user = users::get_by_username(&self.vault, username)?;
        let code = verification::issue_code(&self.vault, &user, Vault::now())?;
        let msg =
            templates::verification_code(&user.username, &code, VERIFICATION_EXPIRY_MINUTES);
        self.mailer.send_mail(&user.email, &msg.subject, &msg.body)?;
        Ok(())
    }

    /// Revoke a session and wipe its unsealed seed.
    pub fn logout(&self, session_id: &str) -> Result<(), CoreError> {
        self.unlocked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id);
        self.sessions.revoke(session_id)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Seed custody
    // ------------------------------------------------------------------

    /// Reveal the seed as hex. Requires the password again; the rate
    /// limiter treats failures like login failures.
    pub fn reveal_seed(
        &self,
        username: &str,
        pass: &str,
    ) -> Result<Zeroizing<String>, CoreError> {
        self.limiter.check(username)?;
        let user = match users::get_by_username(&self.vault, username) {
            Ok(user) => user,
            Err(VaultError::NotFound) => return Err(self.credential_failure(username)),
            Err(e) => return Err(e.into()),
        };
        if !password::verify(pass, &user.password_hash) {
            return Err(self.credential_failure(username));
        }
        self.limiter.clear(username);

        let wallet = wallets::get_by_user(&self.vault, user.id)?;
        let seed = seal::open_seed(pass, &wallet)?;
        self.vault.audit().record("reveal_seed", &format!("username={username}"), true);
        Ok(Zeroizing::new(hex::encode(&seed[..])))
    }

    /// Replace the stored seed from a recovery phrase. Requires the
    /// password; revokes every live session for the user.
    pub fn restore_from_seed(
        &self,
        username: &str,
        mnemonic_phrase: &str,
        passphrase: &str,
        pass: &str,
    ) -> Result<(), CoreError> {
        self.limiter.check(username)?;
        let user = match users::get_by_username(&self.vault, username) {
            Ok(user) => user,
            Err(VaultError::NotFound) => return Err(self.credential_failure(username)),
            Err(e) => return Err(e.into()),
        };
        if !password::verify(pass, &user.password_hash) {
            return Err(self.credential_failure(username));
        }
        self.limiter.clear(username);

        let mnemonic = Mnemonic::from_phrase(mnemonic_phrase)?;
        let seed = mnemonic.to_seed(passphrase);
        let sealed = seal::seal_seed(pass, &seed)?;

        wallets::insert(
            &self.vault,
            &satchel_store::wallets::NewWallet {
                user_id: user.id,
                name: "default".to_string(),
                encrypted_seed: sealed.encrypted_seed,
                salt: sealed.salt,
                verification_hash: sealed.verification_hash,
                kdf_iterations: sealed.kdf_iterations,
            },
            true,
        )?;

        // Old sessions point at the replaced wallet; kill them
        let mut unlocked = self.unlocked.lock().unwrap_or_else(|e| e.into_inner());
        for session in sessions::active_for_user(&self.vault, user.id)? {
            unlocked.remove(&session.session_id);
            let _ = sessions::deactivate(&self.vault, &session.session_id);
        }
        drop(unlocked);

        // Best-effort notice; restore already succeeded
        let msg = templates::seed_restored(&user.username);
        if let Err(e) = self.mailer.send_mail(&user.email, &msg.subject, &msg.body) {
            log::warn!("restore notice not sent: {e}");
        }
        log::info!("seed restored for {username}");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Derivation and signing
    // ------------------------------------------------------------------

    /// Derive the address at `m/44'/coin'/account'/change/index` for an
    /// unlocked session.
    pub fn derive_address(
        &self,
        session_id: &str,
        chain: Chain,
        account: u32,
        change: u32,
        index: u32,
    ) -> Result<String, CoreError> {
        self.validate_session(session_id)?;
        if change > 1 {
            return Err(CoreError::InvalidInput("change must be 0 or 1".into()));
        }
        let seed = self.session_seed(session_id)?;

        let master = Xprv::new_master(&seed[..])?;
        let path = DerivationPath::bip44(chain.coin_type(), account, change, index);
        let node = master.derive_path(&path)?;
        Ok(address::address_for(chain, &node.public_key())?)
    }

    /// Build and sign a Bitcoin-family P2PKH transaction from the
    /// caller-supplied UTXO set. Change returns to the first source
    /// address. Does not broadcast.
    #[allow(clippy::too_many_arguments)]
    pub fn build_and_sign_btc_tx(
        &self,
        session_id: &str,
        from_addrs: &[String],
        utxos: Vec<Utxo>,
        to_addr: &str,
        amount: u64,
        fee_per_byte: u64,
        pass: &str,
    ) -> Result<SignedBtcTx, CoreError> {
        let user_id = self.validate_session(session_id)?;
        let (first_from, chain) = match from_addrs.first() {
            Some(addr) => match address::detect_chain(addr) {
                Some(chain) if chain.is_bitcoin_family() => (addr, chain),
                _ => {
                    return Err(CoreError::InvalidInput(
                        "source addresses are not a Bitcoin-family chain".into(),
                    ))
                }
            },
            None => return Err(CoreError::InvalidInput("no source addresses".into())),
        };
        if !address::is_valid_address(chain, to_addr) {
            return Err(CoreError::InvalidInput(format!(
                "destination is not a valid {chain:?} address"
            )));
        }
        if amount == 0 {
            return Err(CoreError::InvalidInput("amount must be positive".into()));
        }

        // Spending re-authenticates with the password
        let wallet = wallets::get_by_user(&self.vault, user_id)?;
        let seed = seal::open_seed(pass, &wallet)?;

        let keys = self.scan_btc_keys(&seed, chain, from_addrs)?;
        let spendable: Vec<Utxo> = utxos
            .into_iter()
            .filter(|u| keys.contains_key(&u.address))
            .collect();

        let selection = btc::select_coins(&spendable, amount, fee_per_byte)?;
        let to_script = btc::p2pkh_script(&address::p2pkh_pubkey_hash(chain, to_addr)?);
        let change_script = btc::p2pkh_script(&address::p2pkh_pubkey_hash(chain, first_from)?);
        let mut tx = btc::build_unsigned(&selection, to_script, change_script, amount);

        let prevouts: Vec<Vec<u8>> = selection
            .utxos
            .iter()
            .map(|u| u.script_pubkey.clone())
            .collect();
        let input_keys: Vec<Zeroizing<[u8; 32]>> = selection
            .utxos
            .iter()
            .map(|u| keys[&u.address].clone())
            .collect();
        btc::sign_all(&mut tx, &prevouts, &input_keys)?;

        self.vault
            .audit()
            .record("sign_btc_tx", &format!("user_id={user_id} amount={amount}"), true);
        Ok(SignedBtcTx {
            raw_hex: hex::encode(btc::serialize(&tx)),
            txid: btc::txid(&tx),
        })
    }

    /// Build and sign an EIP-155 legacy transfer. The nonce comes from
    /// the EVM explorer. Does not broadcast.
    #[allow(clippy::too_many_arguments)]
    pub fn build_and_sign_evm_tx(
        &self,
        session_id: &str,
        from: &str,
        to: &str,
        value_wei: &str,
        gas_price_wei: &str,
        gas_limit: u64,
        chain_id: u64,
        pass: &str,
    ) -> Result<String, CoreError> {
        let user_id = self.validate_session(session_id)?;
        if !address::is_valid_evm_address(from) || !address::is_valid_evm_address(to) {
            return Err(CoreError::InvalidInput("invalid EVM address".into()));
        }
        let value = parse_wei(value_wei)?;
        let gas_price = parse_wei(gas_price_wei)?;

        let wallet = wallets::get_by_user(&self.vault, user_id)?;
        let seed = seal::open_seed(pass, &wallet)?;
        let key = self.scan_evm_key(&seed, from)?;

        let nonce = self.evm_explorer.get_tx_count(from)?;

        let mut to_bytes = [0u8; 20];
        to_bytes.copy_from_slice(&hex::decode(&to[2..]).expect("validated hex"));

        let tx = EvmTx {
            nonce,
            gas_price,
            gas_limit,
            to: to_bytes,
            value,
            data: Vec::new(),
            chain_id,
        };
        let signed = evm::sign(&tx, &key)?;

        self.vault.audit().record(
            "sign_evm_tx",
            &format!("user_id={user_id} chain_id={chain_id}"),
            true,
        );
        Ok(evm::raw_hex(&signed))
    }

    /// Broadcast a signed Bitcoin transaction via the explorer.
    pub fn broadcast_btc_tx(&self, raw_hex: &str) -> Result<String, CoreError> {
        Ok(self.btc_explorer.broadcast_raw(raw_hex)?)
    }

    /// Broadcast a signed EVM transaction via the explorer.
    pub fn broadcast_evm_tx(&self, raw_hex: &str) -> Result<String, CoreError> {
        Ok(self.evm_explorer.send_raw_transaction(raw_hex)?)
    }

    // ------------------------------------------------------------------
    // Token registry
    // ------------------------------------------------------------------

    /// Track an ERC-20 contract for the session's wallet.
    pub fn register_token(
        &self,
        session_id: &str,
        contract_address: &str,
        symbol: &str,
        name: &str,
        decimals: u8,
    ) -> Result<(), CoreError> {
        let user_id = self.validate_session(session_id)?;
        let wallet = wallets::get_by_user(&self.vault, user_id)?;
        satchel_store::tokens::add(
            &self.vault,
            wallet.id,
            contract_address,
            symbol,
            name,
            decimals,
        )?;
        Ok(())
    }

    /// The tracked ERC-20 contracts for the session's wallet.
    pub fn list_tokens(
        &self,
        session_id: &str,
    ) -> Result<Vec<satchel_store::tokens::TokenRecord>, CoreError> {
        let user_id = self.validate_session(session_id)?;
        let wallet = wallets::get_by_user(&self.vault, user_id)?;
        Ok(satchel_store::tokens::list(&self.vault, wallet.id)?)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn credential_failure(&self, identifier: &str) -> CoreError {
        let remaining = self.limiter.record_failure(identifier);
        CoreError::InvalidCredentials {
            remaining_attempts: Some(remaining),
        }
    }

    fn validate_session(&self, session_id: &str) -> Result<i64, CoreError> {
        match self.sessions.validate(session_id) {
            Ok(user_id) => Ok(user_id),
            Err(e) => {
                // Expiry is terminal; drop the unsealed seed with it
                if matches!(e, AuthError::SessionExpired) {
                    self.unlocked
                        .lock()
                        .unwrap_or_else(|p| p.into_inner())
                        .remove(session_id);
                }
                Err(e.into())
            }
        }
    }

    fn session_seed(&self, session_id: &str) -> Result<Zeroizing<[u8; 64]>, CoreError> {
        self.unlocked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(session_id)
            .cloned()
            .ok_or(CoreError::InvalidCredentials {
                remaining_attempts: None,
            })
    }

    /// Map the caller's Bitcoin-family addresses back to private keys
    /// by scanning both change branches of account 0.
    fn scan_btc_keys(
        &self,
        seed: &Zeroizing<[u8; 64]>,
        chain: Chain,
        from_addrs: &[String],
    ) -> Result<HashMap<String, Zeroizing<[u8; 32]>>, CoreError> {
        let master = Xprv::new_master(&seed[..])?;
        let account = master.derive_path(&DerivationPath::bip44_account(chain.coin_type(), 0))?;

        let mut keys = HashMap::new();
        for change in 0..=1u32 {
            let branch = account.derive_child(change)?;
            for index in 0..ADDRESS_SCAN_LIMIT {
                let node = match branch.derive_child(index) {
                    Ok(node) => node,
                    // Curve-edge index; BIP-32 says skip it
                    Err(_) => continue,
                };
                let addr = address::address_for(chain, &node.public_key())?;
                if from_addrs.contains(&addr) {
                    keys.insert(addr, Zeroizing::new(*node.secret_bytes()));
                }
            }
            if keys.len() == from_addrs.len() {
                break;
            }
        }

        if keys.is_empty() {
            return Err(CoreError::InvalidInput(
                "no source address belongs to this wallet".into(),
            ));
        }
        Ok(keys)
    }

    /// Find the key whose EVM address matches `from` on the standard
    /// receive branch.
    fn scan_evm_key(
        &self,
        seed: &Zeroizing<[u8; 64]>,
        from: &str,
    ) -> Result<Zeroizing<[u8; 32]>, CoreError> {
        let master = Xprv::new_master(&seed[..])?;
        let branch = master
            .derive_path(&DerivationPath::bip44_account(Chain::Ethereum.coin_type(), 0))?
            .derive_child(0)?;
        for index in 0..ADDRESS_SCAN_LIMIT {
            let node = match branch.derive_child(index) {
                Ok(node) => node,
                // Curve-edge index; BIP-32 says skip it
                Err(_) => continue,
            };
            let addr = address::evm_address(&node.public_key())?;
            if addr.eq_ignore_ascii_case(from) {
                return Ok(Zeroizing::new(*node.secret_bytes()));
            }
        }
        Err(CoreError::InvalidInput(
            "sender address does not belong to this wallet".into(),
        ))
    }

    /// Recent audit entries, for diagnostics surfaces.
    pub fn audit_recent(&self, max: usize) -> Vec<String> {
        self.vault.audit().recent(max)
    }
}

/// Parse a decimal wei string into a u128.
fn parse_wei(s: &str) -> Result<u128, CoreError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::InvalidInput(format!(
            "not a decimal wei amount: {s}"
        )));
    }
    s.parse()
        .map_err(|_| CoreError::InvalidInput(format!("wei amount out of range: {s}")))
}
