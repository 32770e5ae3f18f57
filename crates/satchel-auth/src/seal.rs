//! Seed sealing under password-derived keys
//!
//! The BIP-39 seed never touches disk in the clear. Sealing derives a
//! 32-byte key with PBKDF2-HMAC-SHA256 (600 000 iterations, 32-byte
//! salt), encrypts the seed with AES-256-GCM, and keeps SHA-256 of the
//! derived key as a cheap password check so a wrong password is
//! rejected without an AEAD attempt. Every intermediate is wiped.

use zeroize::Zeroizing;

use satchel_crypto::aead;
use satchel_crypto::ct::ct_eq;
use satchel_crypto::hash::sha256;
use satchel_crypto::kdf::{pbkdf2_sha256, WALLET_KEY_ITERATIONS};
use satchel_crypto::rng;
use satchel_store::wallets::WalletRecord;

use crate::AuthError;

const SALT_LEN: usize = 32;

/// The sealed form of a seed, ready for the wallet repository.
pub struct SealedSeed {
    pub encrypted_seed: Vec<u8>,
    pub salt: Vec<u8>,
    pub verification_hash: Vec<u8>,
    pub kdf_iterations: u32,
}

fn derive_key(
    password: &str,
    salt: &[u8],
    iterations: u32,
) -> Result<Zeroizing<[u8; 32]>, AuthError> {
    let dk = pbkdf2_sha256(password.as_bytes(), salt, iterations, 32);
    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&dk);
    Ok(key)
}

/// Seal a 64-byte seed under `password`.
pub fn seal_seed(password: &str, seed: &[u8; 64]) -> Result<SealedSeed, AuthError> {
    let salt: [u8; SALT_LEN] = rng::random_array()?;
    let key = derive_key(password, &salt, WALLET_KEY_ITERATIONS)?;
    let encrypted_seed = aead::encrypt(&key, seed, b"")?;
    let verification_hash = sha256(&*key).to_vec();

    Ok(SealedSeed {
        encrypted_seed,
        salt: salt.to_vec(),
        verification_hash,
        kdf_iterations: WALLET_KEY_ITERATIONS,
    })
}

/// Open a wallet's sealed seed with `password`.
///
/// A wrong password fails the verification-hash check (constant time)
/// before any decryption runs; the AEAD tag would catch it anyway.
pub fn open_seed(password: &str, wallet: &WalletRecord) -> Result<Zeroizing<[u8; 64]>, AuthError> {
    let key = derive_key(password, &wallet.salt, wallet.kdf_iterations)?;

    let key_hash = sha256(&*key);
    if !ct_eq(&key_hash, &wallet.verification_hash) {
        return Err(AuthError::InvalidCredentials {
            remaining_attempts: None,
        });
    }

    let plaintext = aead::decrypt(&key, &wallet.encrypted_seed, b"").map_err(|_| {
        AuthError::InvalidCredentials {
            remaining_attempts: None,
        }
    })?;
    if plaintext.len() != 64 {
        return Err(AuthError::InvalidCredentials {
            remaining_attempts: None,
        });
    }

    let mut seed = Zeroizing::new([0u8; 64]);
    seed.copy_from_slice(&plaintext);
    Ok(seed)
}
