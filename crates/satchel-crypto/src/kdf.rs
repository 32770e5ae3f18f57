//! PBKDF2 key derivation
//!
//! Two instantiations, PBKDF2-HMAC-SHA256 and PBKDF2-HMAC-SHA512, with
//! the iteration counts fixed by policy:
//!
//! | Use | Iterations |
//! |-----|------------|
//! | Wallet/vault key from password | 600 000 (OWASP 2023) |
//! | Login password hashing | 100 000 |
//! | BIP-39 seed stretching | 2 048 (fixed by the BIP) |
//!
//! The 600k derivations take noticeable wall-clock time by design; they
//! must never run on a UI thread.

use pbkdf2::pbkdf2_hmac;
use sha2::{Sha256, Sha512};
use zeroize::Zeroizing;

/// Iterations for deriving the seed-encryption / vault key from a password.
pub const WALLET_KEY_ITERATIONS: u32 = 600_000;

/// Iterations for login password hashing.
pub const LOGIN_HASH_ITERATIONS: u32 = 100_000;

/// Iterations for BIP-39 mnemonic→seed stretching (fixed by the BIP).
pub const BIP39_ITERATIONS: u32 = 2_048;

/// PBKDF2-HMAC-SHA256 into a fresh zeroizing buffer.
pub fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32, len: usize) -> Zeroizing<Vec<u8>> {
    let mut out = Zeroizing::new(vec![0u8; len]);
    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
    out
}

/// PBKDF2-HMAC-SHA512 into a fresh zeroizing buffer.
pub fn pbkdf2_sha512(password: &[u8], salt: &[u8], iterations: u32, len: usize) -> Zeroizing<Vec<u8>> {
    let mut out = Zeroizing::new(vec![0u8; len]);
    pbkdf2_hmac::<Sha512>(password, salt, iterations, &mut out);
    out
}
