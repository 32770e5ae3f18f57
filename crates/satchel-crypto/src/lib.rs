//! Satchel cryptographic primitives
//!
//! Everything the wallet layers above build on: hashes, HMAC, PBKDF2,
//! authenticated encryption, the process-wide secp256k1 context, the
//! OS CSPRNG, TOTP, and the wire encodings (Base58Check, Base32, RLP,
//! Bitcoin VarInt, minimal big-endian integers).
//!
//! # Security Notes
//!
//! - All secret comparisons go through [`ct::ct_eq`] (constant time)
//! - Buffers holding key material are wrapped in `zeroize::Zeroizing`
//!   by callers; helpers here wipe their own intermediates
//! - The RNG is the OS CSPRNG with no seedable path

pub mod aead;
pub mod ct;
pub mod ec;
pub mod encoding;
pub mod hash;
pub mod kdf;
pub mod memory;
pub mod rng;
pub mod totp;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("RNG failure: {0}")]
    Rng(String),
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Invalid tweak")]
    InvalidTweak,
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}
