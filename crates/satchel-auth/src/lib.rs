//! Satchel authentication
//!
//! Local password authentication, login rate limiting, email
//! verification codes, the session state machine, and the sealing of
//! seed material under password-derived keys.
//!
//! Authentication errors never reveal which half of a credential was
//! wrong; the only signal is the in-window attempt count.

pub mod password;
pub mod rate_limit;
pub mod seal;
pub mod session;
pub mod verification;

use thiserror::Error;

use satchel_crypto::CryptoError;
use satchel_store::VaultError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid username: {0}")]
    InvalidUsername(String),
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Weak password: {0}")]
    WeakPassword(String),
    #[error("Invalid credentials")]
    InvalidCredentials { remaining_attempts: Option<u32> },
    #[error("Rate limited; retry in {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },
    #[error("Verification code expired")]
    CodeExpired,
    #[error("Verification code invalid")]
    CodeInvalid { remaining_attempts: u32 },
    #[error("Too many wrong verification attempts")]
    CodeExhausted,
    #[error("Resend throttled; retry in {retry_after_secs} seconds")]
    ResendThrottled { retry_after_secs: u64 },
    #[error("No verification code outstanding")]
    NoCodeOutstanding,
    #[error("Session is not valid")]
    SessionInvalid,
    #[error("Session expired")]
    SessionExpired,
    #[error("Crypto failure: {0}")]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Vault(#[from] VaultError),
}
