//! The flat error taxonomy exposed to callers
//!
//! Subsystem errors collapse into one enum at the core boundary. No
//! variant carries derived intermediates; authentication failures say
//! nothing beyond the in-window attempt count.

use thiserror::Error;

use satchel_auth::AuthError;
use satchel_crypto::CryptoError;
use satchel_explorer::ExplorerError;
use satchel_keys::address::AddressError;
use satchel_keys::mnemonic::MnemonicError;
use satchel_keys::path::PathError;
use satchel_keys::xkey::XkeyError;
use satchel_notify::NotifyError;
use satchel_store::VaultError;
use satchel_tx::btc::BtcError;
use satchel_tx::evm::EvmError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid credentials")]
    InvalidCredentials { remaining_attempts: Option<u32> },
    #[error("Rate limited; retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("Not found")]
    NotFound,
    #[error("Already exists")]
    AlreadyExists,
    #[error("Derivation failed at this index; retry with the next one")]
    InvalidDerivation,
    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },
    #[error("Cryptographic failure")]
    CryptoFailure(String),
    #[error("Vault corrupt: {0}")]
    VaultCorrupt(String),
    #[error("External service unavailable: {0}")]
    ExternalUnavailable(String),
    #[error("System error: {0}")]
    SystemError(String),
}

impl From<VaultError> for CoreError {
    fn from(e: VaultError) -> Self {
        match e {
            VaultError::NotFound => CoreError::NotFound,
            VaultError::AlreadyExists(_) => CoreError::AlreadyExists,
            VaultError::WrongKey => CoreError::InvalidCredentials {
                remaining_attempts: None,
            },
            VaultError::Corrupt(msg) => CoreError::VaultCorrupt(msg),
            VaultError::InvalidInput(msg) => CoreError::InvalidInput(msg),
            VaultError::KeyTooShort => CoreError::InvalidInput("vault key too short".into()),
            VaultError::Crypto(c) => CoreError::CryptoFailure(c.to_string()),
            VaultError::Busy => CoreError::SystemError("vault busy".into()),
            VaultError::Sql(msg) | VaultError::Io(msg) => CoreError::SystemError(msg),
        }
    }
}

impl From<AuthError> for CoreError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidUsername(m) | AuthError::WeakPassword(m) => {
                CoreError::InvalidInput(m)
            }
            AuthError::InvalidEmail => CoreError::InvalidInput("invalid email address".into()),
            AuthError::InvalidCredentials { remaining_attempts } => {
                CoreError::InvalidCredentials { remaining_attempts }
            }
            AuthError::RateLimited { retry_after_secs } => {
                CoreError::RateLimited { retry_after_secs }
            }
            AuthError::ResendThrottled { retry_after_secs } => {
                CoreError::RateLimited { retry_after_secs }
            }
            AuthError::CodeExpired => CoreError::InvalidInput("verification code expired".into()),
            AuthError::CodeInvalid { remaining_attempts } => CoreError::InvalidCredentials {
                remaining_attempts: Some(remaining_attempts),
            },
            AuthError::CodeExhausted => CoreError::InvalidCredentials {
                remaining_attempts: Some(0),
            },
            AuthError::NoCodeOutstanding => {
                CoreError::InvalidInput("no verification code outstanding".into())
            }
            AuthError::SessionInvalid | AuthError::SessionExpired => {
                CoreError::InvalidCredentials {
                    remaining_attempts: None,
                }
            }
            AuthError::Crypto(c) => CoreError::CryptoFailure(c.to_string()),
            AuthError::Vault(v) => v.into(),
        }
    }
}

impl From<CryptoError> for CoreError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::Rng(m) => CoreError::SystemError(format!("RNG failure: {m}")),
            other => CoreError::CryptoFailure(other.to_string()),
        }
    }
}

impl From<MnemonicError> for CoreError {
    fn from(e: MnemonicError) -> Self {
        match e {
            MnemonicError::Rng(m) => CoreError::SystemError(m),
            other => CoreError::InvalidInput(other.to_string()),
        }
    }
}

impl From<XkeyError> for CoreError {
    fn from(e: XkeyError) -> Self {
        match e {
            XkeyError::InvalidDerivation | XkeyError::HardenedFromPublic => {
                CoreError::InvalidDerivation
            }
            other => CoreError::InvalidInput(other.to_string()),
        }
    }
}

impl From<PathError> for CoreError {
    fn from(e: PathError) -> Self {
        CoreError::InvalidInput(e.to_string())
    }
}

impl From<AddressError> for CoreError {
    fn from(e: AddressError) -> Self {
        CoreError::InvalidInput(e.to_string())
    }
}

impl From<BtcError> for CoreError {
    fn from(e: BtcError) -> Self {
        match e {
            BtcError::InsufficientFunds { needed, available } => {
                CoreError::InsufficientFunds { needed, available }
            }
            BtcError::Signing(m) => CoreError::CryptoFailure(m),
            other => CoreError::InvalidInput(other.to_string()),
        }
    }
}

impl From<EvmError> for CoreError {
    fn from(e: EvmError) -> Self {
        match e {
            EvmError::Signing(m) | EvmError::Recovery(m) => CoreError::CryptoFailure(m),
            other => CoreError::InvalidInput(other.to_string()),
        }
    }
}

impl From<ExplorerError> for CoreError {
    fn from(e: ExplorerError) -> Self {
        CoreError::ExternalUnavailable(e.to_string())
    }
}

impl From<NotifyError> for CoreError {
    fn from(e: NotifyError) -> Self {
        CoreError::ExternalUnavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vault_error_mapping() {
        assert!(matches!(
            CoreError::from(VaultError::NotFound),
            CoreError::NotFound
        ));
        assert!(matches!(
            CoreError::from(VaultError::AlreadyExists("x".into())),
            CoreError::AlreadyExists
        ));
        assert!(matches!(
            CoreError::from(VaultError::Corrupt("bad page".into())),
            CoreError::VaultCorrupt(_)
        ));
    }

    #[test]
    fn test_insufficient_funds_carries_amounts() {
        let e = CoreError::from(BtcError::InsufficientFunds {
            needed: 100,
            available: 42,
        });
        match e {
            CoreError::InsufficientFunds { needed, available } => {
                assert_eq!((needed, available), (100, 42));
            }
            other => panic!("wrong mapping: {other:?}"),
        }
    }

    #[test]
    fn test_auth_errors_do_not_leak() {
        let e = CoreError::from(AuthError::InvalidCredentials {
            remaining_attempts: Some(3),
        });
        // Display carries no username/password detail
        assert_eq!(e.to_string(), "Invalid credentials");
    }
}
