//! Email verification codes
//!
//! Six-digit codes drawn uniformly from `[100000, 999999]` by the
//! CSPRNG, valid for ten minutes, one send per sixty seconds, dead
//! after five wrong attempts. All timestamps are UTC unix seconds; the
//! expiry comparison never touches local time.

use satchel_crypto::ct::ct_eq;
use satchel_crypto::rng;
use satchel_store::users::{self, UserRecord};
use satchel_store::Vault;

use crate::AuthError;

/// Code lifetime.
pub const CODE_EXPIRY_SECS: i64 = 600;

/// Minimum gap between sends.
pub const RESEND_INTERVAL_SECS: i64 = 60;

/// Wrong attempts before the code dies.
pub const MAX_CODE_ATTEMPTS: u32 = 5;

/// Draw a fresh 6-digit code.
pub fn generate_code() -> String {
    rng::random_in_range(100_000, 999_999).to_string()
}

/// Issue (or reissue) a code for the user, honoring the resend
/// throttle. Returns the code for the mail template.
pub fn issue_code(vault: &Vault, user: &UserRecord, now: i64) -> Result<String, AuthError> {
    if let Some(last_sent) = user.last_verification_sent_at {
        let elapsed = now - last_sent;
        if elapsed < RESEND_INTERVAL_SECS {
            return Err(AuthError::ResendThrottled {
                retry_after_secs: (RESEND_INTERVAL_SECS - elapsed) as u64,
            });
        }
    }
    let code = generate_code();
    users::set_verification_code(vault, user.id, &code, now + CODE_EXPIRY_SECS)?;
    Ok(code)
}

/// Check a submitted code against the stored state.
///
/// On success the email is marked verified and the code cleared; on
/// failure the attempt counter advances and the caller learns only the
/// remaining attempt count.
pub fn check_code(
    vault: &Vault,
    user: &UserRecord,
    submitted: &str,
    now: i64,
) -> Result<(), AuthError> {
    let Some(stored) = user.verification_code.as_deref() else {
        return Err(AuthError::NoCodeOutstanding);
    };

    if user.verification_attempts >= MAX_CODE_ATTEMPTS {
        return Err(AuthError::CodeExhausted);
    }

    let expires_at = user.verification_expires_at.unwrap_or(i64::MIN);
    if now > expires_at {
        return Err(AuthError::CodeExpired);
    }

    if !ct_eq(stored.as_bytes(), submitted.as_bytes()) {
        let attempts = users::bump_verification_attempts(vault, user.id)?;
        if attempts >= MAX_CODE_ATTEMPTS {
            return Err(AuthError::CodeExhausted);
        }
        return Err(AuthError::CodeInvalid {
            remaining_attempts: MAX_CODE_ATTEMPTS - attempts,
        });
    }

    users::mark_email_verified(vault, user.id)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel_store::users::NewUser;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Vault, UserRecord) {
        let dir = TempDir::new().unwrap();
        let vault = Vault::open(
            &dir.path().join("vault.db"),
            b"0123456789abcdef0123456789abcdef",
        )
        .unwrap();
        let id = users::insert(
            &vault,
            &NewUser {
                username: "verif".into(),
                email: "v@example.com".into(),
                password_hash: "hash".into(),
            },
        )
        .unwrap();
        let user = users::get_by_id(&vault, id).unwrap();
        (dir, vault, user)
    }

    fn refresh(vault: &Vault, user: &UserRecord) -> UserRecord {
        users::get_by_id(vault, user.id).unwrap()
    }

    #[test]
    fn test_code_shape_and_uniformity_bounds() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            let n: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&n));
        }
    }

    #[test]
    fn test_issue_then_verify() {
        let (_dir, vault, user) = setup();
        let now = 1_700_000_000;
        let code = issue_code(&vault, &user, now).unwrap();
        let user = refresh(&vault, &user);
        check_code(&vault, &user, &code, now + 60).unwrap();
        assert!(refresh(&vault, &user).email_verified);
    }

    #[test]
    fn test_resend_throttle() {
        let (_dir, vault, user) = setup();
        let now = 1_700_000_000;
        issue_code(&vault, &user, now).unwrap();
        let user = refresh(&vault, &user);

        // The throttle keys off the stored send timestamp, which is
        // wall-clock "now"; a resend in the same test run is throttled
        let err = issue_code(&vault, &user, Vault::now() + 1).unwrap_err();
        assert!(matches!(err, AuthError::ResendThrottled { .. }));

        // Far enough in the future it passes
        assert!(issue_code(&vault, &user, Vault::now() + RESEND_INTERVAL_SECS + 1).is_ok());
    }

    #[test]
    fn test_expired_code_rejected_at_boundary() {
        let (_dir, vault, user) = setup();
        let now = 1_700_000_000;
        let code = issue_code(&vault, &user, now).unwrap();
        let user = refresh(&vault, &user);

        // Exactly at expiry is still valid; one second past is not
        assert!(check_code(&vault, &user, &code, now + CODE_EXPIRY_SECS).is_ok());

        let code2 = issue_code(&vault, &user, now + CODE_EXPIRY_SECS + 120).unwrap();
        let user = refresh(&vault, &user);
        let late = now + CODE_EXPIRY_SECS + 120 + CODE_EXPIRY_SECS + 1;
        assert!(matches!(
            check_code(&vault, &user, &code2, late),
            Err(AuthError::CodeExpired)
        ));
    }

    #[test]
    fn test_wrong_code_counts_down_then_exhausts() {
        let (_dir, vault, mut user) = setup();
        let now = 1_700_000_000;
        let code = issue_code(&vault, &user, now).unwrap();
        user = refresh(&vault, &user);

        for expected_remaining in [4u32, 3, 2, 1] {
            let err = check_code(&vault, &user, "000000", now + 1).unwrap_err();
            match err {
                AuthError::CodeInvalid { remaining_attempts } => {
                    assert_eq!(remaining_attempts, expected_remaining)
                }
                other => panic!("expected CodeInvalid, got {other:?}"),
            }
            user = refresh(&vault, &user);
        }

        // Fifth failure exhausts the code
        assert!(matches!(
            check_code(&vault, &user, "000000", now + 1),
            Err(AuthError::CodeExhausted)
        ));
        user = refresh(&vault, &user);

        // Even the right code is dead now
        assert!(matches!(
            check_code(&vault, &user, &code, now + 1),
            Err(AuthError::CodeExhausted)
        ));
    }

    #[test]
    fn test_no_code_outstanding() {
        let (_dir, vault, user) = setup();
        assert!(matches!(
            check_code(&vault, &user, "123456", 1_700_000_000),
            Err(AuthError::NoCodeOutstanding)
        ));
    }
}
