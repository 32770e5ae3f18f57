//! Password hashing and input validation
//!
//! Stored hash format: `pbkdf2-sha256$<iterations>$<saltB64>$<dkB64>`
//! with 100 000 iterations, a 16-byte salt, and a 32-byte derived key.
//! Verification re-derives with the stored parameters and compares in
//! constant time.
//!
//! The password rule is the strict one: at least 8 characters with
//! upper, lower, digit, and symbol.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use zeroize::Zeroizing;

use satchel_crypto::ct::ct_eq;
use satchel_crypto::kdf::{pbkdf2_sha256, LOGIN_HASH_ITERATIONS};
use satchel_crypto::rng;

use crate::AuthError;

const SALT_LEN: usize = 16;
const DK_LEN: usize = 32;
const SCHEME: &str = "pbkdf2-sha256";

/// Hash a password for storage.
pub fn create_hash(password: &str) -> Result<String, AuthError> {
    create_hash_with_iterations(password, LOGIN_HASH_ITERATIONS)
}

fn create_hash_with_iterations(password: &str, iterations: u32) -> Result<String, AuthError> {
    let salt: [u8; SALT_LEN] = rng::random_array()?;
    let dk = pbkdf2_sha256(password.as_bytes(), &salt, iterations, DK_LEN);
    Ok(format!(
        "{SCHEME}${iterations}${}${}",
        BASE64.encode(salt),
        BASE64.encode(&*dk)
    ))
}

/// Verify a password against a stored hash. Wrong passwords and
/// malformed hashes both come back `false`; neither says which.
pub fn verify(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iter_str), Some(salt_b64), Some(dk_b64), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != SCHEME {
        return false;
    }
    let Ok(iterations) = iter_str.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (BASE64.decode(salt_b64), BASE64.decode(dk_b64)) else {
        return false;
    };
    if iterations == 0 || expected.len() != DK_LEN {
        return false;
    }

    let dk: Zeroizing<Vec<u8>> =
        pbkdf2_sha256(password.as_bytes(), &salt, iterations, expected.len());
    ct_eq(&dk, &expected)
}

/// Username rule: 3–50 chars from `[A-Za-z0-9_-]`.
pub fn validate_username(username: &str) -> Result<(), AuthError> {
    if !(3..=50).contains(&username.len()) {
        return Err(AuthError::InvalidUsername(
            "must be 3 to 50 characters".into(),
        ));
    }
    if !username
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err(AuthError::InvalidUsername(
            "only letters, digits, '_' and '-' are allowed".into(),
        ));
    }
    Ok(())
}

/// Strict password rule: ≥ 8 chars with upper, lower, digit, symbol.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < 8 {
        return Err(AuthError::WeakPassword("at least 8 characters".into()));
    }
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password
        .chars()
        .any(|c| !c.is_ascii_alphanumeric());
    if !(has_upper && has_lower && has_digit && has_symbol) {
        return Err(AuthError::WeakPassword(
            "needs an uppercase letter, a lowercase letter, a digit, and a symbol".into(),
        ));
    }
    Ok(())
}

/// Just enough email validation to catch obvious typos; deliverability
/// is proven by the verification code, not the syntax.
pub fn validate_email(email: &str) -> Result<(), AuthError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(AuthError::InvalidEmail);
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') || email.contains(' ') {
        return Err(AuthError::InvalidEmail);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_format() {
        let hash = create_hash("Correct-Horse-7").unwrap();
        let parts: Vec<_> = hash.split('$').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "pbkdf2-sha256");
        assert_eq!(parts[1], "100000");
        assert_eq!(BASE64.decode(parts[2]).unwrap().len(), SALT_LEN);
        assert_eq!(BASE64.decode(parts[3]).unwrap().len(), DK_LEN);
    }

    #[test]
    fn test_verify_roundtrip() {
        let hash = create_hash_with_iterations("S3cret!pass", 1_000).unwrap();
        assert!(verify("S3cret!pass", &hash));
        assert!(!verify("S3cret!pasS", &hash));
        assert!(!verify("", &hash));
    }

    #[test]
    fn test_same_password_different_hashes() {
        let a = create_hash_with_iterations("S3cret!pass", 1_000).unwrap();
        let b = create_hash_with_iterations("S3cret!pass", 1_000).unwrap();
        assert_ne!(a, b); // fresh salt per hash
        assert!(verify("S3cret!pass", &a));
        assert!(verify("S3cret!pass", &b));
    }

    #[test]
    fn test_malformed_hashes_fail_closed() {
        for bad in [
            "",
            "plaintext",
            "pbkdf2-sha256$100$only-three",
            "pbkdf2-sha256$abc$c2FsdA==$ZGtkaw==",
            "pbkdf2-sha1$100$c2FsdA==$ZGtkaw==",
            "pbkdf2-sha256$100$!!!$ZGtkaw==",
            "pbkdf2-sha256$100$c2FsdA==$ZGtkaw==$extra",
        ] {
            assert!(!verify("anything", bad), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_username_rules() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("a_b-c42").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"x".repeat(51)).is_err());
        assert!(validate_username("bad name").is_err());
        assert!(validate_username("bad!name").is_err());
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password("Str0ng!pass").is_ok());
        // Missing one class each
        assert!(validate_password("str0ng!pass").is_err()); // no upper
        assert!(validate_password("STR0NG!PASS").is_err()); // no lower
        assert!(validate_password("Strong!pass").is_err()); // no digit
        assert!(validate_password("Str0ngpass").is_err()); // no symbol
        assert!(validate_password("S0r!t").is_err()); // too short
    }

    #[test]
    fn test_email_rules() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@nodot").is_err());
        assert!(validate_email("user name@example.com").is_err());
    }
}
