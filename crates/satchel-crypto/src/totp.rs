//! TOTP (RFC 6238)
//!
//! HMAC-SHA-1, 30-second time step, 6 digits. Verification accepts the
//! previous and next window to tolerate clock drift. Secrets travel as
//! raw bytes; Base32 provisioning strings are produced by
//! [`provisioning_uri`].

use crate::encoding::base32;
use crate::hash::hmac_sha1;

/// Time step in seconds.
pub const PERIOD: u64 = 30;

/// Number of output digits.
pub const DIGITS: u32 = 6;

/// Accepted drift, in windows, on either side of "now".
pub const DRIFT_WINDOWS: i64 = 1;

/// Compute the TOTP code for a unix timestamp.
pub fn code_at(secret: &[u8], unix_time: u64) -> u32 {
    hotp(secret, unix_time / PERIOD)
}

/// Verify a code at `unix_time`, accepting ±[`DRIFT_WINDOWS`] windows.
pub fn verify_at(secret: &[u8], code: u32, unix_time: u64) -> bool {
    let counter = (unix_time / PERIOD) as i64;
    for drift in -DRIFT_WINDOWS..=DRIFT_WINDOWS {
        let c = counter + drift;
        if c >= 0 && hotp(secret, c as u64) == code {
            return true;
        }
    }
    false
}

/// HOTP (RFC 4226) with dynamic truncation to [`DIGITS`] digits.
fn hotp(secret: &[u8], counter: u64) -> u32 {
    let mac = hmac_sha1(secret, &counter.to_be_bytes());
    let offset = (mac[19] & 0x0f) as usize;
    let bin = u32::from_be_bytes([mac[offset], mac[offset + 1], mac[offset + 2], mac[offset + 3]])
        & 0x7fff_ffff;
    bin % 10u32.pow(DIGITS)
}

/// `otpauth://` provisioning URI with the Base32-encoded secret, for QR
/// display by the caller.
pub fn provisioning_uri(secret: &[u8], issuer: &str, account: &str) -> String {
    format!(
        "otpauth://totp/{issuer}:{account}?secret={}&issuer={issuer}&algorithm=SHA1&digits={DIGITS}&period={PERIOD}",
        base32::encode(secret).trim_end_matches('=')
    )
}
