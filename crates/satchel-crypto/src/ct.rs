//! Constant-time comparison for secrets
//!
//! Every comparison of password hashes, verification hashes, MACs, or
//! codes goes through here rather than `==`, so timing does not leak
//! how many leading bytes matched.

use subtle::ConstantTimeEq;

/// Constant-time equality. Unequal lengths return false (length is not
/// secret for the values compared here).
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
