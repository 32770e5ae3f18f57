//! OS CSPRNG access
//!
//! One primitive, `random_bytes`, backed by the operating system RNG.
//! There is deliberately no seedable path; a failing OS RNG is a fatal
//! condition surfaced as an error for the caller to abort on.

use rand::rngs::OsRng;
use rand::{Rng, RngCore};

use crate::CryptoError;

/// Fill `buf` with bytes from the OS CSPRNG.
pub fn random_bytes(buf: &mut [u8]) -> Result<(), CryptoError> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CryptoError::Rng(e.to_string()))
}

/// Fixed-size convenience wrapper around [`random_bytes`].
pub fn random_array<const N: usize>() -> Result<[u8; N], CryptoError> {
    let mut out = [0u8; N];
    random_bytes(&mut out)?;
    Ok(out)
}

/// A uniform random integer in `[low, high]` (inclusive), for short
/// numeric codes. Uses rejection sampling internally via `rand`.
pub fn random_in_range(low: u32, high: u32) -> u32 {
    OsRng.gen_range(low..=high)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fills_buffer() {
        let mut buf = [0u8; 64];
        random_bytes(&mut buf).unwrap();
        // 64 zero bytes from a working CSPRNG is a 2^-512 event
        assert!(buf.iter().any(|&b| b != 0));
    }

    #[test]
    fn test_distinct_draws() {
        let a: [u8; 32] = random_array().unwrap();
        let b: [u8; 32] = random_array().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_range_inclusive() {
        for _ in 0..1000 {
            let v = random_in_range(100_000, 999_999);
            assert!((100_000..=999_999).contains(&v));
        }
    }
}
