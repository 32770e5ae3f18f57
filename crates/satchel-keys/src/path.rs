//! BIP-32 derivation path parsing
//!
//! Accepts `m` optionally followed by `/<num>` segments, where a
//! trailing `'` or `h` sets the hardened bit (index + 2³¹).

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Hardened-index offset (2³¹).
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Invalid derivation path: {0}")]
pub struct PathError(pub String);

/// A parsed derivation path; each element carries the hardened bit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DerivationPath(Vec<u32>);

impl DerivationPath {
    /// The standard BIP-44 path `m/44'/coin'/account'/change/index`.
    pub fn bip44(coin_type: u32, account: u32, change: u32, index: u32) -> Self {
        Self(vec![
            44 | HARDENED_OFFSET,
            coin_type | HARDENED_OFFSET,
            account | HARDENED_OFFSET,
            change,
            index,
        ])
    }

    /// The hardened BIP-44 account prefix `m/44'/coin'/account'`.
    pub fn bip44_account(coin_type: u32, account: u32) -> Self {
        Self(vec![
            44 | HARDENED_OFFSET,
            coin_type | HARDENED_OFFSET,
            account | HARDENED_OFFSET,
        ])
    }

    pub fn indices(&self) -> &[u32] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for DerivationPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        match parts.next() {
            Some("m") | Some("M") => {}
            _ => return Err(PathError(format!("must start with 'm': {s}"))),
        }

        let mut indices = Vec::new();
        for part in parts {
            if part.is_empty() {
                return Err(PathError(format!("empty segment in {s}")));
            }
            let (digits, hardened) = match part.strip_suffix(['\'', 'h', 'H']) {
                Some(d) => (d, true),
                None => (part, false),
            };
            let index: u32 = digits
                .parse()
                .map_err(|_| PathError(format!("bad segment '{part}' in {s}")))?;
            if index >= HARDENED_OFFSET {
                return Err(PathError(format!("segment out of range '{part}' in {s}")));
            }
            indices.push(if hardened { index | HARDENED_OFFSET } else { index });
        }
        Ok(Self(indices))
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for &i in &self.0 {
            if i >= HARDENED_OFFSET {
                write!(f, "/{}'", i - HARDENED_OFFSET)?;
            } else {
                write!(f, "/{i}")?;
            }
        }
        Ok(())
    }
}
