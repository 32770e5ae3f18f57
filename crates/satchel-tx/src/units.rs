//! Wei / ether / gwei conversions
//!
//! Explorer balances arrive as decimal wei strings that overflow u64
//! and lose precision in floating point. These helpers shift the
//! decimal point textually, so `"1500000000000000000"` ↔ `"1.5"` is
//! exact in both directions.

use thiserror::Error;

const WEI_DECIMALS: usize = 18;
const GWEI_IN_WEI: u128 = 1_000_000_000;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UnitsError {
    #[error("Not a decimal number: {0}")]
    NotDecimal(String),
    #[error("More than 18 fractional digits: {0}")]
    TooPrecise(String),
}

/// Format a decimal wei string as an ether string (`"1.5"`, `"0.02"`).
pub fn wei_to_eth(wei: &str) -> Result<String, UnitsError> {
    if wei.is_empty() || !wei.bytes().all(|b| b.is_ascii_digit()) {
        return Err(UnitsError::NotDecimal(wei.to_string()));
    }
    let trimmed = wei.trim_start_matches('0');
    if trimmed.is_empty() {
        return Ok("0".to_string());
    }

    let (int_part, frac_part) = if trimmed.len() > WEI_DECIMALS {
        let split = trimmed.len() - WEI_DECIMALS;
        (&trimmed[..split], &trimmed[split..])
    } else {
        ("", &trimmed[..])
    };

    let int_str = if int_part.is_empty() { "0" } else { int_part };
    let mut frac = format!("{:0>width$}", frac_part, width = WEI_DECIMALS);
    while frac.ends_with('0') {
        frac.pop();
    }

    Ok(if frac.is_empty() {
        int_str.to_string()
    } else {
        format!("{int_str}.{frac}")
    })
}

/// Parse an ether string (`"1.5"`, `".25"`, `"2"`) into a decimal wei
/// string. Rejects more than 18 fractional digits rather than rounding.
pub fn eth_to_wei(eth: &str) -> Result<String, UnitsError> {
    let (int_part, frac_part) = match eth.split_once('.') {
        Some((i, f)) => (i, f),
        None => (eth, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(UnitsError::NotDecimal(eth.to_string()));
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(UnitsError::NotDecimal(eth.to_string()));
    }
    if frac_part.len() > WEI_DECIMALS {
        return Err(UnitsError::TooPrecise(eth.to_string()));
    }

    let mut wei = String::with_capacity(int_part.len() + WEI_DECIMALS);
    wei.push_str(int_part);
    wei.push_str(frac_part);
    wei.push_str(&"0".repeat(WEI_DECIMALS - frac_part.len()));

    let trimmed = wei.trim_start_matches('0');
    Ok(if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    })
}

/// Gwei (gas-oracle unit) to wei.
pub fn gwei_to_wei(gwei: u64) -> u128 {
    u128::from(gwei) * GWEI_IN_WEI
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wei_to_eth() {
        assert_eq!(wei_to_eth("1000000000000000000").unwrap(), "1");
        assert_eq!(wei_to_eth("1500000000000000000").unwrap(), "1.5");
        assert_eq!(wei_to_eth("20000000000000000").unwrap(), "0.02");
        assert_eq!(wei_to_eth("1").unwrap(), "0.000000000000000001");
        assert_eq!(wei_to_eth("0").unwrap(), "0");
        assert_eq!(wei_to_eth("000").unwrap(), "0");
        assert_eq!(
            wei_to_eth("123456789012345678901").unwrap(),
            "123.456789012345678901"
        );
    }

    #[test]
    fn test_eth_to_wei() {
        assert_eq!(eth_to_wei("1").unwrap(), "1000000000000000000");
        assert_eq!(eth_to_wei("1.5").unwrap(), "1500000000000000000");
        assert_eq!(eth_to_wei("0.02").unwrap(), "20000000000000000");
        assert_eq!(eth_to_wei(".25").unwrap(), "250000000000000000");
        assert_eq!(eth_to_wei("0").unwrap(), "0");
        assert_eq!(eth_to_wei("0.000000000000000001").unwrap(), "1");
    }

    #[test]
    fn test_roundtrip() {
        for wei in ["1", "999", "1000000000000000000", "123456789012345678901"] {
            let eth = wei_to_eth(wei).unwrap();
            assert_eq!(eth_to_wei(&eth).unwrap(), wei);
        }
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(wei_to_eth("").is_err());
        assert!(wei_to_eth("12a4").is_err());
        assert!(wei_to_eth("-5").is_err());
        assert!(eth_to_wei(".").is_err());
        assert!(eth_to_wei("1.2.3").is_err());
        assert!(eth_to_wei("1.0000000000000000001").is_err());
    }

    #[test]
    fn test_gwei_to_wei() {
        assert_eq!(gwei_to_wei(1), 1_000_000_000);
        assert_eq!(gwei_to_wei(20), 20_000_000_000);
        assert_eq!(gwei_to_wei(0), 0);
    }
}
