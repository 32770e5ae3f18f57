//! Hex string helpers
//!
//! Wrappers over the `hex` crate that tolerate a `0x` prefix and odd
//! nibble counts on input (a leading zero nibble is assumed).

use super::EncodingError;

/// Decode hex, accepting an optional `0x`/`0X` prefix and odd length.
pub fn decode(s: &str) -> Result<Vec<u8>, EncodingError> {
    let stripped = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    let padded;
    let body = if stripped.len() % 2 == 1 {
        padded = format!("0{stripped}");
        padded.as_str()
    } else {
        stripped
    };
    hex::decode(body).map_err(|e| EncodingError::InvalidHex(e.to_string()))
}

/// Lowercase hex with a `0x` prefix.
pub fn encode_prefixed(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_and_prefixed() {
        assert_eq!(decode("deadbeef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(decode("0xdeadbeef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(decode("0XDEADBEEF").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_odd_length_pads_left() {
        assert_eq!(decode("0xf").unwrap(), vec![0x0f]);
        assert_eq!(decode("fff").unwrap(), vec![0x0f, 0xff]);
    }

    #[test]
    fn test_invalid_rejected() {
        assert!(decode("0xzz").is_err());
        assert!(decode("not hex").is_err());
    }

    #[test]
    fn test_encode_prefixed() {
        assert_eq!(encode_prefixed(&[0xab, 0x01]), "0xab01");
        assert_eq!(encode_prefixed(&[]), "0x");
    }
}
