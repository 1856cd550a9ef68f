//! Identifier codec shared by every reader adapter.
//!
//! Tag identifiers travel as raw bytes. Downstream consumers want them as
//! hexadecimal and binary strings, and vendor SDKs hand them over in a
//! variety of printed forms (`3034257B`, `30-34-25-7B`, `3034 257B`).
//! Everything here is pure and stateless.
//!
//! ```
//! use tagwire_core::ident;
//!
//! let id = [0x1A, 0x2B];
//! assert_eq!(ident::to_hex(&id), "1a2b");
//! assert_eq!(ident::to_binary(&id), "0001101000101011");
//! assert_eq!(ident::from_hex("1a2b").unwrap(), id);
//! ```

use crate::{Error, Result};
use std::fmt::Write;

/// Convert bytes to a lowercase hex string, two digits per byte, most
/// significant nibble first.
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Convert bytes to a binary string, eight digits per byte, most
/// significant bit first.
pub fn to_binary(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 8);
    for byte in bytes {
        // Writing into a String cannot fail.
        let _ = write!(out, "{byte:08b}");
    }
    out
}

/// Strict inverse of [`to_hex`]. Accepts upper or lower case digits.
///
/// # Errors
///
/// Returns [`Error::InvalidHex`] for odd length or non-hex characters.
pub fn from_hex(text: &str) -> Result<Vec<u8>> {
    hex::decode(text).map_err(|e| Error::InvalidHex(format!("{text:?}: {e}")))
}

/// Parse a vendor-printed identifier, ignoring `-`, `:` and whitespace
/// separators between digits.
///
/// # Errors
///
/// Returns [`Error::InvalidHex`] when the remaining digits are not valid hex.
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: String = text
        .chars()
        .filter(|c| !(c.is_whitespace() || *c == '-' || *c == ':'))
        .collect();
    if digits.is_empty() {
        return Err(Error::InvalidHex(format!("{text:?}: no digits")));
    }
    from_hex(&digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_known_vector() {
        let id = [0x1A, 0x2B];
        assert_eq!(to_hex(&id), "1a2b");
        assert_eq!(to_binary(&id), "0001101000101011");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(to_hex(&[]), "");
        assert_eq!(to_binary(&[]), "");
        assert_eq!(from_hex("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_leading_zero_bytes_are_kept() {
        let id = [0x00, 0x00, 0x01];
        assert_eq!(to_hex(&id), "000001");
        assert_eq!(to_binary(&id).len(), 24);
        assert!(to_binary(&id).starts_with("0000000000000000"));
    }

    #[rstest]
    #[case("30-34-25-7B", vec![0x30, 0x34, 0x25, 0x7B])]
    #[case("3034 257B", vec![0x30, 0x34, 0x25, 0x7B])]
    #[case("e2:00:68:11", vec![0xE2, 0x00, 0x68, 0x11])]
    #[case("ABCDEF", vec![0xAB, 0xCD, 0xEF])]
    fn test_parse_vendor_formats(#[case] text: &str, #[case] expected: Vec<u8>) {
        assert_eq!(parse_hex(text).unwrap(), expected);
    }

    #[rstest]
    #[case("abc")]
    #[case("zz")]
    #[case("--")]
    fn test_parse_rejects_invalid(#[case] text: &str) {
        assert!(matches!(parse_hex(text), Err(Error::InvalidHex(_))));
    }
}
