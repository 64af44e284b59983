//! Account addresses
//!
//! Addresses arrive as user-supplied strings. They are validated against the
//! network's format rules (prefix, length, hex digits, EIP-55 checksum for
//! mixed-case input) and then kept as raw bytes. The canonical text form is
//! lowercase `0x`-prefixed hex and is the only form used as a lookup key.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const ADDRESS_LENGTH: usize = 20;

const HEX_LENGTH: usize = ADDRESS_LENGTH * 2;

/// Reasons an address string is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("missing 0x prefix")]
    MissingPrefix,

    #[error("expected 40 hex digits, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex character")]
    InvalidCharacter,

    #[error("checksum mismatch")]
    BadChecksum,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Address(pub [u8; ADDRESS_LENGTH]);

impl Address {
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    /// Parse and validate a user-supplied address string.
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let raw = raw.trim();
        let digits = raw.strip_prefix("0x").ok_or(AddressError::MissingPrefix)?;

        if digits.len() != HEX_LENGTH {
            return Err(AddressError::InvalidLength(digits.len()));
        }
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(AddressError::InvalidCharacter);
        }

        let mut bytes = [0u8; ADDRESS_LENGTH];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| AddressError::InvalidCharacter)?;
        let address = Address(bytes);

        let has_lower = digits.bytes().any(|b| b.is_ascii_lowercase());
        let has_upper = digits.bytes().any(|b| b.is_ascii_uppercase());
        if has_lower && has_upper && address.checksum_digits() != digits {
            return Err(AddressError::BadChecksum);
        }

        Ok(address)
    }

    /// Lowercase `0x`-prefixed form, used as the eligibility key.
    pub fn canonical(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// EIP-55 mixed-case checksum encoding.
    pub fn to_checksum(&self) -> String {
        format!("0x{}", self.checksum_digits())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LENGTH]
    }

    fn checksum_digits(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak_hash::keccak(lower.as_bytes());

        lower
            .chars()
            .enumerate()
            .map(|(i, c)| {
                let byte = hash.0[i / 2];
                let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
                if c.is_ascii_alphabetic() && nibble >= 8 {
                    c.to_ascii_uppercase()
                } else {
                    c
                }
            })
            .collect()
    }
}

/// Network address-format predicate.
pub fn is_valid_address(raw: &str) -> bool {
    Address::parse(raw).is_ok()
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", hex::encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.canonical())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECKSUMMED: [&str; 4] = [
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
        "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
    ];

    #[test]
    fn test_eip55_vectors() {
        for s in CHECKSUMMED {
            let addr = Address::parse(s).unwrap();
            assert_eq!(addr.to_checksum(), s);
            assert_eq!(addr.canonical(), s.to_lowercase());
        }
    }

    #[test]
    fn test_single_case_skips_checksum() {
        let lower = CHECKSUMMED[0].to_lowercase();
        let upper = format!("0x{}", CHECKSUMMED[0][2..].to_uppercase());
        assert_eq!(Address::parse(&lower).unwrap(), Address::parse(&upper).unwrap());
    }

    #[test]
    fn test_bad_checksum_rejected() {
        // flip the case of one letter
        let tampered = CHECKSUMMED[0].replacen("aA", "Aa", 1);
        assert_eq!(Address::parse(&tampered), Err(AddressError::BadChecksum));
    }

    #[test]
    fn test_malformed_rejected() {
        assert_eq!(
            Address::parse("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"),
            Err(AddressError::MissingPrefix)
        );
        assert_eq!(
            Address::parse("0X5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"),
            Err(AddressError::MissingPrefix)
        );
        assert_eq!(Address::parse("0x1234"), Err(AddressError::InvalidLength(4)));
        assert_eq!(
            Address::parse("0xzzaeb6053f3e94c9b9a09f33669435e7ef1beaed"),
            Err(AddressError::InvalidCharacter)
        );
        assert!(!is_valid_address(""));
        assert!(!is_valid_address("0x"));
    }

    #[test]
    fn test_whitespace_trimmed() {
        let padded = format!("  {}\n", CHECKSUMMED[1]);
        assert!(is_valid_address(&padded));
    }

    #[test]
    fn test_serde_uses_canonical_form() {
        let addr = Address::parse(CHECKSUMMED[2]).unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", CHECKSUMMED[2].to_lowercase()));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
