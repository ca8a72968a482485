use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Length of an address in bytes.
pub const ADDRESS_LEN: usize = 20;

/// A 20-byte account address.
///
/// Text input is normalized before parsing: surrounding whitespace is
/// trimmed, an optional `0x`/`0X` prefix is stripped, and hex digits are
/// accepted in any case. The canonical text form is `0x` followed by 40
/// lowercase hex digits, so two spellings of the same address always
/// compare, hash, and serialize identically.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// Create an address from raw bytes.
    pub const fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// The zero address.
    pub const fn zero() -> Self {
        Self([0u8; ADDRESS_LEN])
    }

    /// Returns `true` if this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }

    /// Derive an address deterministically from arbitrary seed material.
    ///
    /// Used for ledger-owned accounts (the sale's custody address) and
    /// for stable test identities.
    pub fn derive(seed: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"tsl-address-v1:");
        hasher.update(seed);
        let hash = hasher.finalize();
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&hash.as_bytes()[..ADDRESS_LEN]);
        Self(bytes)
    }

    /// Create a random address for tests and demos.
    pub fn ephemeral() -> Self {
        let mut bytes = [0u8; ADDRESS_LEN];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Parse an address from its text form, normalizing case, prefix, and
    /// surrounding whitespace.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(digits).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != ADDRESS_LEN {
            return Err(TypeError::InvalidLength {
                expected: ADDRESS_LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; ADDRESS_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// The raw 20 bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Canonical text form: `0x` + 40 lowercase hex digits.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Short identifier (first 8 hex characters).
    pub fn short_id(&self) -> String {
        format!("0x{}", hex::encode(&self.0[..4]))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.short_id())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<[u8; ADDRESS_LEN]> for Address {
    fn from(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

    #[test]
    fn parse_normalizes_case_prefix_and_whitespace() {
        let checksummed = Address::parse(SECOND).unwrap();
        let lower = Address::parse(&SECOND.to_lowercase()).unwrap();
        let padded = Address::parse("  0X70997970C51812DC3A010C7D01B50E0D17DC79C8\n").unwrap();
        let bare = Address::parse("70997970c51812dc3a010c7d01b50e0d17dc79c8").unwrap();
        assert_eq!(checksummed, lower);
        assert_eq!(checksummed, padded);
        assert_eq!(checksummed, bare);
        assert_eq!(
            checksummed.to_hex(),
            "0x70997970c51812dc3a010c7d01b50e0d17dc79c8"
        );
    }

    #[test]
    fn parse_rejects_wrong_length() {
        let err = Address::parse("0x1234").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 20,
                actual: 2
            }
        );
    }

    #[test]
    fn parse_rejects_non_hex() {
        let err = Address::parse("0xzz997970C51812dc3A010C7d01b50e0d17dc79C8").unwrap_err();
        assert!(matches!(err, TypeError::InvalidHex(_)));
    }

    #[test]
    fn derive_is_deterministic() {
        assert_eq!(Address::derive(b"treasury"), Address::derive(b"treasury"));
        assert_ne!(Address::derive(b"treasury"), Address::derive(b"owner"));
    }

    #[test]
    fn ephemeral_addresses_are_unique() {
        assert_ne!(Address::ephemeral(), Address::ephemeral());
    }

    #[test]
    fn zero_address() {
        assert!(Address::zero().is_zero());
        assert!(!Address::derive(b"x").is_zero());
    }

    #[test]
    fn short_id_format() {
        let short = Address::parse(SECOND).unwrap().short_id();
        assert_eq!(short, "0x70997970");
    }

    #[test]
    fn serde_uses_canonical_text() {
        let addr = Address::parse(SECOND).unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0x70997970c51812dc3a010c7d01b50e0d17dc79c8\"");
        let parsed: Address = serde_json::from_str(&format!("\"{SECOND}\"")).unwrap();
        assert_eq!(parsed, addr);
    }
}
