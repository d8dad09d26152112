//! Host environment values exposed to generated code.
//!
//! A [`HostEnvironment`] carries the account, block and call data a code unit
//! runs against. Values are plain data; the engine copies them into the
//! runtime data block before invoking the entry point.
//!
//! Addresses and words serialize as `0x`-prefixed hex strings, so an
//! environment can be written directly in a TOML config file:
//!
//! ```toml
//! [environment]
//! address = "0x0f"
//! caller = "0xfacefacefaceface"
//! call_value = "0xabcd"
//! call_data = "0x48656c6c6f"
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error parsing a hex-encoded address or word.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseHexError {
    /// The string is not valid hexadecimal.
    #[error("invalid hex: {0}")]
    Invalid(String),

    /// The value does not fit the target width.
    #[error("value is {actual} bytes, at most {max} allowed")]
    TooLong {
        /// Decoded length.
        actual: usize,
        /// Width of the target type.
        max: usize,
    },
}

/// Decode a hex string into a right-aligned big-endian array.
fn decode_right_aligned<const N: usize>(s: &str) -> Result<[u8; N], ParseHexError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let padded;
    let digits = if digits.len() % 2 == 1 {
        padded = format!("0{digits}");
        padded.as_str()
    } else {
        digits
    };

    let bytes = hex::decode(digits).map_err(|e| ParseHexError::Invalid(e.to_string()))?;
    if bytes.len() > N {
        return Err(ParseHexError::TooLong {
            actual: bytes.len(),
            max: N,
        });
    }

    let mut out = [0u8; N];
    out[N - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}

/// A 160-bit account address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

impl Address {
    /// Width in bytes.
    pub const LEN: usize = 20;

    /// Create an address from raw big-endian bytes.
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Create an address whose low 64 bits are `value`.
    pub fn from_low_u64(value: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// Raw big-endian bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// The address as a 256-bit word.
    pub fn to_word(&self) -> Word {
        let mut bytes = [0u8; 32];
        bytes[12..].copy_from_slice(&self.0);
        Word(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = ParseHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_right_aligned(s).map(Self)
    }
}

impl TryFrom<String> for Address {
    type Error = ParseHexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_string()
    }
}

/// A 256-bit big-endian value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Word([u8; 32]);

impl Word {
    /// Width in bytes.
    pub const LEN: usize = 32;

    /// Create a word from raw big-endian bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw big-endian bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<u64> for Word {
    fn from(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Word {
    type Err = ParseHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_right_aligned(s).map(Self)
    }
}

impl TryFrom<String> for Word {
    type Error = ParseHexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Word> for String {
    fn from(value: Word) -> Self {
        value.to_string()
    }
}

/// Account, block and call data for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostEnvironment {
    /// Address of the executing account.
    #[serde(default)]
    pub address: Address,

    /// Direct caller of the executing account.
    #[serde(default)]
    pub caller: Address,

    /// Originator of the transaction.
    #[serde(default)]
    pub origin: Address,

    /// Value transferred with the call.
    #[serde(default)]
    pub call_value: Word,

    /// Gas price of the transaction.
    #[serde(default)]
    pub gas_price: Word,

    /// Hash of the previous block.
    #[serde(default)]
    pub prev_hash: Word,

    /// Beneficiary of the current block.
    #[serde(default)]
    pub coinbase: Address,

    /// Timestamp of the current block.
    #[serde(default)]
    pub timestamp: Word,

    /// Number of the current block.
    #[serde(default)]
    pub number: Word,

    /// Difficulty of the current block.
    #[serde(default)]
    pub difficulty: Word,

    /// Gas limit of the current block.
    #[serde(default)]
    pub gas_limit: Word,

    /// Input data of the call.
    #[serde(default, with = "hex_bytes")]
    pub call_data: Vec<u8>,

    /// Code of the executing account.
    #[serde(default, with = "hex_bytes")]
    pub code: Vec<u8>,
}

impl HostEnvironment {
    /// Fixed environment for standalone runs and tests.
    ///
    /// Every field has a distinct, recognizable value so generated code
    /// reading the wrong slot is easy to spot.
    pub fn fixture() -> Self {
        Self {
            address: Address::from_low_u64(1_122_334_455_667_788),
            caller: Address::from_low_u64(0xface_face_face_face),
            origin: Address::from_low_u64(101_010_101_010_101_010),
            call_value: Word::from(0xabcd),
            gas_price: Word::from(1002),
            prev_hash: Word::from(1003),
            coinbase: Address::from_low_u64(1004),
            timestamp: Word::from(1005),
            number: Word::from(1006),
            difficulty: Word::from(1007),
            gas_limit: Word::from(1008),
            call_data: b"Hello the Beautiful World of Ethereum!".to_vec(),
            code: vec![0x0d, 0x0e, 0x0a, 0x0d, 0x0b, 0x0e, 0x0e, 0x0f],
        }
    }
}

/// Serde adapter for `0x`-prefixed hex byte strings.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(digits).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_from_low_u64() {
        let addr = Address::from_low_u64(0x1004);
        assert_eq!(addr.as_bytes()[18..], [0x10, 0x04]);
        assert!(addr.as_bytes()[..18].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_address_to_word_is_right_aligned() {
        let word = Address::from_low_u64(0xff).to_word();
        assert_eq!(word, Word::from(0xff));
    }

    #[test]
    fn test_parse_short_and_odd_hex() {
        assert_eq!("0xabc".parse::<Word>().unwrap(), Word::from(0xabc));
        assert_eq!("ff".parse::<Address>().unwrap(), Address::from_low_u64(0xff));
    }

    #[test]
    fn test_parse_rejects_oversized_address() {
        let too_long = format!("0x{}", "11".repeat(21));
        assert_eq!(
            too_long.parse::<Address>(),
            Err(ParseHexError::TooLong {
                actual: 21,
                max: 20
            })
        );
    }

    #[test]
    fn test_parse_rejects_non_hex() {
        assert!(matches!(
            "0xzz".parse::<Word>(),
            Err(ParseHexError::Invalid(_))
        ));
    }

    #[test]
    fn test_fixture_values() {
        let env = HostEnvironment::fixture();

        assert_eq!(env.call_value, Word::from(0xabcd));
        assert_eq!(env.gas_limit, Word::from(1008));
        assert_eq!(env.call_data, b"Hello the Beautiful World of Ethereum!");
        assert_eq!(env.code.len(), 8);
    }

    #[test]
    fn test_environment_json_roundtrip_uses_hex() {
        let env = HostEnvironment::fixture();
        let json = serde_json::to_value(&env).unwrap();

        assert_eq!(json["coinbase"], format!("0x{}{}", "00".repeat(18), "03ec"));
        assert_eq!(json["code"], "0x0d0e0a0d0b0e0e0f");

        let back: HostEnvironment = serde_json::from_value(json).unwrap();
        assert_eq!(back, env);
    }
}
