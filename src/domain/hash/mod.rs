use std::fmt;
use std::str::FromStr;

use super::error::DecodeError;

pub mod sha256;

/// Digest scheme used to hash leaf pre-images and combine sibling nodes.
pub trait HashMethod {
    /// Hash a leaf's data. (Here: a raw transaction.)
    fn hash_leaf(data: &[u8]) -> Hash256;

    /// Hash two child nodes together, `left` first.
    fn hash_nodes(left: &Hash256, right: &Hash256) -> Hash256;
}

/// A 32-byte digest kept in wire order.
///
/// The text form is the byte-reversed hex string, the way transaction ids and
/// block hashes are displayed. Binary encodings carry the bytes unreversed.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    pub const LEN: usize = 32;

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Copy a wire-order slice, or `None` if it is not 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 32]>::try_from(bytes).ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    /// Display-order hex.
    pub fn to_hex(&self) -> String {
        let mut reversed = self.0;
        reversed.reverse();
        hex::encode(reversed)
    }

    /// Parse display-order hex.
    pub fn from_hex(s: &str) -> Result<Self, DecodeError> {
        Self::parse_field(s, "hash")
    }

    /// Parse display-order hex, naming `field` in any error.
    pub(crate) fn parse_field(s: &str, field: &'static str) -> Result<Self, DecodeError> {
        let mut bytes = [0u8; 32];
        if s.len() != Self::LEN * 2 {
            return Err(DecodeError::InvalidLength {
                field,
                expected: Self::LEN,
                actual: s.len() / 2,
            });
        }
        hex::decode_to_slice(s, &mut bytes).map_err(|e| DecodeError::invalid_hex(field, e))?;
        bytes.reverse();
        Ok(Self(bytes))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl FromStr for Hash256 {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::Hash256;
    use crate::domain::error::DecodeError;

    #[test]
    fn test_text_form_is_byte_reversed() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xef;
        bytes[31] = 0xff;
        let hash = Hash256::from_bytes(bytes);
        let text = hash.to_hex();
        assert!(text.starts_with("ff"), "Display form must start with the last wire byte");
        assert!(text.ends_with("ef"), "Display form must end with the first wire byte");
        assert_eq!(text.parse::<Hash256>().unwrap(), hash, "Parsing must invert display");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            Hash256::from_hex("abcd"),
            Err(DecodeError::InvalidLength { expected: 32, .. })
        ));
        let not_hex = "zz".repeat(32);
        assert!(matches!(
            Hash256::from_hex(&not_hex),
            Err(DecodeError::InvalidHex { .. })
        ));
    }

    #[test]
    fn test_from_slice_length() {
        assert!(Hash256::from_slice(&[0u8; 31]).is_none());
        assert_eq!(Hash256::from_slice(&[7u8; 32]), Some(Hash256::from_bytes([7u8; 32])));
    }
}
