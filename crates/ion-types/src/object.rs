use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Length in bytes of a content key.
pub const KEY_LEN: usize = 20;

/// Content-addressed key of a stored structure element.
///
/// An `ObjectKey` is the SHA1-derived hash of an element's serialized value
/// and its object type. Identical content of identical type always produces
/// the same key, which is what makes the store deduplicating.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey([u8; KEY_LEN]);

impl ObjectKey {
    /// Create an `ObjectKey` from a pre-computed digest.
    pub const fn from_hash(hash: [u8; KEY_LEN]) -> Self {
        Self(hash)
    }

    /// Parse a key from a wire byte string, which must be exactly 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
            expected: KEY_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// The raw 20-byte digest.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Owned copy of the digest, as carried on the wire.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectKey({})", self.short_hex())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; KEY_LEN]> for ObjectKey {
    fn from(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }
}

impl From<ObjectKey> for [u8; KEY_LEN] {
    fn from(key: ObjectKey) -> Self {
        key.0
    }
}
