use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use super::error::StorageError;

/// Length of a SHA-512 digest in bytes.
pub const HASH_LEN: usize = 64;

/// A validated SHA-512 checksum identifying a blob.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; HASH_LEN]);

impl ContentHash {
    /// Compute the SHA-512 checksum of the given data.
    pub fn compute(data: &[u8]) -> Self {
        Self::from_digest(Sha512::digest(data).as_slice())
    }

    /// Finish an incremental hash computation.
    pub fn finalize(hasher: Sha512) -> Self {
        Self::from_digest(hasher.finalize().as_slice())
    }

    /// Construct from raw digest bytes.
    pub fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    fn from_digest(digest: &[u8]) -> Self {
        let mut bytes = [0u8; HASH_LEN];
        bytes.copy_from_slice(digest);
        Self(bytes)
    }

    /// Parse a hex-encoded checksum string.
    pub fn from_hex(s: &str) -> Result<Self, StorageError> {
        if s.len() != HASH_LEN * 2 {
            return Err(StorageError::InvalidHash(format!(
                "expected {} hex characters, got {}",
                HASH_LEN * 2,
                s.len()
            )));
        }

        let bytes =
            hex::decode(s).map_err(|e| StorageError::InvalidHash(format!("invalid hex: {e}")))?;

        let arr: [u8; HASH_LEN] = bytes
            .try_into()
            .map_err(|_| StorageError::InvalidHash("decoded to wrong length".into()))?;

        Ok(Self(arr))
    }

    /// Return the checksum as a 128-character lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// First 2 hex characters, used as the shard directory.
    pub fn shard_prefix(&self) -> String {
        hex::encode(&self.0[..1])
    }

    /// Remaining 126 hex characters, used as the file name within a shard.
    pub fn shard_suffix(&self) -> String {
        hex::encode(&self.0[1..])
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
