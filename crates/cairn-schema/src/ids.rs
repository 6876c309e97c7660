//! Identifier types: opaque multihashes and provider identities.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::VerifyingKey;
use multihash_codetable::{Code, MultihashDigest};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SchemaError;

/// An opaque, variable-length multihash identifying a piece of content.
///
/// The chain never inspects the digest; it only carries it. Serialized as a
/// byte string in both DAG-JSON and DAG-CBOR.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Multihash(#[serde(with = "serde_bytes")] Vec<u8>);

impl Multihash {
    /// Wrap raw multihash bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Compute the sha2-256 multihash of arbitrary data.
    pub fn sha2_256(data: &[u8]) -> Self {
        Self(Code::Sha2_256.digest(data).to_bytes())
    }

    /// Return the raw multihash bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume the wrapper and return the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for Multihash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multihash({self})")
    }
}

/// Identity of the publishing provider: its ed25519 public key bytes.
///
/// Rendered as lowercase hex in string form, which is also how it appears
/// in the `Provider` field of serialized advertisements.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderId([u8; 32]);

impl ProviderId {
    /// Return the raw 32-byte representation.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Reconstruct the verifying key this identity was derived from.
    pub fn verifying_key(&self) -> Result<VerifyingKey, SchemaError> {
        VerifyingKey::from_bytes(&self.0).map_err(|e| SchemaError::InvalidKey(e.to_string()))
    }
}

impl From<&VerifyingKey> for ProviderId {
    fn from(key: &VerifyingKey) -> Self {
        Self(key.to_bytes())
    }
}

impl From<[u8; 32]> for ProviderId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProviderId({self})")
    }
}

impl FromStr for ProviderId {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| SchemaError::InvalidKey(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SchemaError::InvalidKey("expected 32 bytes".to_string()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for ProviderId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ProviderId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}
