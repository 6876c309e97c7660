//! Block codecs and CID derivation.

use ipld_core::cid::Cid;
use multihash_codetable::{Code, MultihashDigest};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

const DAG_CBOR: u64 = 0x71;
const DAG_JSON: u64 = 0x0129;

/// Codec under which chain blocks are serialized and addressed.
///
/// Both codecs address blocks as CIDv1 with a sha2-256 multihash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkCodec {
    /// DAG-JSON (`0x0129`), the human-readable default.
    #[default]
    DagJson,
    /// DAG-CBOR (`0x71`).
    DagCbor,
}

impl LinkCodec {
    /// The multicodec code for this codec.
    pub const fn code(self) -> u64 {
        match self {
            Self::DagJson => DAG_JSON,
            Self::DagCbor => DAG_CBOR,
        }
    }

    /// Map a multicodec code back to a codec, if it is one of ours.
    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            DAG_JSON => Some(Self::DagJson),
            DAG_CBOR => Some(Self::DagCbor),
            _ => None,
        }
    }

    /// The HTTP content type for blocks under this codec.
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::DagJson => "application/json",
            Self::DagCbor => "application/cbor",
        }
    }

    /// Serialize an IPLD record under this codec.
    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>, SchemaError> {
        match self {
            Self::DagJson => {
                serde_ipld_dagjson::to_vec(value).map_err(|e| SchemaError::Encode(e.to_string()))
            }
            Self::DagCbor => {
                serde_ipld_dagcbor::to_vec(value).map_err(|e| SchemaError::Encode(e.to_string()))
            }
        }
    }

    /// Parse a block back into an IPLD record.
    pub fn decode<T: DeserializeOwned>(self, block: &[u8]) -> Result<T, SchemaError> {
        match self {
            Self::DagJson => {
                serde_ipld_dagjson::from_slice(block).map_err(|e| SchemaError::Decode(e.to_string()))
            }
            Self::DagCbor => {
                serde_ipld_dagcbor::from_slice(block).map_err(|e| SchemaError::Decode(e.to_string()))
            }
        }
    }

    /// Derive the content address of a block under this codec.
    pub fn link_for(self, block: &[u8]) -> Cid {
        Cid::new_v1(self.code(), Code::Sha2_256.digest(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_codes_roundtrip() {
        for codec in [LinkCodec::DagJson, LinkCodec::DagCbor] {
            assert_eq!(LinkCodec::from_code(codec.code()), Some(codec));
        }
        assert_eq!(LinkCodec::from_code(0x55), None);
    }

    #[test]
    fn test_content_types() {
        assert_eq!(LinkCodec::DagJson.content_type(), "application/json");
        assert_eq!(LinkCodec::DagCbor.content_type(), "application/cbor");
    }

    #[test]
    fn test_link_is_deterministic_and_codec_tagged() {
        let block = b"{\"a\":1}";
        let json_link = LinkCodec::DagJson.link_for(block);
        let cbor_link = LinkCodec::DagCbor.link_for(block);
        assert_eq!(json_link, LinkCodec::DagJson.link_for(block));
        assert_ne!(json_link, cbor_link);
        assert_eq!(json_link.codec(), LinkCodec::DagJson.code());
        // CIDv1 strings are base32 lowercase.
        assert!(json_link.to_string().starts_with('b'));
    }
}
