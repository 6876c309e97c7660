//! Advertisement and entry-chunk records.

use std::sync::OnceLock;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier};
use ipld_core::cid::Cid;
use multihash_codetable::{Code, MultihashDigest};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::SchemaError;
use crate::ids::{Multihash, ProviderId};

const RAW_CODEC: u64 = 0x55;

/// Well-known sentinel link used in place of an entries chain by
/// retractions that identify their content by ContextID alone.
pub fn no_entries() -> Cid {
    static NO_ENTRIES: OnceLock<Cid> = OnceLock::new();
    *NO_ENTRIES.get_or_init(|| Cid::new_v1(RAW_CODEC, Code::Sha2_256.digest(b"no entries")))
}

/// One block in the linked list carrying a catalog's multihashes.
///
/// Chunks are threaded newest to oldest: the chunk written last links to
/// the chunk written before it, and the advertisement's entries link points
/// at the last-written chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryChunk {
    /// Multihashes carried by this chunk, in catalog order.
    #[serde(rename = "Entries")]
    pub entries: Vec<Multihash>,
    /// Link to the previously written chunk, absent for the first chunk.
    #[serde(rename = "Next", default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Cid>,
}

/// One signed record on the chain, announcing or retracting a set of
/// multihashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advertisement {
    /// The head this advertisement was appended onto, absent for the first.
    #[serde(rename = "PreviousID", default, skip_serializing_if = "Option::is_none")]
    pub previous_id: Option<Cid>,
    /// Identity of the publishing provider.
    #[serde(rename = "Provider")]
    pub provider: ProviderId,
    /// Multiaddrs from which the announced content is retrievable.
    #[serde(rename = "Addresses")]
    pub addresses: Vec<String>,
    /// Head of the entry-chunk chain, or the [`no_entries`] sentinel.
    #[serde(rename = "Entries")]
    pub entries: Cid,
    /// Opaque identifier grouping related advertisements for retraction.
    /// Empty when the catalog had no natural identifier.
    #[serde(rename = "ContextID", with = "serde_bytes")]
    pub context_id: Vec<u8>,
    /// Opaque per-deployment payload.
    #[serde(rename = "Metadata", with = "serde_bytes")]
    pub metadata: Vec<u8>,
    /// Whether this advertisement retracts rather than announces.
    #[serde(rename = "IsRm")]
    pub is_rm: bool,
    /// ed25519 signature over the advertisement digest, by `provider`.
    #[serde(rename = "Signature", with = "serde_bytes", default)]
    pub signature: Vec<u8>,
}

/// Signable content of an [`Advertisement`] (everything but the signature).
#[derive(Serialize)]
struct SignableAdvertisement<'a> {
    previous_id: &'a Option<Cid>,
    provider: &'a ProviderId,
    addresses: &'a [String],
    entries: &'a Cid,
    #[serde(with = "serde_bytes")]
    context_id: &'a [u8],
    #[serde(with = "serde_bytes")]
    metadata: &'a [u8],
    is_rm: bool,
}

impl Advertisement {
    /// Compute the sha2-256 digest of the advertisement's signable content.
    ///
    /// The content is canonically encoded as DAG-CBOR regardless of the
    /// codec the advertisement block itself is stored under.
    pub fn signing_digest(&self) -> Result<[u8; 32], SchemaError> {
        let signable = SignableAdvertisement {
            previous_id: &self.previous_id,
            provider: &self.provider,
            addresses: &self.addresses,
            entries: &self.entries,
            context_id: &self.context_id,
            metadata: &self.metadata,
            is_rm: self.is_rm,
        };
        let bytes =
            serde_ipld_dagcbor::to_vec(&signable).map_err(|e| SchemaError::Encode(e.to_string()))?;
        Ok(Sha256::digest(&bytes).into())
    }

    /// Sign the advertisement with the provider's private key.
    ///
    /// The key must correspond to the `provider` identity or later
    /// verification will fail.
    pub fn sign(&mut self, key: &SigningKey) -> Result<(), SchemaError> {
        let digest = self.signing_digest()?;
        self.signature = key.sign(&digest).to_bytes().to_vec();
        Ok(())
    }

    /// Verify the signature against the `provider` identity.
    ///
    /// Returns `false` if the identity bytes are not a valid key, the
    /// signature is malformed, or it does not match the content.
    pub fn verify_signature(&self) -> bool {
        let Ok(verifying_key) = self.provider.verifying_key() else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(&self.signature) else {
            return false;
        };
        let Ok(digest) = self.signing_digest() else {
            return false;
        };
        verifying_key.verify(&digest, &signature).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    use crate::codec::LinkCodec;

    fn test_ad(key: &SigningKey) -> Advertisement {
        Advertisement {
            previous_id: None,
            provider: ProviderId::from(&key.verifying_key()),
            addresses: vec!["/dns4/provider.example/tcp/443/https".to_string()],
            entries: no_entries(),
            context_id: b"ctx-1".to_vec(),
            metadata: vec![0xca, 0xfe],
            is_rm: false,
            signature: Vec::new(),
        }
    }

    #[test]
    fn test_no_entries_is_stable() {
        assert_eq!(no_entries(), no_entries());
        assert_eq!(no_entries().codec(), RAW_CODEC);
    }

    #[test]
    fn test_sign_verify() {
        let key = SigningKey::generate(&mut OsRng);
        let mut ad = test_ad(&key);
        assert!(!ad.verify_signature());

        ad.sign(&key).unwrap();
        assert!(ad.verify_signature());
    }

    #[test]
    fn test_tampering_breaks_signature() {
        let key = SigningKey::generate(&mut OsRng);
        let mut ad = test_ad(&key);
        ad.sign(&key).unwrap();

        ad.is_rm = true;
        assert!(!ad.verify_signature());
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let key = SigningKey::generate(&mut OsRng);
        let other = SigningKey::generate(&mut OsRng);
        let mut ad = test_ad(&key);
        ad.sign(&other).unwrap();
        assert!(!ad.verify_signature());
    }

    #[test]
    fn test_advertisement_codec_roundtrip() {
        let key = SigningKey::generate(&mut OsRng);
        let mut ad = test_ad(&key);
        ad.previous_id = Some(LinkCodec::DagJson.link_for(b"prev"));
        ad.sign(&key).unwrap();

        for codec in [LinkCodec::DagJson, LinkCodec::DagCbor] {
            let block = codec.encode(&ad).unwrap();
            let decoded: Advertisement = codec.decode(&block).unwrap();
            assert_eq!(decoded, ad);
            assert!(decoded.verify_signature());
        }
    }

    #[test]
    fn test_entry_chunk_roundtrip() {
        let chunk = EntryChunk {
            entries: vec![Multihash::sha2_256(b"a"), Multihash::sha2_256(b"b")],
            next: Some(LinkCodec::DagCbor.link_for(b"older chunk")),
        };
        for codec in [LinkCodec::DagJson, LinkCodec::DagCbor] {
            let block = codec.encode(&chunk).unwrap();
            let decoded: EntryChunk = codec.decode(&block).unwrap();
            assert_eq!(decoded, chunk);
        }
    }

    #[test]
    fn test_entry_chunk_without_next() {
        let chunk = EntryChunk {
            entries: vec![Multihash::sha2_256(b"only")],
            next: None,
        };
        let block = LinkCodec::DagJson.encode(&chunk).unwrap();
        // The Next field is omitted entirely rather than serialized as null.
        assert!(!String::from_utf8(block.clone()).unwrap().contains("Next"));
        let decoded: EntryChunk = LinkCodec::DagJson.decode(&block).unwrap();
        assert_eq!(decoded.next, None);
    }
}
