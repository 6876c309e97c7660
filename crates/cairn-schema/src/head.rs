//! Signed head envelope served to consumers.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use ipld_core::cid::Cid;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::SchemaError;

/// Consumer-facing envelope for the current chain head.
///
/// Encoded as plain JSON. The signature covers a canonical DAG-CBOR
/// encoding of `(head, topic)`, so the envelope fields can be rendered as
/// strings without affecting what is signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedHead {
    /// The head CID in string form.
    pub head: String,
    /// The announcement topic this chain is published under.
    pub topic: String,
    /// Hex-encoded ed25519 public key of the signer.
    pub pubkey: String,
    /// Hex-encoded signature over the head digest.
    pub sig: String,
}

/// Canonical signing payload.
#[derive(Serialize)]
struct HeadPayload<'a> {
    head: &'a Cid,
    topic: &'a str,
}

fn head_digest(head: &Cid, topic: &str) -> Result<[u8; 32], SchemaError> {
    let payload = HeadPayload { head, topic };
    let bytes =
        serde_ipld_dagcbor::to_vec(&payload).map_err(|e| SchemaError::Encode(e.to_string()))?;
    Ok(Sha256::digest(&bytes).into())
}

impl SignedHead {
    /// Build and sign a head envelope with the provider's private key.
    pub fn new(head: Cid, topic: &str, key: &SigningKey) -> Result<Self, SchemaError> {
        let digest = head_digest(&head, topic)?;
        let signature = key.sign(&digest);
        Ok(Self {
            head: head.to_string(),
            topic: topic.to_string(),
            pubkey: hex::encode(key.verifying_key().to_bytes()),
            sig: hex::encode(signature.to_bytes()),
        })
    }

    /// Parse the head field back into a CID.
    pub fn head(&self) -> Result<Cid, SchemaError> {
        Cid::try_from(self.head.as_str()).map_err(|e| SchemaError::Decode(e.to_string()))
    }

    /// Verify the envelope signature against its embedded public key.
    pub fn verify(&self) -> Result<(), SchemaError> {
        let key_bytes: [u8; 32] = hex::decode(&self.pubkey)
            .map_err(|e| SchemaError::InvalidKey(e.to_string()))?
            .try_into()
            .map_err(|_| SchemaError::InvalidKey("expected 32 bytes".to_string()))?;
        let verifying_key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| SchemaError::InvalidKey(e.to_string()))?;

        let sig_bytes =
            hex::decode(&self.sig).map_err(|e| SchemaError::Decode(e.to_string()))?;
        let signature =
            Signature::from_slice(&sig_bytes).map_err(|e| SchemaError::Decode(e.to_string()))?;

        let digest = head_digest(&self.head()?, &self.topic)?;
        verifying_key
            .verify(&digest, &signature)
            .map_err(|_| SchemaError::BadSignature)
    }

    /// Encode the envelope as JSON.
    pub fn encode(&self) -> Result<Vec<u8>, SchemaError> {
        serde_json::to_vec(self).map_err(|e| SchemaError::Encode(e.to_string()))
    }

    /// Decode a JSON envelope.
    pub fn decode(bytes: &[u8]) -> Result<Self, SchemaError> {
        serde_json::from_slice(bytes).map_err(|e| SchemaError::Decode(e.to_string()))
    }
}
