//! Error types for the wire data model.

/// Errors from encoding, decoding, or signing chain records.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// An IPLD node failed to serialize under the requested codec.
    #[error("encode failure: {0}")]
    Encode(String),

    /// A block failed to parse as the expected record type.
    #[error("decode failure: {0}")]
    Decode(String),

    /// The provider key could not produce a signature.
    #[error("signing failure: {0}")]
    Signing(String),

    /// The provider identity bytes are not a valid ed25519 public key.
    #[error("invalid provider key: {0}")]
    InvalidKey(String),

    /// A signature did not verify against the provider identity.
    #[error("signature verification failed")]
    BadSignature,
}
