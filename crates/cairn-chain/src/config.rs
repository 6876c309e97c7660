//! Chain assembly configuration.

use cairn_schema::{LinkCodec, ProviderId};
use ed25519_dalek::SigningKey;

/// Default number of multihashes per entry-chunk.
pub const DEFAULT_AD_ENTRIES_CHUNK_SIZE: usize = 16_384;

/// Everything the assembler needs to produce advertisements.
#[derive(Clone)]
pub struct ChainConfig {
    /// Maximum number of multihashes per entry-chunk block.
    pub ad_entries_chunk_size: usize,

    /// Identity of the publishing provider.
    pub provider_id: ProviderId,
    /// Keypair corresponding to `provider_id`, used to sign advertisements.
    pub provider_key: SigningKey,

    /// Multiaddrs from which the announced content is retrievable.
    pub provider_addrs: Vec<String>,

    /// HTTP multiaddrs from which the chain itself is available; carried in
    /// announcements, not in advertisements.
    pub publisher_http_addrs: Vec<String>,

    /// Opaque per-deployment payload copied into each advertisement.
    pub metadata: Vec<u8>,

    /// Codec under which chain blocks are serialized and addressed.
    pub link_codec: LinkCodec,
}

impl ChainConfig {
    /// Build a config with default chunk size and codec for the given
    /// provider keypair.
    pub fn new(provider_key: SigningKey) -> Self {
        Self {
            ad_entries_chunk_size: DEFAULT_AD_ENTRIES_CHUNK_SIZE,
            provider_id: ProviderId::from(&provider_key.verifying_key()),
            provider_key,
            provider_addrs: Vec::new(),
            publisher_http_addrs: Vec::new(),
            metadata: Vec::new(),
            link_codec: LinkCodec::default(),
        }
    }
}
