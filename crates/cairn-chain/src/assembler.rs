//! The four advertisement strategies and their shared machinery.

use std::sync::Arc;

use async_trait::async_trait;
use cairn_backend::{ChainError, ChainWriter};
use cairn_catalog::Catalog;
use cairn_schema::{Advertisement, Cid, EntryChunk, Multihash, no_entries};
use tracing::{error, info};

use crate::config::ChainConfig;

/// The four ways a catalog becomes an advertisement.
///
/// Each call produces exactly one new advertisement and advances the head
/// by one. The batcher selects strategies at construction time; tests
/// inject counting fakes.
#[async_trait]
pub trait AdAssembler: Send + Sync {
    /// Publish a catalog under its own ContextID, for easy retraction.
    ///
    /// Fails with [`ChainError::InvalidInput`] when the catalog has no
    /// non-empty ID, or no multihashes.
    async fn publish_with_context_id(&self, catalog: &dyn Catalog) -> Result<Cid, ChainError>;

    /// Retract everything previously published under the catalog's
    /// ContextID. The catalog's multihashes are not enumerated; the
    /// advertisement carries the no-entries sentinel.
    async fn retract_with_context_id(&self, catalog: &dyn Catalog) -> Result<Cid, ChainError>;

    /// Publish a catalog's multihashes with no ContextID.
    async fn publish_raw_mhs(&self, catalog: &dyn Catalog) -> Result<Cid, ChainError>;

    /// Retract a catalog's multihashes with no ContextID.
    async fn retract_raw_mhs(&self, catalog: &dyn Catalog) -> Result<Cid, ChainError>;
}

/// The real assembler: writes entry-chunks and signed advertisements
/// through a [`ChainWriter`].
pub struct ChainAssembler<B> {
    config: ChainConfig,
    backend: Arc<B>,
}

impl<B: ChainWriter> ChainAssembler<B> {
    pub fn new(config: ChainConfig, backend: Arc<B>) -> Self {
        Self { config, backend }
    }

    /// Walk the catalog and write the linked chain of entry-chunks.
    ///
    /// Runs entirely outside the head lock; a failure here leaves only
    /// unreferenced content-addressed blocks behind. Returns `None` for an
    /// empty catalog.
    async fn generate_entries(&self, catalog: &dyn Catalog) -> Result<Option<Cid>, ChainError> {
        let chunk_size = self.config.ad_entries_chunk_size;
        let mut mhs: Vec<Multihash> = Vec::with_capacity(chunk_size);
        let mut next: Option<Cid> = None;
        let mut mh_count = 0usize;
        let mut chunk_count = 0usize;

        let mut iter = catalog.iter().await?;
        while let Some(mh) = iter.next().await? {
            mhs.push(mh);
            mh_count += 1;
            if mhs.len() >= chunk_size {
                next = Some(self.generate_entries_chunk(next, std::mem::take(&mut mhs)).await?);
                chunk_count += 1;
            }
        }
        if !mhs.is_empty() {
            next = Some(self.generate_entries_chunk(next, mhs).await?);
            chunk_count += 1;
        }

        let link = next.map(|c| c.to_string()).unwrap_or_default();
        info!(
            link = %link,
            total_mh_count = mh_count,
            chunk_count,
            "generated linked chunks of multihashes"
        );
        Ok(next)
    }

    /// Write a single entry-chunk, chained onto `next` if present.
    async fn generate_entries_chunk(
        &self,
        next: Option<Cid>,
        entries: Vec<Multihash>,
    ) -> Result<Cid, ChainError> {
        let chunk = EntryChunk { entries, next };
        let block = self.config.link_codec.encode(&chunk)?;
        self.backend.store(self.config.link_codec, block.into()).await
    }

    /// Build, sign, and append one advertisement under the head lock.
    async fn generate_advertisement(
        &self,
        context_id: Vec<u8>,
        entries: Cid,
        is_rm: bool,
    ) -> Result<Cid, ChainError> {
        let codec = self.config.link_codec;
        let config = &self.config;
        let backend = &self.backend;

        backend
            .update_head(|prev| async move {
                let mut ad = Advertisement {
                    previous_id: prev,
                    provider: config.provider_id,
                    addresses: config.provider_addrs.clone(),
                    entries,
                    context_id,
                    metadata: config.metadata.clone(),
                    is_rm,
                    signature: Vec::new(),
                };
                ad.sign(&config.provider_key)
                    .inspect_err(|e| error!(err = %e, "failed to sign advertisement"))?;
                let block = codec
                    .encode(&ad)
                    .inspect_err(|e| error!(err = %e, "failed to encode advertisement"))?;
                backend
                    .store(codec, block.into())
                    .await
                    .inspect_err(|e| error!(err = %e, "failed to store advertisement"))
            })
            .await
    }
}

#[async_trait]
impl<B: ChainWriter> AdAssembler for ChainAssembler<B> {
    async fn publish_with_context_id(&self, catalog: &dyn Catalog) -> Result<Cid, ChainError> {
        let id = match catalog.id() {
            Some(id) if !id.is_empty() => id.to_vec(),
            _ => {
                return Err(ChainError::InvalidInput(
                    "no valid ContextID to publish".to_string(),
                ));
            }
        };
        let entries = self.generate_entries(catalog).await?.ok_or_else(|| {
            ChainError::InvalidInput("cannot publish an empty catalog".to_string())
        })?;
        self.generate_advertisement(id, entries, false).await
    }

    async fn retract_with_context_id(&self, catalog: &dyn Catalog) -> Result<Cid, ChainError> {
        let id = catalog.id().unwrap_or_default().to_vec();
        self.generate_advertisement(id, no_entries(), true).await
    }

    async fn publish_raw_mhs(&self, catalog: &dyn Catalog) -> Result<Cid, ChainError> {
        let entries = self.generate_entries(catalog).await?.ok_or_else(|| {
            ChainError::InvalidInput("cannot publish an empty catalog".to_string())
        })?;
        self.generate_advertisement(Vec::new(), entries, false).await
    }

    async fn retract_raw_mhs(&self, catalog: &dyn Catalog) -> Result<Cid, ChainError> {
        let entries = self.generate_entries(catalog).await?.ok_or_else(|| {
            ChainError::InvalidInput("cannot retract an empty catalog".to_string())
        })?;
        self.generate_advertisement(Vec::new(), entries, true).await
    }
}
