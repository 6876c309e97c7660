//! Concurrent catalog batcher.
//!
//! Separates two publishing regimes on catalog size:
//!
//! - **Large catalogs** (count above the threshold) pass straight through
//!   to the with-ContextID assembler strategies, synchronously, so an
//!   already-large input is never queued behind a timer. The ContextID
//!   makes later retraction cheap.
//! - **Small catalogs** (at or below the threshold, or of unknown count)
//!   are handed to a batching pipeline and accumulated into a single
//!   raw-multihash advertisement, bounded by size and staleness. A batched
//!   mixture has no coherent identifier, so no ContextID is assigned.
//!
//! Publishes and retractions run through two independent pipelines that
//! never mix catalogs. Both regimes serialize through the backend's head
//! lock, so the chain stays linear.

mod worker;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use cairn_announce::{AnnounceError, AnnounceSender};
use cairn_backend::ChainError;
use cairn_catalog::Catalog;
use cairn_chain::AdAssembler;
use tokio::sync::mpsc;

use worker::{Direction, run_batcher};

/// Default hard upper bound of multihashes per flushed batch.
///
/// The chain format itself tolerates advertisements of tens of millions of
/// multihashes; staying much lower avoids memory spikes for almost zero
/// downside.
pub const DEFAULT_MAX_MHS_PER_ADVERTISEMENT: usize = 200_000;

/// Default upper bound on batch staleness.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Batching thresholds and bounds.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Catalogs with a known count above this pass through as a single
    /// with-ContextID advertisement; everything else is batched.
    pub count_threshold: usize,

    /// Maximum number of multihashes per flushed batch. A batch at or over
    /// this size flushes immediately.
    pub max_mhs_per_advertisement: usize,

    /// Maximum delay before a non-empty batch flushes.
    pub max_delay: Duration,
}

impl BatchConfig {
    /// Config with the given threshold and default bounds.
    pub fn new(count_threshold: usize) -> Self {
        Self {
            count_threshold,
            max_mhs_per_advertisement: DEFAULT_MAX_MHS_PER_ADVERTISEMENT,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

/// Errors returned to callers of [`CatalogBatcher`].
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// The assembler failed; the head was not advanced.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// The head advanced but the announcement could not be delivered.
    /// Best-effort status: the chain itself is intact and indexers polling
    /// the head endpoint will still observe the new head.
    #[error(transparent)]
    Announce(#[from] AnnounceError),

    /// The batcher's workers have shut down.
    #[error("batcher is shut down")]
    Closed,
}

/// Batcher for publishing and retracting catalogs.
///
/// Dropping the batcher closes both pipelines; each worker flushes any
/// pending batch once and exits.
pub struct CatalogBatcher {
    config: BatchConfig,
    assembler: Arc<dyn AdAssembler>,
    announcer: Arc<dyn AnnounceSender>,
    publisher_http_addrs: Vec<String>,

    publish_tx: mpsc::Sender<Box<dyn Catalog>>,
    retract_tx: mpsc::Sender<Box<dyn Catalog>>,
}

impl CatalogBatcher {
    /// Start the batcher and its two pipeline workers.
    pub fn start(
        config: BatchConfig,
        assembler: Arc<dyn AdAssembler>,
        announcer: Arc<dyn AnnounceSender>,
        publisher_http_addrs: Vec<String>,
    ) -> Self {
        let (publish_tx, publish_rx) = mpsc::channel(1);
        let (retract_tx, retract_rx) = mpsc::channel(1);

        tokio::spawn(run_batcher(
            Direction::Publish,
            publish_rx,
            config.clone(),
            assembler.clone(),
            announcer.clone(),
            publisher_http_addrs.clone(),
        ));
        tokio::spawn(run_batcher(
            Direction::Retract,
            retract_rx,
            config.clone(),
            assembler.clone(),
            announcer.clone(),
            publisher_http_addrs.clone(),
        ));

        Self {
            config,
            assembler,
            announcer,
            publisher_http_addrs,
            publish_tx,
            retract_tx,
        }
    }

    /// Publish a catalog.
    ///
    /// Large catalogs are published synchronously; small ones return as
    /// soon as the batching pipeline has accepted them. Once accepted, the
    /// batcher owns the catalog and caller cancellation has no effect.
    pub async fn publish_catalog(&self, catalog: Box<dyn Catalog>) -> Result<(), BatchError> {
        if self.is_large(catalog.as_ref()) {
            let new_head = self.assembler.publish_with_context_id(catalog.as_ref()).await?;
            cairn_announce::send(
                new_head,
                &self.publisher_http_addrs,
                self.announcer.as_ref(),
            )
            .await?;
            return Ok(());
        }

        self.publish_tx
            .send(catalog)
            .await
            .map_err(|_| BatchError::Closed)
    }

    /// Retract a catalog. Mirrors [`publish_catalog`](Self::publish_catalog).
    pub async fn retract_catalog(&self, catalog: Box<dyn Catalog>) -> Result<(), BatchError> {
        if self.is_large(catalog.as_ref()) {
            let new_head = self.assembler.retract_with_context_id(catalog.as_ref()).await?;
            cairn_announce::send(
                new_head,
                &self.publisher_http_addrs,
                self.announcer.as_ref(),
            )
            .await?;
            return Ok(());
        }

        self.retract_tx
            .send(catalog)
            .await
            .map_err(|_| BatchError::Closed)
    }

    /// An unknown count is treated as small.
    fn is_large(&self, catalog: &dyn Catalog) -> bool {
        catalog
            .count()
            .is_some_and(|count| count > self.config.count_threshold)
    }
}
