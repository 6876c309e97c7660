//! Tests for the catalog batcher.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cairn_backend::{ChainError, ChainReader, KvBackend};
use cairn_catalog::{Catalog, MhCatalog};
use cairn_chain::{AdAssembler, ChainAssembler, ChainConfig};
use cairn_schema::{Advertisement, Cid, LinkCodec, Multihash};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use tokio::sync::Mutex;

use crate::{BatchConfig, CatalogBatcher};

fn stub_cid() -> Cid {
    LinkCodec::DagJson.link_for(b"stub advertisement")
}

/// Assembler fake counting multihashes per strategy.
#[derive(Default)]
struct CountingAssembler {
    publish_with_context_id: AtomicI64,
    retract_with_context_id: AtomicI64,
    publish_raw_mhs: AtomicI64,
    retract_raw_mhs: AtomicI64,
}

impl CountingAssembler {
    fn count(counter: &AtomicI64, catalog: &dyn Catalog) -> Result<Cid, ChainError> {
        counter.fetch_add(catalog.count().unwrap_or(0) as i64, Ordering::SeqCst);
        Ok(stub_cid())
    }
}

#[async_trait]
impl AdAssembler for CountingAssembler {
    async fn publish_with_context_id(&self, catalog: &dyn Catalog) -> Result<Cid, ChainError> {
        Self::count(&self.publish_with_context_id, catalog)
    }

    async fn retract_with_context_id(&self, catalog: &dyn Catalog) -> Result<Cid, ChainError> {
        Self::count(&self.retract_with_context_id, catalog)
    }

    async fn publish_raw_mhs(&self, catalog: &dyn Catalog) -> Result<Cid, ChainError> {
        Self::count(&self.publish_raw_mhs, catalog)
    }

    async fn retract_raw_mhs(&self, catalog: &dyn Catalog) -> Result<Cid, ChainError> {
        Self::count(&self.retract_raw_mhs, catalog)
    }
}

async fn eventually_eq(counter: &AtomicI64, expected: i64) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if counter.load(Ordering::SeqCst) == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(counter.load(Ordering::SeqCst), expected);
}

/// Generates catalogs of globally distinct multihashes.
struct CatalogMaker {
    counter: usize,
}

impl CatalogMaker {
    fn new() -> Self {
        Self { counter: 0 }
    }

    fn make(&mut self, size: usize) -> Box<dyn Catalog> {
        let mhs: Vec<Multihash> = (0..size)
            .map(|_| {
                let mh = Multihash::sha2_256(self.counter.to_string().as_bytes());
                self.counter += 1;
                mh
            })
            .collect();
        Box::new(MhCatalog::new(mhs))
    }
}

#[tokio::test]
async fn test_batching() {
    const THRESHOLD: usize = 10;

    let assembler = Arc::new(CountingAssembler::default());
    let batcher = CatalogBatcher::start(
        BatchConfig {
            count_threshold: THRESHOLD,
            max_mhs_per_advertisement: 10,
            max_delay: Duration::from_secs(1),
        },
        assembler.clone(),
        Arc::new(cairn_announce::NoopSender),
        Vec::new(),
    );

    let mut catalogs = CatalogMaker::new();

    // Publish: batch small catalogs.
    for _ in 0..1000 {
        batcher.publish_catalog(catalogs.make(5)).await.unwrap();
    }
    eventually_eq(&assembler.publish_raw_mhs, 5000).await;

    // Publish: pass through large catalogs.
    batcher.publish_catalog(catalogs.make(1000)).await.unwrap();
    batcher.publish_catalog(catalogs.make(1000)).await.unwrap();
    eventually_eq(&assembler.publish_with_context_id, 2000).await;

    // Retract: batch small catalogs.
    for _ in 0..1000 {
        batcher.retract_catalog(catalogs.make(5)).await.unwrap();
    }
    eventually_eq(&assembler.retract_raw_mhs, 5000).await;

    // Retract: pass through large catalogs.
    batcher.retract_catalog(catalogs.make(1000)).await.unwrap();
    batcher.retract_catalog(catalogs.make(1000)).await.unwrap();
    eventually_eq(&assembler.retract_with_context_id, 2000).await;

    assert_eq!(assembler.publish_raw_mhs.load(Ordering::SeqCst), 5000);
    assert_eq!(assembler.retract_raw_mhs.load(Ordering::SeqCst), 5000);
    assert_eq!(assembler.publish_with_context_id.load(Ordering::SeqCst), 2000);
    assert_eq!(assembler.retract_with_context_id.load(Ordering::SeqCst), 2000);
}

/// Assembler fake recording the multihashes of every raw publish flush.
#[derive(Default)]
struct RecordingAssembler {
    flushed: Mutex<Vec<Multihash>>,
}

#[async_trait]
impl AdAssembler for RecordingAssembler {
    async fn publish_with_context_id(&self, _catalog: &dyn Catalog) -> Result<Cid, ChainError> {
        unreachable!("large path not exercised")
    }

    async fn retract_with_context_id(&self, _catalog: &dyn Catalog) -> Result<Cid, ChainError> {
        unreachable!("large path not exercised")
    }

    async fn publish_raw_mhs(&self, catalog: &dyn Catalog) -> Result<Cid, ChainError> {
        let mut iter = catalog.iter().await?;
        let mut flushed = self.flushed.lock().await;
        while let Some(mh) = iter.next().await? {
            flushed.push(mh);
        }
        Ok(stub_cid())
    }

    async fn retract_raw_mhs(&self, _catalog: &dyn Catalog) -> Result<Cid, ChainError> {
        unreachable!("retract pipeline not exercised")
    }
}

#[tokio::test]
async fn test_batched_multihashes_keep_arrival_order() {
    let assembler = Arc::new(RecordingAssembler::default());
    let batcher = CatalogBatcher::start(
        BatchConfig {
            count_threshold: 100,
            max_mhs_per_advertisement: 7,
            max_delay: Duration::from_millis(100),
        },
        assembler.clone(),
        Arc::new(cairn_announce::NoopSender),
        Vec::new(),
    );

    let mut expected = Vec::new();
    for i in 0..20usize {
        let mh = Multihash::sha2_256(&i.to_le_bytes());
        expected.push(mh.clone());
        batcher
            .publish_catalog(Box::new(MhCatalog::new(vec![mh])))
            .await
            .unwrap();
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        {
            let flushed = assembler.flushed.lock().await;
            if flushed.len() == expected.len() {
                assert_eq!(*flushed, expected);
                break;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "flushes did not drain in time"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn test_pending_batch_flushes_on_shutdown() {
    let assembler = Arc::new(CountingAssembler::default());
    let batcher = CatalogBatcher::start(
        BatchConfig {
            count_threshold: 10,
            max_mhs_per_advertisement: 1000,
            max_delay: Duration::from_secs(3600),
        },
        assembler.clone(),
        Arc::new(cairn_announce::NoopSender),
        Vec::new(),
    );

    let mut catalogs = CatalogMaker::new();
    batcher.publish_catalog(catalogs.make(3)).await.unwrap();

    // The timer would not fire for an hour; dropping the batcher closes the
    // pipelines and the worker flushes what it holds.
    drop(batcher);
    eventually_eq(&assembler.publish_raw_mhs, 3).await;
}

#[tokio::test]
async fn test_small_catalogs_reach_the_chain() {
    let key = SigningKey::generate(&mut OsRng);
    let mut chain_config = ChainConfig::new(key);
    chain_config.ad_entries_chunk_size = 4;

    let backend = Arc::new(KvBackend::in_memory());
    let assembler = Arc::new(ChainAssembler::new(chain_config, backend.clone()));

    let batcher = CatalogBatcher::start(
        BatchConfig {
            count_threshold: 10,
            max_mhs_per_advertisement: 6,
            max_delay: Duration::from_millis(100),
        },
        assembler,
        Arc::new(cairn_announce::NoopSender),
        Vec::new(),
    );

    let mut catalogs = CatalogMaker::new();
    for _ in 0..4 {
        batcher.publish_catalog(catalogs.make(3)).await.unwrap();
    }

    // 12 multihashes total end up on the chain, spread over one or more
    // advertisements depending on flush timing.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let total = chain_mh_count(&backend).await;
        if total == 12 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "only {total} multihashes reached the chain"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Count every multihash reachable from the chain head.
async fn chain_mh_count(backend: &KvBackend) -> usize {
    let mut total = 0;
    let mut ad_link = backend.get_head().await.unwrap();
    while let Some(ad_cid) = ad_link {
        let codec = LinkCodec::from_code(ad_cid.codec()).unwrap();
        let ad: Advertisement = codec
            .decode(&backend.get_content(ad_cid).await.unwrap())
            .unwrap();
        let mut chunk_link = Some(ad.entries);
        while let Some(chunk_cid) = chunk_link {
            let chunk: cairn_schema::EntryChunk = codec
                .decode(&backend.get_content(chunk_cid).await.unwrap())
                .unwrap();
            total += chunk.entries.len();
            chunk_link = chunk.next;
        }
        ad_link = ad.previous_id;
    }
    total
}
