//! Catalog over a fjall keyspace of multihash keys.

use async_trait::async_trait;
use cairn_schema::Multihash;
use fjall::Keyspace;

use crate::error::CatalogError;
use crate::{Catalog, MhIterator};

/// Catalog backed by a local block index: a fjall keyspace whose keys are
/// raw multihash bytes.
///
/// Lets embedders publish straight out of an existing block store without
/// materializing the multihash list themselves.
pub struct StoreCatalog {
    id: Option<Vec<u8>>,
    blocks: Keyspace,
}

impl StoreCatalog {
    /// Create a catalog over the given keyspace, with no ContextID.
    pub fn new(blocks: Keyspace) -> Self {
        Self { id: None, blocks }
    }

    /// Create a catalog carrying a stable identifier.
    pub fn with_id(id: impl Into<Vec<u8>>, blocks: Keyspace) -> Self {
        Self {
            id: Some(id.into()),
            blocks,
        }
    }
}

#[async_trait]
impl Catalog for StoreCatalog {
    fn id(&self) -> Option<&[u8]> {
        self.id.as_deref()
    }

    /// Counts by scanning the keyspace; `None` if the scan fails.
    fn count(&self) -> Option<usize> {
        let mut count = 0;
        for guard in self.blocks.iter() {
            guard.key().ok()?;
            count += 1;
        }
        Some(count)
    }

    async fn iter(&self) -> Result<Box<dyn MhIterator>, CatalogError> {
        let mut keys = Vec::new();
        for guard in self.blocks.iter() {
            let key = guard.key()?;
            keys.push(Multihash::from_bytes(key.to_vec()));
        }
        Ok(Box::new(StoreIter { keys, index: 0 }))
    }
}

struct StoreIter {
    keys: Vec<Multihash>,
    index: usize,
}

#[async_trait]
impl MhIterator for StoreIter {
    async fn next(&mut self) -> Result<Option<Multihash>, CatalogError> {
        let mh = self.keys.get(self.index).cloned();
        if mh.is_some() {
            self.index += 1;
        }
        Ok(mh)
    }
}
