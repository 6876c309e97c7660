//! In-memory catalog over a multihash slice.

use std::sync::Arc;

use async_trait::async_trait;
use cairn_schema::Multihash;

use crate::error::CatalogError;
use crate::{Catalog, MhIterator};

/// Catalog backed by an in-memory multihash list.
///
/// This is what the batcher synthesizes when flushing an accumulated batch,
/// and the simplest source for embedders that already hold the multihashes.
#[derive(Debug, Clone)]
pub struct MhCatalog {
    id: Option<Vec<u8>>,
    mhs: Arc<Vec<Multihash>>,
}

impl MhCatalog {
    /// Create a catalog with no ContextID.
    pub fn new(mhs: Vec<Multihash>) -> Self {
        Self {
            id: None,
            mhs: Arc::new(mhs),
        }
    }

    /// Create a catalog carrying a stable identifier.
    pub fn with_id(id: impl Into<Vec<u8>>, mhs: Vec<Multihash>) -> Self {
        Self {
            id: Some(id.into()),
            mhs: Arc::new(mhs),
        }
    }
}

impl From<Vec<Multihash>> for MhCatalog {
    fn from(mhs: Vec<Multihash>) -> Self {
        Self::new(mhs)
    }
}

#[async_trait]
impl Catalog for MhCatalog {
    fn id(&self) -> Option<&[u8]> {
        self.id.as_deref()
    }

    fn count(&self) -> Option<usize> {
        Some(self.mhs.len())
    }

    async fn iter(&self) -> Result<Box<dyn MhIterator>, CatalogError> {
        Ok(Box::new(MhsIter {
            mhs: self.mhs.clone(),
            index: 0,
        }))
    }
}

struct MhsIter {
    mhs: Arc<Vec<Multihash>>,
    index: usize,
}

#[async_trait]
impl MhIterator for MhsIter {
    async fn next(&mut self) -> Result<Option<Multihash>, CatalogError> {
        let mh = self.mhs.get(self.index).cloned();
        if mh.is_some() {
            self.index += 1;
        }
        Ok(mh)
    }
}
