//! Embedded key-value backend (fjall or pure in-memory).

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use cairn_schema::{Cid, LinkCodec};
use fjall::{Database, Keyspace, KeyspaceCreateOptions};
use tokio::sync::RwLock;
use tracing::error;

use crate::error::ChainError;
use crate::{ChainReader, ChainWriter};

/// Key under which the head CID bytes are stored. Block keys are CIDv1
/// strings (base32 lowercase, always starting with `b`), so no collision.
const HEAD_KEY: &[u8] = b"head";

/// Inner backend: either fjall-backed (disk) or pure in-memory.
enum Backend {
    Fjall {
        #[allow(dead_code)]
        db: Database,
        chain: Keyspace,
    },
    Memory(std::sync::RwLock<HashMap<Vec<u8>, Vec<u8>>>),
}

/// Chain backend over an embedded key-value store.
///
/// Stores one record per block keyed by CID string plus a single head
/// record holding raw CID bytes. The head CID is cached in memory; the
/// cache lives inside the same `RwLock` that serializes head updates, so
/// reads take the lock shared and `update_head` takes it exclusively.
pub struct KvBackend {
    head: RwLock<Option<Cid>>,
    backend: Backend,
}

impl KvBackend {
    /// Open a persistent backend at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ChainError> {
        let db = Database::builder(path).open()?;
        Self::init_fjall(db)
    }

    /// Open a temporary disk-backed backend (cleaned up on drop).
    pub fn open_temporary() -> Result<Self, ChainError> {
        let tmp = tempfile::tempdir().map_err(|e| ChainError::Unavailable(e.to_string()))?;
        let db = Database::builder(tmp.path()).temporary(true).open()?;
        Self::init_fjall(db)
    }

    /// Create a pure in-memory backend. Zero disk I/O.
    pub fn in_memory() -> Self {
        Self {
            head: RwLock::new(None),
            backend: Backend::Memory(std::sync::RwLock::new(HashMap::new())),
        }
    }

    fn init_fjall(db: Database) -> Result<Self, ChainError> {
        let chain = db.keyspace("chain", KeyspaceCreateOptions::default)?;
        Ok(Self {
            head: RwLock::new(None),
            backend: Backend::Fjall { db, chain },
        })
    }

    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError> {
        match &self.backend {
            Backend::Fjall { chain, .. } => Ok(chain.get(key)?.map(|v| v.to_vec())),
            Backend::Memory(m) => Ok(m.read().expect("lock poisoned").get(key).cloned()),
        }
    }

    fn put_raw(&self, key: &[u8], value: Vec<u8>) -> Result<(), ChainError> {
        match &self.backend {
            Backend::Fjall { chain, .. } => {
                chain.insert(key, value.as_slice())?;
            }
            Backend::Memory(m) => {
                m.write().expect("lock poisoned").insert(key.to_vec(), value);
            }
        }
        Ok(())
    }

    /// Read the persisted head, bypassing the cache.
    fn read_head(&self) -> Result<Option<Cid>, ChainError> {
        match self.get_raw(HEAD_KEY)? {
            None => Ok(None),
            Some(bytes) => match Cid::try_from(bytes) {
                Ok(head) => Ok(Some(head)),
                Err(e) => {
                    error!(err = %e, "failed to decode stored head as CID");
                    Err(ChainError::Unavailable(format!(
                        "stored head is not a valid CID: {e}"
                    )))
                }
            },
        }
    }
}

impl ChainWriter for KvBackend {
    async fn update_head<F, Fut>(&self, f: F) -> Result<Cid, ChainError>
    where
        F: FnOnce(Option<Cid>) -> Fut + Send,
        Fut: Future<Output = Result<Cid, ChainError>> + Send,
    {
        let mut head = self.head.write().await;

        let prev = match *head {
            Some(h) => Some(h),
            None => self.read_head()?,
        };

        let new_head = f(prev).await?;

        self.put_raw(HEAD_KEY, new_head.to_bytes())?;
        *head = Some(new_head);
        Ok(new_head)
    }

    async fn store(&self, codec: LinkCodec, block: Bytes) -> Result<Cid, ChainError> {
        let cid = codec.link_for(&block);
        self.put_raw(cid.to_string().as_bytes(), block.to_vec())?;
        Ok(cid)
    }
}

#[async_trait]
impl ChainReader for KvBackend {
    async fn get_head(&self) -> Result<Option<Cid>, ChainError> {
        if let Some(head) = *self.head.read().await {
            return Ok(Some(head));
        }
        // Populate the cache from disk under the exclusive lock.
        let mut head = self.head.write().await;
        if head.is_none() {
            *head = self.read_head()?;
        }
        Ok(*head)
    }

    async fn get_content(&self, cid: Cid) -> Result<Bytes, ChainError> {
        match self.get_raw(cid.to_string().as_bytes())? {
            Some(bytes) => Ok(Bytes::from(bytes)),
            None => Err(ChainError::ContentNotFound),
        }
    }
}
