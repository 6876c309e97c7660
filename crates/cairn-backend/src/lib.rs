//! Chain storage backends.
//!
//! A backend owns the two pieces of persistent chain state: the atomically
//! updated head cell and the content-addressed block store. Writers append
//! through [`ChainWriter`]; the HTTP publisher reads through
//! [`ChainReader`]. Two implementations are provided: [`KvBackend`] over an
//! embedded fjall database (or pure memory), and [`ObjectBackend`] which
//! pre-renders the consumer-facing layout into object storage.

mod error;
mod kv;
mod object;

pub use error::ChainError;
pub use kv::KvBackend;
pub use object::{MemoryObjectClient, ObjectBackend, ObjectClient, S3ObjectClient, StoredObject};

use std::future::Future;

use async_trait::async_trait;
use bytes::Bytes;
use cairn_schema::{Cid, LinkCodec};

/// Write access to a chain backend.
pub trait ChainWriter: Send + Sync {
    /// Atomically update the chain head.
    ///
    /// Acquires exclusive head access, reads the current head (`None` if
    /// the chain hasn't started), and invokes `f` with it. On success the
    /// returned CID is persisted as the new head and handed back to the
    /// caller; on error the persisted head is left untouched.
    fn update_head<F, Fut>(&self, f: F) -> impl Future<Output = Result<Cid, ChainError>> + Send
    where
        F: FnOnce(Option<Cid>) -> Fut + Send,
        Fut: Future<Output = Result<Cid, ChainError>> + Send;

    /// Persist a serialized IPLD block and return its content address.
    ///
    /// Idempotent: storing identical bytes under the same CID is a no-op.
    fn store(
        &self,
        codec: LinkCodec,
        block: Bytes,
    ) -> impl Future<Output = Result<Cid, ChainError>> + Send;
}

/// Read access to a chain backend.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// The CID of the chain head, or `None` if the chain hasn't started.
    async fn get_head(&self) -> Result<Option<Cid>, ChainError>;

    /// The raw bytes of a chain block.
    ///
    /// Returns [`ChainError::ContentNotFound`] if the block is absent.
    async fn get_content(&self, cid: Cid) -> Result<Bytes, ChainError>;
}
