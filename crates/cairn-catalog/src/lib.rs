//! Catalog sources feeding the cairn advertisement chain.
//!
//! A [`Catalog`] is a finite bag of multihashes submitted as one unit to be
//! published or retracted. Catalogs are transient: the sequence behind a
//! catalog is consumed exactly once.

mod error;
mod mhs;
mod store;

pub use error::CatalogError;
pub use mhs::MhCatalog;
pub use store::StoreCatalog;

use async_trait::async_trait;
use cairn_schema::Multihash;

/// A single unit of multihashes to publish or retract.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// A stable identifier for this catalog, usable as a ContextID.
    ///
    /// `None` (or an empty slice) means there is no reasonable ContextID.
    fn id(&self) -> Option<&[u8]>;

    /// The total number of multihashes, if known.
    fn count(&self) -> Option<usize>;

    /// Start iterating the multihashes.
    ///
    /// The underlying sequence is single-pass; once an iterator has been
    /// exhausted the catalog is spent.
    async fn iter(&self) -> Result<Box<dyn MhIterator>, CatalogError>;
}

/// Iterator over a catalog's multihashes.
///
/// Fused: returns `Ok(None)` once exhausted and on every call after that.
#[async_trait]
pub trait MhIterator: Send {
    /// Yield the next multihash, or `None` when the sequence is done.
    async fn next(&mut self) -> Result<Option<Multihash>, CatalogError>;
}
