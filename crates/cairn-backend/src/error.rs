//! Error types for chain operations.

use cairn_catalog::CatalogError;
use cairn_schema::SchemaError;

/// Errors surfaced by chain writers, readers, and the assembler on top.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The caller supplied something unusable (missing ContextID, empty
    /// catalog in a publish path, malformed CID).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The requested block is not in the store.
    #[error("content not found")]
    ContentNotFound,

    /// Fjall database error from the embedded backend.
    #[error("fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    /// Transient storage failure; the head was not touched.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Encoding, decoding, or signing failure for a chain record.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The catalog being published failed mid-iteration.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// A local deadline expired.
    #[error("operation timed out")]
    Timeout,
}
