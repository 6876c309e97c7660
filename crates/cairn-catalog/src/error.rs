//! Error types for catalog sources.

/// Errors that can occur while enumerating a catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Fjall database error from a store-backed catalog.
    #[error("fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The underlying source failed mid-iteration.
    #[error("iteration failure: {0}")]
    Iteration(String),
}
