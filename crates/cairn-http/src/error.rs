//! HTTP error mapping for the publisher.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use cairn_backend::ChainError;
use cairn_schema::SchemaError;

/// Errors returned by publisher handlers.
#[derive(Debug, thiserror::Error)]
pub enum PublisherError {
    /// The path parameter did not parse as a CID.
    #[error("invalid CID")]
    InvalidCid,

    /// The stored block carries a codec this publisher cannot content-type.
    #[error("invalid block")]
    UnknownCodec,

    /// An error from the chain backend.
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    /// Signing or encoding the head envelope failed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<SchemaError> for PublisherError {
    fn from(e: SchemaError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl PublisherError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCid => StatusCode::BAD_REQUEST,
            Self::UnknownCodec => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Chain(ChainError::ContentNotFound) => StatusCode::NOT_FOUND,
            Self::Chain(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PublisherError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        // Only the bad-CID fault carries a message; everything else is an
        // empty body with the status.
        match self {
            Self::InvalidCid => (status, "invalid CID").into_response(),
            _ => status.into_response(),
        }
    }
}
