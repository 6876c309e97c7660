//! Ingest API: accepts catalogs over HTTP and feeds the batcher.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use cairn_batch::{BatchError, CatalogBatcher};
use cairn_catalog::MhCatalog;
use cairn_schema::Multihash;
use serde::Deserialize;
use tracing::warn;

/// One catalog submitted for publication or retraction.
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    /// Optional hex-encoded ContextID.
    #[serde(default)]
    pub context_id: Option<String>,
    /// Hex-encoded multihashes.
    pub multihashes: Vec<String>,
}

/// Errors returned by the ingest handlers.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("publication failed: {0}")]
    Failed(#[from] BatchError),
}

impl IntoResponse for IngestError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Failed(BatchError::Chain(cairn_backend::ChainError::InvalidInput(_))) => {
                StatusCode::BAD_REQUEST
            }
            Self::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(err = %self, "ingest request failed");
        }
        (status, self.to_string()).into_response()
    }
}

/// Build the ingest router over a running batcher.
pub fn router(batcher: Arc<CatalogBatcher>) -> Router {
    Router::new()
        .route("/publish", post(publish))
        .route("/retract", post(retract))
        .with_state(batcher)
}

fn parse_catalog(request: IngestRequest) -> Result<MhCatalog, IngestError> {
    let mut mhs = Vec::with_capacity(request.multihashes.len());
    for encoded in &request.multihashes {
        let bytes = hex::decode(encoded)
            .map_err(|e| IngestError::BadRequest(format!("bad multihash {encoded:?}: {e}")))?;
        mhs.push(Multihash::from_bytes(bytes));
    }

    match request.context_id {
        Some(id) => {
            let id = hex::decode(&id)
                .map_err(|e| IngestError::BadRequest(format!("bad context_id: {e}")))?;
            Ok(MhCatalog::with_id(id, mhs))
        }
        None => Ok(MhCatalog::new(mhs)),
    }
}

async fn publish(
    State(batcher): State<Arc<CatalogBatcher>>,
    Json(request): Json<IngestRequest>,
) -> Result<StatusCode, IngestError> {
    let catalog = parse_catalog(request)?;
    batcher.publish_catalog(Box::new(catalog)).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn retract(
    State(batcher): State<Arc<CatalogBatcher>>,
    Json(request): Json<IngestRequest>,
) -> Result<StatusCode, IngestError> {
    let catalog = parse_catalog(request)?;
    batcher.retract_catalog(Box::new(catalog)).await?;
    Ok(StatusCode::ACCEPTED)
}
