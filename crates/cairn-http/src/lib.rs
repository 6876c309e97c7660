//! HTTP publisher serving the chain to indexers.
//!
//! A stateless renderer over any reader-capable backend:
//!
//! - `GET /head` — the current chain head as a signed JSON envelope, or
//!   `204 No Content` while the chain is empty.
//! - `GET /{cid}` — the raw bytes of a chain block, content-typed by its
//!   codec.
//!
//! Anything else is a client error; the chain is append-only and this
//! surface is read-only.

mod error;


use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use cairn_backend::ChainReader;
use cairn_schema::{Cid, LinkCodec, SignedHead};
use ed25519_dalek::SigningKey;
use tower_http::timeout::TimeoutLayer;
use tracing::{debug, error};

pub use error::PublisherError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared state for the publisher handlers.
#[derive(Clone)]
struct AppState {
    backend: Arc<dyn ChainReader>,
    topic: String,
    provider_key: Arc<SigningKey>,
}

/// Configuration for creating an [`HttpPublisher`].
pub struct HttpPublisherConfig {
    /// The backend to render the chain from.
    pub backend: Arc<dyn ChainReader>,
    /// Topic name embedded in signed head envelopes.
    pub topic: String,
    /// Provider keypair used to sign head envelopes.
    pub provider_key: SigningKey,
}

/// HTTP publisher over any [`ChainReader`] implementation.
pub struct HttpPublisher {
    router: Router,
}

impl HttpPublisher {
    /// Create a new publisher with the given configuration.
    pub fn new(config: HttpPublisherConfig) -> Self {
        let state = AppState {
            backend: config.backend,
            topic: config.topic,
            provider_key: Arc::new(config.provider_key),
        };

        let router = Router::new()
            .route("/head", get(get_head))
            .route("/{cid}", get(get_content))
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
            .with_state(state);

        Self { router }
    }

    /// Return the inner [`Router`] (useful for testing with
    /// `tower::ServiceExt`).
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve the chain on the given TCP address.
    pub async fn serve(self, addr: &str) -> Result<(), std::io::Error> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(addr, "HTTP publisher listening");
        axum::serve(listener, self.router).await
    }

    /// Serve with graceful shutdown triggered by the given future.
    ///
    /// When `shutdown` completes, the server stops accepting new
    /// connections and waits for in-flight requests to finish.
    pub async fn serve_with_shutdown(
        self,
        addr: &str,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(addr, "HTTP publisher listening");
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

/// `GET /head`
async fn get_head(State(state): State<AppState>) -> Result<Response, PublisherError> {
    let head = state
        .backend
        .get_head()
        .await
        .inspect_err(|e| error!(err = %e, "failed to get head CID"))?;

    let Some(head) = head else {
        return Ok(axum::http::StatusCode::NO_CONTENT.into_response());
    };

    let signed = SignedHead::new(head, &state.topic, &state.provider_key)
        .inspect_err(|e| error!(err = %e, "failed to generate signed head message"))?;
    let body = signed
        .encode()
        .inspect_err(|e| error!(err = %e, "failed to encode signed head message"))?;

    debug!(head = %head, "responding with signed head message");
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// `GET /{cid}`
async fn get_content(
    State(state): State<AppState>,
    Path(cid): Path<String>,
) -> Result<Response, PublisherError> {
    let cid = Cid::try_from(cid.as_str()).map_err(|e| {
        debug!(path_param = %cid, err = %e, "invalid CID as path parameter");
        PublisherError::InvalidCid
    })?;

    let content = state
        .backend
        .get_content(cid)
        .await
        .inspect_err(|e| {
            if !matches!(e, cairn_backend::ChainError::ContentNotFound) {
                error!(cid = %cid, err = %e, "failed to get content from store");
            }
        })?;

    let Some(codec) = LinkCodec::from_code(cid.codec()) else {
        error!(cid = %cid, codec = cid.codec(), "unknown block codec");
        return Err(PublisherError::UnknownCodec);
    };

    Ok(([(header::CONTENT_TYPE, codec.content_type())], content).into_response())
}
