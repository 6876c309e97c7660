//! Head announcement dispatch.
//!
//! After each head advance the publisher notifies subscribers with the new
//! head CID and the HTTP addresses the chain can be fetched from. The
//! transport is pluggable behind [`AnnounceSender`]; send failures never
//! roll back the chain.

use async_trait::async_trait;
use cairn_schema::Cid;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Announcement of a new chain head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    /// The new head CID in string form.
    pub cid: String,
    /// HTTP multiaddrs from which the chain is available.
    pub addrs: Vec<String>,
}

impl Announcement {
    pub fn new(head: Cid, addrs: Vec<String>) -> Self {
        Self {
            cid: head.to_string(),
            addrs,
        }
    }
}

/// Errors from announcement transports.
#[derive(Debug, thiserror::Error)]
pub enum AnnounceError {
    /// The transport could not deliver the announcement.
    #[error("announcement send failure: {0}")]
    Send(String),
}

/// A transport that delivers head announcements to subscribers.
#[async_trait]
pub trait AnnounceSender: Send + Sync {
    async fn send(&self, announcement: Announcement) -> Result<(), AnnounceError>;
}

/// Announce a new head over the given sender.
pub async fn send(
    head: Cid,
    addrs: &[String],
    sender: &dyn AnnounceSender,
) -> Result<(), AnnounceError> {
    sender.send(Announcement::new(head, addrs.to_vec())).await
}

/// [`AnnounceSender`] that POSTs the announcement as JSON to each
/// configured endpoint.
pub struct HttpSender {
    client: reqwest::Client,
    endpoints: Vec<String>,
}

impl HttpSender {
    pub fn new(endpoints: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints,
        }
    }
}

#[async_trait]
impl AnnounceSender for HttpSender {
    async fn send(&self, announcement: Announcement) -> Result<(), AnnounceError> {
        for endpoint in &self.endpoints {
            let response = self
                .client
                .post(endpoint)
                .json(&announcement)
                .send()
                .await
                .map_err(|e| AnnounceError::Send(e.to_string()))?;
            response
                .error_for_status()
                .map_err(|e| AnnounceError::Send(e.to_string()))?;
            debug!(endpoint = %endpoint, cid = %announcement.cid, "announced new head");
        }
        Ok(())
    }
}

/// [`AnnounceSender`] that drops announcements, for deployments whose
/// indexers poll the head endpoint instead.
#[derive(Debug, Default)]
pub struct NoopSender;

#[async_trait]
impl AnnounceSender for NoopSender {
    async fn send(&self, _announcement: Announcement) -> Result<(), AnnounceError> {
        Ok(())
    }
}
