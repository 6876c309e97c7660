//! Object-storage backend pre-rendering the consumer-facing layout.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use cairn_schema::{Cid, LinkCodec, SignedHead};
use ed25519_dalek::SigningKey;
use tokio::sync::RwLock;
use tracing::error;

use crate::error::ChainError;
use crate::ChainWriter;

/// Object key prefix under which the chain is laid out. Leading slash
/// omitted: object-storage keys starting with `/` create an empty path
/// segment; the public URL carries it instead.
const KEY_PREFIX: &str = "ipni/v1/ad/";

const BLOCK_CACHE_CONTROL: &str = "public, max-age=29030400, immutable";
const HEAD_CACHE_CONTROL: &str = "no-cache, no-store, must-revalidate";

const HEAD_OBJECT_KEY: &str = "ipni/v1/ad/head";

fn block_key(cid: &Cid) -> String {
    format!("{KEY_PREFIX}{cid}")
}

/// Minimal object-storage client surface needed by [`ObjectBackend`].
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Write an object in full, with its HTTP metadata.
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        cache_control: &str,
    ) -> Result<(), ChainError>;

    /// Read an object in full. Returns `None` if the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, ChainError>;
}

/// [`ObjectClient`] over an S3 bucket via the AWS SDK.
pub struct S3ObjectClient {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ObjectClient {
    /// Wrap an existing SDK client.
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from ambient AWS configuration (environment,
    /// profile, instance role).
    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(aws_sdk_s3::Client::new(&config), bucket)
    }
}

#[async_trait]
impl ObjectClient for S3ObjectClient {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        cache_control: &str,
    ) -> Result<(), ChainError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(aws_sdk_s3::primitives::ByteStream::from(body))
            .content_type(content_type)
            .cache_control(cache_control)
            .send()
            .await
            .map_err(|e| ChainError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, ChainError> {
        let out = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(out) => out,
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    return Ok(None);
                }
                return Err(ChainError::Unavailable(e.to_string()));
            }
        };
        let data = out
            .body
            .collect()
            .await
            .map_err(|e| ChainError::Unavailable(e.to_string()))?;
        Ok(Some(data.into_bytes()))
    }
}

/// A stored object with its HTTP metadata, as kept by
/// [`MemoryObjectClient`].
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
    pub cache_control: String,
}

/// In-memory [`ObjectClient`] for tests.
#[derive(Default)]
pub struct MemoryObjectClient {
    objects: std::sync::RwLock<HashMap<String, StoredObject>>,
}

impl MemoryObjectClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a stored object with its metadata.
    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().expect("lock poisoned").get(key).cloned()
    }
}

#[async_trait]
impl ObjectClient for MemoryObjectClient {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        cache_control: &str,
    ) -> Result<(), ChainError> {
        self.objects.write().expect("lock poisoned").insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
                cache_control: cache_control.to_string(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, ChainError> {
        Ok(self
            .objects
            .read()
            .expect("lock poisoned")
            .get(key)
            .map(|o| o.body.clone()))
    }
}

/// Chain backend storing blocks and the signed head directly in object
/// storage, in a form an object-storage HTTP front-end can serve to
/// indexers without any dynamic component.
///
/// Write-only for chain purposes: reads go through the object-storage HTTP
/// endpoint, not through this process. The head CID is still cached in
/// memory (decoded from the signed head object on first use) to avoid a
/// remote round-trip per append.
pub struct ObjectBackend {
    head: RwLock<Option<Cid>>,
    client: Arc<dyn ObjectClient>,
    topic: String,
    provider_key: SigningKey,
}

impl ObjectBackend {
    pub fn new(client: Arc<dyn ObjectClient>, topic: impl Into<String>, provider_key: SigningKey) -> Self {
        Self {
            head: RwLock::new(None),
            client,
            topic: topic.into(),
            provider_key,
        }
    }

    /// Fetch and decode the persisted signed head, bypassing the cache.
    async fn read_head(&self) -> Result<Option<Cid>, ChainError> {
        let Some(bytes) = self.client.get(HEAD_OBJECT_KEY).await? else {
            return Ok(None);
        };
        let signed = SignedHead::decode(&bytes).inspect_err(|e| {
            error!(err = %e, "failed to decode stored head as signed head message");
        })?;
        Ok(Some(signed.head()?))
    }

    async fn write_head(&self, new_head: Cid) -> Result<(), ChainError> {
        let signed = SignedHead::new(new_head, &self.topic, &self.provider_key)?;
        let encoded = signed.encode()?;
        self.client
            .put(
                HEAD_OBJECT_KEY,
                Bytes::from(encoded),
                "application/json",
                HEAD_CACHE_CONTROL,
            )
            .await
    }
}

impl ChainWriter for ObjectBackend {
    async fn update_head<F, Fut>(&self, f: F) -> Result<Cid, ChainError>
    where
        F: FnOnce(Option<Cid>) -> Fut + Send,
        Fut: Future<Output = Result<Cid, ChainError>> + Send,
    {
        let mut head = self.head.write().await;

        let prev = match *head {
            Some(h) => Some(h),
            None => self.read_head().await?,
        };

        let new_head = f(prev).await?;

        self.write_head(new_head).await?;
        *head = Some(new_head);
        Ok(new_head)
    }

    async fn store(&self, codec: LinkCodec, block: Bytes) -> Result<Cid, ChainError> {
        let cid = codec.link_for(&block);
        self.client
            .put(
                &block_key(&cid),
                block,
                codec.content_type(),
                BLOCK_CACHE_CONTROL,
            )
            .await?;
        Ok(cid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::OsRng;

    fn test_backend() -> (Arc<MemoryObjectClient>, ObjectBackend) {
        let client = Arc::new(MemoryObjectClient::new());
        let key = SigningKey::generate(&mut OsRng);
        let backend = ObjectBackend::new(client.clone(), "/cairn/ingest/test", key);
        (client, backend)
    }

    #[tokio::test]
    async fn test_block_layout_and_metadata() {
        let (client, backend) = test_backend();
        let block = Bytes::from_static(b"{\"IsRm\":false}");
        let cid = backend.store(LinkCodec::DagJson, block.clone()).await.unwrap();

        let stored = client.object(&format!("ipni/v1/ad/{cid}")).unwrap();
        assert_eq!(stored.body, block);
        assert_eq!(stored.content_type, "application/json");
        assert_eq!(stored.cache_control, BLOCK_CACHE_CONTROL);
    }

    #[tokio::test]
    async fn test_cbor_block_content_type() {
        let (client, backend) = test_backend();
        let cid = backend
            .store(LinkCodec::DagCbor, Bytes::from_static(b"\xa0"))
            .await
            .unwrap();
        let stored = client.object(&format!("ipni/v1/ad/{cid}")).unwrap();
        assert_eq!(stored.content_type, "application/cbor");
    }

    #[tokio::test]
    async fn test_head_object_is_signed_and_uncacheable() {
        let (client, backend) = test_backend();
        let new_head = LinkCodec::DagJson.link_for(b"ad-1");

        backend
            .update_head(|prev| async move {
                assert_eq!(prev, None);
                Ok(new_head)
            })
            .await
            .unwrap();

        let stored = client.object("ipni/v1/ad/head").unwrap();
        assert_eq!(stored.content_type, "application/json");
        assert_eq!(stored.cache_control, HEAD_CACHE_CONTROL);

        let signed = SignedHead::decode(&stored.body).unwrap();
        signed.verify().unwrap();
        assert_eq!(signed.head().unwrap(), new_head);
        assert_eq!(signed.topic, "/cairn/ingest/test");
    }

    #[tokio::test]
    async fn test_second_update_sees_first_head() {
        let (_client, backend) = test_backend();
        let first = LinkCodec::DagJson.link_for(b"ad-1");
        let second = LinkCodec::DagJson.link_for(b"ad-2");

        backend.update_head(|_| async move { Ok(first) }).await.unwrap();
        backend
            .update_head(|prev| async move {
                assert_eq!(prev, Some(first));
                Ok(second)
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cold_start_decodes_persisted_head() {
        let client = Arc::new(MemoryObjectClient::new());
        let key = SigningKey::generate(&mut OsRng);
        let head = LinkCodec::DagCbor.link_for(b"persisted ad");

        {
            let backend = ObjectBackend::new(client.clone(), "/t", key.clone());
            backend.update_head(|_| async move { Ok(head) }).await.unwrap();
        }

        // A fresh process over the same bucket picks the head back up.
        let backend = ObjectBackend::new(client, "/t", key);
        backend
            .update_head(|prev| async move {
                assert_eq!(prev, Some(head));
                Ok(LinkCodec::DagCbor.link_for(b"next ad"))
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_update_leaves_head_untouched() {
        let (client, backend) = test_backend();
        let head = LinkCodec::DagJson.link_for(b"ad-1");
        backend.update_head(|_| async move { Ok(head) }).await.unwrap();
        let before = client.object("ipni/v1/ad/head").unwrap();

        let result = backend
            .update_head(|_| async { Err(ChainError::InvalidInput("boom".to_string())) })
            .await;
        assert!(result.is_err());

        let after = client.object("ipni/v1/ad/head").unwrap();
        assert_eq!(after.body, before.body);
    }

    #[tokio::test]
    async fn test_corrupt_head_object_is_an_error() {
        let client = Arc::new(MemoryObjectClient::new());
        client
            .put("ipni/v1/ad/head", Bytes::from_static(b"not json"), "application/json", "")
            .await
            .unwrap();

        let key = SigningKey::generate(&mut OsRng);
        let backend = ObjectBackend::new(client, "/t", key);
        let result = backend
            .update_head(|_| async { Ok(LinkCodec::DagJson.link_for(b"x")) })
            .await;
        assert!(result.is_err());
    }
}
