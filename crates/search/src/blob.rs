//! Blob stores for rendered page images.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sourcewell_config::StorageConfig;
use sourcewell_core::blob::{BlobStore, image_blob_name};
use sourcewell_core::error::BlobError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Reads images from `{base_url}/{container}/{blob}` over HTTP.
pub struct HttpBlobStore {
    base_url: reqwest::Url,
    container: String,
    client: reqwest::Client,
}

impl HttpBlobStore {
    pub fn new(base_url: &str, container: impl Into<String>) -> Result<Self, BlobError> {
        let base_url = reqwest::Url::parse(base_url).map_err(|e| BlobError::Download {
            path: base_url.to_string(),
            reason: format!("invalid base URL: {e}"),
        })?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| BlobError::Download {
                path: base_url.to_string(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            base_url,
            container: container.into(),
            client,
        })
    }

    /// Build from the `[storage]` config section. `None` when no URL is set.
    pub fn from_config(config: &StorageConfig) -> Result<Option<Self>, BlobError> {
        if config.base_url.is_empty() {
            return Ok(None);
        }
        Self::new(&config.base_url, &config.container).map(Some)
    }

    /// Full URL of a blob, with each path segment percent-encoded.
    fn blob_url(&self, blob_name: &str) -> Result<reqwest::Url, BlobError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BlobError::Download {
                path: blob_name.to_string(),
                reason: "base URL cannot hold a path".into(),
            })?
            .pop_if_empty()
            .push(&self.container)
            .extend(blob_name.split('/'));
        Ok(url)
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn fetch_image(&self, source_page: &str) -> Result<Option<String>, BlobError> {
        let name = image_blob_name(source_page);
        let url = self.blob_url(&name)?;

        debug!(blob = %name, "Downloading page image");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BlobError::Download {
                path: name.clone(),
                reason: e.to_string(),
            })?;

        match response.status().as_u16() {
            200 => {}
            404 => return Err(BlobError::NotFound(name)),
            status => {
                return Err(BlobError::Download {
                    path: name,
                    reason: format!("status {status}"),
                });
            }
        }

        // A blob without content settings has nothing to show
        if response.headers().get(reqwest::header::CONTENT_TYPE).is_none() {
            return Ok(None);
        }

        let bytes = response.bytes().await.map_err(|e| BlobError::Download {
            path: name.clone(),
            reason: e.to_string(),
        })?;
        Ok(Some(STANDARD.encode(&bytes)))
    }
}

/// Blob store backed by a map, for tests and demos.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bytes` under the blob name (e.g. `"report-7.png"`).
    pub async fn insert(&self, blob_name: impl Into<String>, bytes: Vec<u8>) {
        self.blobs.write().await.insert(blob_name.into(), bytes);
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn fetch_image(&self, source_page: &str) -> Result<Option<String>, BlobError> {
        let name = image_blob_name(source_page);
        match self.blobs.read().await.get(&name) {
            Some(bytes) => Ok(Some(STANDARD.encode(bytes))),
            None => Err(BlobError::NotFound(name)),
        }
    }
}
