//! Image-space query vectorization.
//!
//! Page images are indexed with vectors from a multimodal retrieval model;
//! to search them, the query text must be vectorized by the same model.
//! [`VisionVectorizer`] calls the `retrieval:vectorizeText` endpoint, and
//! [`CombinedEmbeddings`] pairs it with a text embedding service so the
//! approaches see one [`EmbeddingService`].

use async_trait::async_trait;
use serde::Deserialize;
use sourcewell_config::VisionConfig;
use sourcewell_core::EmbeddingService;
use sourcewell_core::error::EmbeddingError;
use std::sync::Arc;
use tracing::{debug, error};

/// Client for the image retrieval vectorizer.
pub struct VisionVectorizer {
    endpoint: String,
    api_key: String,
    api_version: String,
    model_version: String,
    client: reqwest::Client,
}

impl VisionVectorizer {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        api_version: impl Into<String>,
        model_version: impl Into<String>,
    ) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| EmbeddingError::NotConfigured(format!("failed to create HTTP client: {e}")))?;

        let mut endpoint = endpoint.into();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }

        Ok(Self {
            endpoint,
            api_key: api_key.into(),
            api_version: api_version.into(),
            model_version: model_version.into(),
            client,
        })
    }

    /// Build from the `[vision]` config section. `None` when no endpoint is set.
    pub fn from_config(config: &VisionConfig) -> Result<Option<Self>, EmbeddingError> {
        if config.endpoint.is_empty() {
            return Ok(None);
        }
        let api_key = config.api_key.clone().ok_or_else(|| {
            EmbeddingError::NotConfigured(
                "vision.endpoint is set but no key: set vision.api_key or SOURCEWELL_VISION_KEY".into(),
            )
        })?;
        Self::new(
            &config.endpoint,
            api_key,
            &config.api_version,
            &config.model_version,
        )
        .map(Some)
    }

    fn url(&self) -> String {
        format!("{}computervision/retrieval:vectorizeText", self.endpoint)
    }

    /// Vectorize query text into the image embedding space.
    pub async fn vectorize_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        debug!(chars = text.len(), "Vectorizing query for image search");

        let response = self
            .client
            .post(self.url())
            .query(&[
                ("api-version", self.api_version.as_str()),
                ("modelVersion", self.model_version.as_str()),
            ])
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| EmbeddingError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            error!(status, body = %body, "Image vectorizer returned error");
            return Err(EmbeddingError::Endpoint {
                status_code: status,
                message: body,
            });
        }

        let parsed: VectorizeResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Malformed(e.to_string()))?;
        Ok(parsed.vector)
    }
}

#[derive(Debug, Deserialize)]
struct VectorizeResponse {
    vector: Vec<f32>,
}

/// A text embedding service plus an optional image vectorizer.
pub struct CombinedEmbeddings {
    text: Arc<dyn EmbeddingService>,
    image: Option<VisionVectorizer>,
}

impl CombinedEmbeddings {
    pub fn new(text: Arc<dyn EmbeddingService>, image: Option<VisionVectorizer>) -> Self {
        Self { text, image }
    }
}

#[async_trait]
impl EmbeddingService for CombinedEmbeddings {
    async fn embed_text(&self, text: &str, model: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.text.embed_text(text, model).await
    }

    async fn embed_image_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        match &self.image {
            Some(v) => v.vectorize_text(text).await,
            None => Err(EmbeddingError::NotConfigured(
                "no image vectorization endpoint configured".into(),
            )),
        }
    }
}
