//! EmbeddingService trait: text and image-query vectorization.

use async_trait::async_trait;
use crate::error::EmbeddingError;

/// Turns query text into vectors comparable with the vectors stored in the
/// document index.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed text with the given embedding model (`embedding` field space).
    async fn embed_text(&self, text: &str, model: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed a text query into the image vector space (`imageEmbedding` field).
    ///
    /// Default implementation reports that image vectorization isn't configured.
    async fn embed_image_query(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::NotConfigured(
            "no image vectorization endpoint configured".into(),
        ))
    }
}
