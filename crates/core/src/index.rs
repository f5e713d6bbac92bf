//! DocumentIndex trait: the search index the approaches retrieve from.
//!
//! The index supports keyword search, vector similarity over one or more
//! vector fields, and optional semantic reranking with extractive captions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::document::RawSearchResult;
use crate::error::RetrievalError;

/// Nearest neighbours requested per vector query.
pub const DEFAULT_VECTOR_K: usize = 50;

/// Which stored vector field a vector query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VectorField {
    #[serde(rename = "embedding")]
    Embedding,
    #[serde(rename = "imageEmbedding")]
    ImageEmbedding,
}

impl VectorField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedding => "embedding",
            Self::ImageEmbedding => "imageEmbedding",
        }
    }
}

/// A vector similarity query against one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    pub k: usize,
    pub field: VectorField,
}

impl VectorQuery {
    pub fn new(vector: Vec<f32>, field: VectorField) -> Self {
        Self {
            vector,
            k: DEFAULT_VECTOR_K,
            field,
        }
    }
}

/// A single search call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Maximum number of results
    pub top: usize,
    /// Keyword query; `None` for pure vector retrieval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_text: Option<String>,
    /// Filter expression; `None` means no restriction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vector_queries: Vec<VectorQuery>,
    #[serde(default)]
    pub use_semantic_ranker: bool,
    #[serde(default)]
    pub use_semantic_captions: bool,
}

/// The core DocumentIndex trait.
///
/// Implementations: a REST search service client and an in-memory fixture
/// for tests.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// The index name (e.g., "gptkbindex", "in_memory").
    fn name(&self) -> &str;

    /// Run a search. Returns at most `request.top` records, best first.
    async fn search(&self, request: SearchRequest) -> Result<Vec<RawSearchResult>, RetrievalError>;
}
