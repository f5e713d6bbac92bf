//! DocumentRetriever: embeds the query as needed, runs one index search,
//! and normalizes the results into [`Document`]s.

use std::sync::Arc;
use sourcewell_core::document::Document;
use sourcewell_core::embedding::EmbeddingService;
use sourcewell_core::index::{DocumentIndex, SearchRequest, VectorField, VectorQuery};
use sourcewell_core::overrides::RequestOverrides;
use tracing::debug;

/// What a retriever call sent and got back.
#[derive(Debug, Clone)]
pub struct Retrieval {
    /// The keyword query sent, `None` in vectors-only mode
    pub query_text: Option<String>,
    /// Vector fields that were queried
    pub vector_fields: Vec<VectorField>,
    /// Whether captions were requested from the index
    pub use_semantic_captions: bool,
    pub documents: Vec<Document>,
}

impl Retrieval {
    /// The `Sources:` lines: one `"<source page>: <text>"` per document.
    pub fn citation_lines(&self) -> Vec<String> {
        self.documents
            .iter()
            .map(|d| d.citation_line(self.use_semantic_captions))
            .collect()
    }

    /// Result records for the thought trace, embeddings abbreviated.
    pub fn serialized_results(&self) -> Vec<serde_json::Value> {
        self.documents
            .iter()
            .map(Document::serialize_for_results)
            .collect()
    }
}

pub struct DocumentRetriever {
    index: Arc<dyn DocumentIndex>,
    embeddings: Arc<dyn EmbeddingService>,
    embedding_model: String,
}

impl DocumentRetriever {
    pub fn new(
        index: Arc<dyn DocumentIndex>,
        embeddings: Arc<dyn EmbeddingService>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            index,
            embeddings,
            embedding_model: embedding_model.into(),
        }
    }

    /// Search for `query`.
    ///
    /// `vision` decides the default vector fields when the request doesn't
    /// name any. Zero matches is an empty result, not an error.
    pub async fn retrieve(
        &self,
        query: &str,
        overrides: &RequestOverrides,
        filter: Option<String>,
        vision: bool,
    ) -> sourcewell_core::Result<Retrieval> {
        let vector_fields = overrides.resolved_vector_fields(vision);

        let mut vector_queries = Vec::with_capacity(vector_fields.len());
        for field in &vector_fields {
            let vector = match field {
                VectorField::Embedding => {
                    self.embeddings.embed_text(query, &self.embedding_model).await?
                }
                VectorField::ImageEmbedding => self.embeddings.embed_image_query(query).await?,
            };
            vector_queries.push(VectorQuery::new(vector, *field));
        }

        let query_text = overrides
            .retrieval_mode
            .has_text()
            .then(|| query.to_string());
        let use_semantic_captions = overrides.use_semantic_captions();

        let request = SearchRequest {
            top: overrides.top,
            query_text: query_text.clone(),
            filter,
            vector_queries,
            use_semantic_ranker: overrides.use_semantic_ranker(),
            use_semantic_captions,
        };

        debug!(
            index = %self.index.name(),
            mode = ?overrides.retrieval_mode,
            fields = ?vector_fields,
            filter = ?request.filter,
            "Retrieving documents"
        );

        let results = self.index.search(request).await?;
        let documents: Vec<Document> = results
            .into_iter()
            .take(overrides.top)
            .map(Document::from)
            .collect();

        debug!(count = documents.len(), "Documents retrieved");

        Ok(Retrieval {
            query_text,
            vector_fields,
            use_semantic_captions,
            documents,
        })
    }
}
