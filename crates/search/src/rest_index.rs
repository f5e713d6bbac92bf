//! REST client for a hosted search index.
//!
//! Sends `POST {endpoint}/indexes/{index}/docs/search?api-version=...`
//! with an `api-key` header and maps the JSON `value` array to
//! [`RawSearchResult`]s.

use async_trait::async_trait;
use serde::Deserialize;
use sourcewell_config::SearchConfig;
use sourcewell_core::document::RawSearchResult;
use sourcewell_core::error::RetrievalError;
use sourcewell_core::index::{DocumentIndex, SearchRequest};
use tracing::{debug, warn};

/// A [`DocumentIndex`] backed by a search service's REST API.
pub struct RestSearchIndex {
    endpoint: String,
    index: String,
    api_key: String,
    api_version: String,
    query_language: String,
    query_speller: String,
    semantic_configuration: String,
    client: reqwest::Client,
}

impl RestSearchIndex {
    /// Build from the `[search]` config section.
    pub fn from_config(config: &SearchConfig) -> Result<Self, RetrievalError> {
        if config.endpoint.is_empty() {
            return Err(RetrievalError::Unreachable("search.endpoint is not set".into()));
        }
        let api_key = config.api_key.clone().ok_or_else(|| {
            RetrievalError::Unreachable(
                "no search key: set search.api_key or SOURCEWELL_SEARCH_KEY".into(),
            )
        })?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| RetrievalError::Unreachable(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            index: config.index.clone(),
            api_key,
            api_version: config.api_version.clone(),
            query_language: config.query_language.clone(),
            query_speller: config.query_speller.clone(),
            semantic_configuration: config.semantic_configuration.clone(),
            client,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/indexes/{}/docs/search?api-version={}",
            self.endpoint, self.index, self.api_version
        )
    }

    /// The JSON body for a search call.
    fn request_body(&self, request: &SearchRequest) -> serde_json::Value {
        let mut body = serde_json::json!({ "top": request.top });

        if let Some(q) = &request.query_text {
            body["search"] = serde_json::json!(q);
        }
        if let Some(f) = &request.filter {
            body["filter"] = serde_json::json!(f);
        }
        if !request.vector_queries.is_empty() {
            body["vectors"] = request
                .vector_queries
                .iter()
                .map(|v| {
                    serde_json::json!({
                        "value": v.vector,
                        "k": v.k,
                        "fields": v.field.as_str(),
                    })
                })
                .collect();
        }
        if request.use_semantic_ranker {
            body["queryType"] = "semantic".into();
            body["queryLanguage"] = self.query_language.as_str().into();
            body["speller"] = self.query_speller.as_str().into();
            body["semanticConfiguration"] = self.semantic_configuration.as_str().into();
            if request.use_semantic_captions {
                body["captions"] = "extractive|highlight-false".into();
            }
        }

        body
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    value: Vec<RawSearchResult>,
}

#[async_trait]
impl DocumentIndex for RestSearchIndex {
    fn name(&self) -> &str {
        &self.index
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<RawSearchResult>, RetrievalError> {
        let body = self.request_body(&request);

        debug!(
            index = %self.index,
            top = request.top,
            text = request.query_text.is_some(),
            vectors = request.vector_queries.len(),
            "Sending search request"
        );

        let response = self
            .client
            .post(self.url())
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrievalError::Unreachable(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Search index returned error");
            return Err(RetrievalError::Index {
                status_code: status,
                message: error_body,
            });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Malformed(e.to_string()))?;

        let mut results = parsed.value;
        results.truncate(request.top);
        Ok(results)
    }
}
