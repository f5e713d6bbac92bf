//! In-memory index for tests and local wiring checks.
//!
//! It does no ranking and no filter evaluation: every search answers with
//! the stored records, truncated to `top`, and the request is kept so tests
//! can assert on the query, filter and vector queries that were sent.

use async_trait::async_trait;
use sourcewell_core::document::RawSearchResult;
use sourcewell_core::error::RetrievalError;
use sourcewell_core::index::{DocumentIndex, SearchRequest};
use std::sync::Mutex;
use tracing::debug;

/// An index that answers every search with the same stored records.
pub struct InMemoryIndex {
    records: Vec<RawSearchResult>,
    requests: Mutex<Vec<SearchRequest>>,
}

impl InMemoryIndex {
    pub fn new(records: Vec<RawSearchResult>) -> Self {
        Self {
            records,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentIndex for InMemoryIndex {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<RawSearchResult>, RetrievalError> {
        let results: Vec<RawSearchResult> =
            self.records.iter().take(request.top).cloned().collect();
        debug!(stored = self.records.len(), returned = results.len(), "In-memory search");
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        Ok(results)
    }
}
