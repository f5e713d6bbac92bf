//! Shared test helpers: scripted collaborators.

use async_trait::async_trait;
use sourcewell_core::blob::{BlobStore, image_blob_name};
use sourcewell_core::document::{Caption, RawSearchResult};
use sourcewell_core::embedding::EmbeddingService;
use sourcewell_core::error::{BlobError, EmbeddingError, ProviderError, RetrievalError};
use sourcewell_core::index::{DocumentIndex, SearchRequest};
use sourcewell_core::provider::{
    ChatCompletion, ChatModel, ChatRequest, ChunkReceiver, FunctionCall, StreamChunk,
};
use std::collections::HashMap;
use std::sync::Mutex;

/// A chat model that returns a sequence of scripted completions.
///
/// Each call to `complete` returns the next completion in the queue; each
/// call to `stream` sends the next scripted delta list. Panics if more
/// calls are made than responses provided.
pub struct SequentialMockModel {
    responses: Mutex<Vec<ChatCompletion>>,
    streams: Mutex<Vec<Vec<String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl SequentialMockModel {
    pub fn new(responses: Vec<ChatCompletion>) -> Self {
        Self {
            responses: Mutex::new(responses),
            streams: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// One completion per text, in order.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| make_completion(t)).collect())
    }

    /// Script the deltas of the next `stream` call.
    pub fn with_stream(self, deltas: &[&str]) -> Self {
        self.streams
            .lock()
            .unwrap()
            .push(deltas.iter().map(|d| d.to_string()).collect());
        self
    }

    /// Every request received so far, `complete` and `stream` alike.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for SequentialMockModel {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            panic!(
                "SequentialMockModel: no more responses (call #{})",
                self.requests.lock().unwrap().len()
            );
        }
        Ok(responses.remove(0))
    }

    async fn stream(&self, request: ChatRequest) -> Result<ChunkReceiver, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let deltas = {
            let mut streams = self.streams.lock().unwrap();
            if streams.is_empty() {
                panic!("SequentialMockModel: no scripted stream left");
            }
            streams.remove(0)
        };

        let (tx, rx) = tokio::sync::mpsc::channel(deltas.len() + 1);
        for delta in deltas {
            let _ = tx
                .send(Ok(StreamChunk {
                    content: Some(delta),
                    done: false,
                    usage: None,
                }))
                .await;
        }
        let _ = tx
            .send(Ok(StreamChunk {
                content: None,
                done: true,
                usage: None,
            }))
            .await;
        Ok(rx)
    }
}

/// A plain text completion.
pub fn make_completion(text: &str) -> ChatCompletion {
    ChatCompletion::text("mock-model", text)
}

/// A completion that asks for `search_sources` with the given query.
pub fn make_function_call(search_query: &str) -> ChatCompletion {
    ChatCompletion {
        function_call: Some(FunctionCall {
            name: "search_sources".into(),
            arguments: serde_json::json!({ "search_query": search_query }).to_string(),
        }),
        finish_reason: Some("function_call".into()),
        ..make_completion("")
    }
}

/// An index that returns fixed results and records every request.
pub struct RecordingIndex {
    results: Vec<RawSearchResult>,
    requests: Mutex<Vec<SearchRequest>>,
    fail: bool,
}

impl RecordingIndex {
    pub fn new(results: Vec<RawSearchResult>) -> Self {
        Self {
            results,
            requests: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(vec![])
        }
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentIndex for RecordingIndex {
    fn name(&self) -> &str {
        "recording"
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<RawSearchResult>, RetrievalError> {
        let top = request.top;
        self.requests.lock().unwrap().push(request);
        if self.fail {
            return Err(RetrievalError::Unreachable("index offline".into()));
        }
        Ok(self.results.iter().take(top).cloned().collect())
    }
}

/// `n` results named `doc-{i}.pdf#page=1`, each with one caption.
pub fn sample_results(n: usize) -> Vec<RawSearchResult> {
    (0..n)
        .map(|i| RawSearchResult {
            id: Some(format!("id-{i}")),
            content: Some(format!("Content of doc {i}.\nSecond line.")),
            embedding: Some(vec![0.1, 0.2, 0.3]),
            sourcepage: Some(format!("doc-{i}.pdf#page=1")),
            sourcefile: Some(format!("doc-{i}.pdf")),
            captions: Some(vec![Caption {
                text: format!("Caption for doc {i}"),
                highlights: None,
            }]),
            score: Some(1.0 / (i as f64 + 1.0)),
            ..Default::default()
        })
        .collect()
}

/// Embeddings that return a fixed vector and count calls.
pub struct FixedEmbeddings {
    text_calls: Mutex<usize>,
    image_calls: Mutex<usize>,
    fail: bool,
}

impl FixedEmbeddings {
    pub fn new() -> Self {
        Self {
            text_calls: Mutex::new(0),
            image_calls: Mutex::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn text_calls(&self) -> usize {
        *self.text_calls.lock().unwrap()
    }

    pub fn image_calls(&self) -> usize {
        *self.image_calls.lock().unwrap()
    }
}

#[async_trait]
impl EmbeddingService for FixedEmbeddings {
    async fn embed_text(&self, _text: &str, _model: &str) -> Result<Vec<f32>, EmbeddingError> {
        *self.text_calls.lock().unwrap() += 1;
        if self.fail {
            return Err(EmbeddingError::Endpoint {
                status_code: 500,
                message: "boom".into(),
            });
        }
        Ok(vec![0.0023064255, -0.009327292, -0.0028842222])
    }

    async fn embed_image_query(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        *self.image_calls.lock().unwrap() += 1;
        Ok(vec![0.5, 0.5])
    }
}

/// A blob store over a map of blob name to base64 image.
#[derive(Default)]
pub struct MapBlobStore {
    images: HashMap<String, String>,
}

impl MapBlobStore {
    pub fn with_image(mut self, blob_name: &str, base64: &str) -> Self {
        self.images.insert(blob_name.into(), base64.into());
        self
    }
}

#[async_trait]
impl BlobStore for MapBlobStore {
    async fn fetch_image(&self, source_page: &str) -> Result<Option<String>, BlobError> {
        let name = image_blob_name(source_page);
        self.images
            .get(&name)
            .cloned()
            .map(Some)
            .ok_or(BlobError::NotFound(name))
    }
}
