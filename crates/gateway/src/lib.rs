//! HTTP gateway for sourcewell.
//!
//! Exposes the chat and ask approaches over JSON, plus server-sent events
//! for streamed chat answers.
//!
//! Built on Axum.

pub mod api;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use sourcewell_approach::{
    ApproachSettings, AskApproach, ChatApproach, DocumentRetriever, counter_from_name,
};
use sourcewell_config::{AppConfig, GatewayConfig};
use sourcewell_core::blob::BlobStore;
use sourcewell_core::error::{Error, Result};
use sourcewell_core::index::DocumentIndex;
use sourcewell_core::{ChatModel, EmbeddingService};
use sourcewell_providers::{CombinedEmbeddings, OpenAiCompatClient, VisionVectorizer};
use sourcewell_search::{HttpBlobStore, RestSearchIndex};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub chat: Arc<ChatApproach>,
    pub ask: Arc<AskApproach>,
}

pub type SharedState = Arc<GatewayState>;

/// Build the chat and ask approaches from configuration.
///
/// Collaborators are built once and shared between both approaches. A
/// missing `search.endpoint` is a configuration error.
pub fn build_state(config: &AppConfig) -> Result<GatewayState> {
    let settings = ApproachSettings::from_config(config)?;
    let capabilities = ApproachSettings::capabilities(config);

    let client = Arc::new(OpenAiCompatClient::from_config(&config.openai)?);
    let model: Arc<dyn ChatModel> = client.clone();
    let vectorizer = VisionVectorizer::from_config(&config.vision)?;
    let embeddings: Arc<dyn EmbeddingService> =
        Arc::new(CombinedEmbeddings::new(client, vectorizer));

    if config.search.endpoint.is_empty() {
        return Err(Error::Config {
            message: "search.endpoint must be set".into(),
        });
    }
    let index: Arc<dyn DocumentIndex> = Arc::new(RestSearchIndex::from_config(&config.search)?);

    let blobs: Option<Arc<dyn BlobStore>> = HttpBlobStore::from_config(&config.storage)?
        .map(|store| Arc::new(store) as Arc<dyn BlobStore>);
    if capabilities.vision.is_enabled() && blobs.is_none() {
        warn!("Vision is enabled without storage.base_url; prompts will carry no page images");
    }

    let counter = counter_from_name(&config.approach.tokenizer)?;

    let retriever =
        || DocumentRetriever::new(index.clone(), embeddings.clone(), &settings.embedding_model);
    let (chat_retriever, ask_retriever) = (retriever(), retriever());

    let mut chat = ChatApproach::new(model.clone(), chat_retriever, counter, settings.clone())
        .with_capabilities(capabilities);
    let mut ask = AskApproach::new(model, ask_retriever, settings).with_capabilities(capabilities);
    if let Some(blobs) = blobs {
        chat = chat.with_blob_store(blobs.clone());
        ask = ask.with_blob_store(blobs);
    }

    info!(
        index = %index.name(),
        chat_model = %config.openai.chat_model,
        vision = capabilities.vision.is_enabled(),
        streaming = capabilities.streaming,
        "Approaches ready"
    );

    Ok(GatewayState {
        chat: Arc::new(chat),
        ask: Arc::new(ask),
    })
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(api::chat_handler))
        .route("/chat/stream", post(api::chat_stream_handler))
        .route("/ask", post(api::ask_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the router with the production layers: body size limit and CORS.
pub fn build_full_router(state: SharedState, config: &GatewayConfig) -> Router {
    build_router(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors_layer(&config.allowed_origins))
}

/// CORS for browser clients.
///
/// The identity headers are only allowed for explicitly listed origins. With
/// no list any origin may call the gateway, but browsers will not send
/// [`api::OID_HEADER`] or [`api::GROUPS_HEADER`] cross-origin. Either way the
/// gateway must sit behind the authenticating proxy that sets those headers.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let mut allow_headers = vec![header::CONTENT_TYPE];
    let allow_origin = if allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        allow_headers.push(HeaderName::from_static(api::OID_HEADER));
        allow_headers.push(HeaderName::from_static(api::GROUPS_HEADER));
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(allow_headers)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let state = Arc::new(build_state(&config)?);
    let app = build_full_router(state, &config.gateway);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use sourcewell_core::document::RawSearchResult;
    use sourcewell_core::error::{EmbeddingError, ProviderError, RetrievalError};
    use sourcewell_core::index::SearchRequest;
    use sourcewell_core::provider::{ChatCompletion, ChatRequest};
    use sourcewell_search::InMemoryIndex;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Replies with scripted texts in order.
    struct ScriptedModel {
        replies: Mutex<VecDeque<String>>,
    }

    impl ScriptedModel {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        fn name(&self) -> &str {
            "gateway_mock"
        }

        async fn complete(&self, request: ChatRequest) -> std::result::Result<ChatCompletion, ProviderError> {
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("ScriptedModel: no more replies");
            Ok(ChatCompletion::text(request.model, reply))
        }
    }

    struct UnitEmbeddings;

    #[async_trait]
    impl EmbeddingService for UnitEmbeddings {
        async fn embed_text(&self, _text: &str, _model: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            Ok(vec![1.0, 0.0])
        }
    }

    struct DownIndex;

    #[async_trait]
    impl DocumentIndex for DownIndex {
        fn name(&self) -> &str {
            "down"
        }

        async fn search(&self, _request: SearchRequest) -> std::result::Result<Vec<RawSearchResult>, RetrievalError> {
            Err(RetrievalError::Unreachable("connection refused".into()))
        }
    }

    fn documents() -> Vec<RawSearchResult> {
        ["alpha", "beta"]
            .iter()
            .map(|id| RawSearchResult {
                id: Some(id.to_string()),
                content: Some(format!("The {id} fund returned 4% this year.")),
                embedding: Some(vec![1.0, 0.0]),
                sourcepage: Some(format!("{id}.pdf#page=2")),
                sourcefile: Some(format!("{id}.pdf")),
                ..Default::default()
            })
            .collect()
    }

    fn state_with(replies: &[&str], index: Arc<dyn DocumentIndex>) -> SharedState {
        let model: Arc<dyn ChatModel> = Arc::new(ScriptedModel::new(replies));
        let embeddings: Arc<dyn EmbeddingService> = Arc::new(UnitEmbeddings);
        let settings = ApproachSettings::default();
        let retriever = || DocumentRetriever::new(index.clone(), embeddings.clone(), "text-embedding-ada-002");
        Arc::new(GatewayState {
            chat: Arc::new(ChatApproach::new(
                model.clone(),
                retriever(),
                Arc::new(sourcewell_approach::HeuristicCounter),
                settings.clone(),
            )),
            ask: Arc::new(AskApproach::new(model, retriever(), settings.clone())),
        })
    }

    fn test_state(replies: &[&str]) -> SharedState {
        state_with(replies, Arc::new(InMemoryIndex::new(documents())))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_state(&[]));

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn chat_returns_answer_and_thoughts() {
        let index = Arc::new(InMemoryIndex::new(documents()));
        let app = build_router(state_with(
            &["alpha fund", "Alpha returned 4% [alpha.pdf#page=2]."],
            index.clone(),
        ));

        let response = app
            .oneshot(post_json(
                "/chat",
                serde_json::json!({
                    "messages": [{"role": "user", "content": "How did the alpha fund do?"}],
                    "context": {"overrides": {"retrieval_mode": "text", "top": 1}}
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["answer"], "Alpha returned 4% [alpha.pdf#page=2].");
        assert_eq!(json["thoughts"].as_array().unwrap().len(), 3);
        assert_eq!(json["data_points"]["text"][0], "alpha.pdf#page=2: The alpha fund returned 4% this year.");
        assert_eq!(json["data_points"]["text"].as_array().unwrap().len(), 1);

        let requests = index.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].query_text.as_deref(), Some("alpha fund"));
        assert_eq!(requests[0].top, 1);
        assert!(requests[0].vector_queries.is_empty());
    }

    #[tokio::test]
    async fn ask_returns_answer() {
        let app = build_router(test_state(&["Beta returned 4%."]));

        let response = app
            .oneshot(post_json(
                "/ask",
                serde_json::json!({"question": "beta fund?", "context": {"overrides": {"retrieval_mode": "text"}}}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["answer"], "Beta returned 4%.");
    }

    #[tokio::test]
    async fn unknown_override_is_bad_request() {
        let app = build_router(test_state(&[]));

        let response = app
            .oneshot(post_json(
                "/ask",
                serde_json::json!({"question": "q", "context": {"overrides": {"topp": 2}}}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn chat_without_user_turn_is_bad_request() {
        let app = build_router(test_state(&[]));

        let response = app
            .oneshot(post_json("/chat", serde_json::json!({"messages": []})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn index_failure_is_bad_gateway() {
        let app = build_router(state_with(&[], Arc::new(DownIndex)));

        let response = app
            .oneshot(post_json("/ask", serde_json::json!({"question": "anything"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn chat_stream_emits_context_delta_done() {
        let app = build_router(test_state(&["alpha", "Streamed answer."]));

        let response = app
            .oneshot(post_json(
                "/chat/stream",
                serde_json::json!({
                    "messages": [{"role": "user", "content": "alpha?"}],
                    "context": {"overrides": {"retrieval_mode": "text"}}
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        assert!(content_type.contains("text/event-stream"));

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8_lossy(&body);
        let context = text.find("event: context").unwrap();
        let delta = text.find("event: delta").unwrap();
        let done = text.find("event: done").unwrap();
        assert!(context < delta && delta < done);
        assert!(text.contains("Streamed answer."));
    }

    #[tokio::test]
    async fn full_router_answers_cors_preflight() {
        let app = build_full_router(test_state(&[]), &GatewayConfig::default());

        let req = Request::builder()
            .method("OPTIONS")
            .uri("/chat")
            .header("origin", "http://localhost:5173")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }

    async fn preflight_allowed_headers(config: &GatewayConfig) -> String {
        let app = build_full_router(test_state(&[]), config);
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/chat")
            .header("origin", "http://localhost:5173")
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "content-type,x-sourcewell-oid")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        response
            .headers()
            .get("access-control-allow-headers")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_lowercase()
    }

    #[tokio::test]
    async fn any_origin_cannot_send_identity_headers() {
        let allowed = preflight_allowed_headers(&GatewayConfig::default()).await;
        assert!(allowed.contains("content-type"));
        assert!(!allowed.contains(api::OID_HEADER));
        assert!(!allowed.contains(api::GROUPS_HEADER));
    }

    #[tokio::test]
    async fn listed_origin_may_send_identity_headers() {
        let config = GatewayConfig {
            allowed_origins: vec!["http://localhost:5173".into()],
            ..Default::default()
        };
        let allowed = preflight_allowed_headers(&config).await;
        assert!(allowed.contains(api::OID_HEADER));
        assert!(allowed.contains(api::GROUPS_HEADER));
    }

    #[test]
    fn missing_search_endpoint_is_config_error() {
        let mut config = AppConfig::default();
        config.openai.api_key = Some("sk-test".into());
        config.search.endpoint.clear();

        let err = build_state(&config).err().unwrap();
        assert!(matches!(err, Error::Config { ref message } if message.contains("search.endpoint")));
    }
}
