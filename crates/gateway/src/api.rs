//! Request handlers for the chat and ask endpoints.
//!
//! Bodies follow the shape web clients already send:
//!
//! ```json
//! { "messages": [{"role": "user", "content": "..."}], "context": { "overrides": { "top": 3 } } }
//! { "question": "...", "context": { "overrides": {} } }
//! ```
//!
//! Caller identity comes from the [`OID_HEADER`] and [`GROUPS_HEADER`]
//! headers. The gateway does no authentication and trusts them as they
//! arrive, so it must only be reachable through an authenticating proxy
//! that strips these headers from client requests and sets them itself.

use std::convert::Infallible;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};

use sourcewell_approach::ChatResponse;
use sourcewell_core::error::Error;
use sourcewell_core::message::Message;
use sourcewell_core::overrides::{AuthClaims, RequestOverrides};

use crate::SharedState;

/// Header carrying the caller's object id.
pub const OID_HEADER: &str = "x-sourcewell-oid";
/// Header carrying the caller's group ids, comma separated.
pub const GROUPS_HEADER: &str = "x-sourcewell-groups";

#[derive(Debug, Default, Deserialize)]
pub struct RequestContext {
    #[serde(default)]
    pub overrides: RequestOverrides,
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub context: RequestContext,
}

#[derive(Debug, Deserialize)]
pub struct AskBody {
    pub question: String,
    #[serde(default)]
    pub context: RequestContext,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// HTTP status for a pipeline error.
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        e if e.is_upstream() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: Error) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        error!(status = status.as_u16(), error = %err, "Request failed");
    } else {
        warn!(error = %err, "Request rejected");
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// Malformed JSON, missing fields and unknown override keys are all 400s.
fn rejection_response(rejection: JsonRejection) -> ApiError {
    warn!(error = %rejection.body_text(), "Malformed request body");
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: rejection.body_text(),
        }),
    )
}

/// Read caller claims from the identity headers. Missing headers mean an
/// anonymous caller.
pub fn claims_from_headers(headers: &HeaderMap) -> AuthClaims {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let oid = header(OID_HEADER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);
    let groups = header(GROUPS_HEADER)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    AuthClaims::new(oid, groups)
}

/// POST /chat
pub async fn chat_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    payload: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(body) = payload.map_err(rejection_response)?;
    let claims = claims_from_headers(&headers);
    info!(turns = body.messages.len(), "chat request");

    state
        .chat
        .run(&body.messages, &body.context.overrides, &claims)
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /chat/stream
///
/// Errors before the first event (bad request, rewrite or retrieval
/// failure) are returned as plain JSON errors. Once streaming has begun a
/// failure arrives as an `error` event.
pub async fn chat_stream_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    payload: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let Json(body) = payload.map_err(rejection_response)?;
    let claims = claims_from_headers(&headers);
    info!(turns = body.messages.len(), "chat/stream SSE request");

    let rx = state
        .chat
        .run_stream(&body.messages, &body.context.overrides, &claims)
        .await
        .map_err(error_response)?;

    let stream = ReceiverStream::new(rx).map(|event| {
        let (event_type, data) = sse_frame(event.event_type(), &event);
        Ok(SseEvent::default().event(event_type).data(data))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Event name and JSON data for one SSE frame.
///
/// A payload that fails to serialize is sent as an `error` frame rather than
/// an empty `data:` line.
fn sse_frame<T: Serialize>(event_type: &'static str, payload: &T) -> (&'static str, String) {
    match serde_json::to_string(payload) {
        Ok(data) => (event_type, data),
        Err(e) => {
            error!(event = event_type, error = %e, "Failed to serialize stream event");
            let data = serde_json::json!({
                "type": "error",
                "message": format!("failed to encode {event_type} event: {e}"),
            });
            ("error", data.to_string())
        }
    }
}

/// POST /ask
pub async fn ask_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    payload: Result<Json<AskBody>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(body) = payload.map_err(rejection_response)?;
    let claims = claims_from_headers(&headers);
    info!(question_len = body.question.len(), "ask request");

    state
        .ask
        .run(&body.question, &body.context.overrides, &claims)
        .await
        .map(Json)
        .map_err(error_response)
}
