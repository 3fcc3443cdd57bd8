//! `POST /chat` — the only stateful endpoint.

use axum::extract::rejection::JsonRejection;
use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::server::AppState;
use crate::error::ChatError;

/// Request body. Both fields are optional at the wire level; a missing
/// message is answered with 400, a missing device id uses the shared bucket.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChatBody {
    pub message: Option<String>,
    pub device_id: Option<String>,
}

/// POST /chat — admit, answer from cache or provider, and report the outcome.
pub async fn post_chat(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            // Oversized bodies keep their 413; every other body problem is a 400.
            let status = match rejection.status() {
                StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            };
            return (
                status,
                Json(json!({ "error": format!("Invalid request body: {}", rejection.body_text()) })),
            );
        }
    };

    let message = body.message.unwrap_or_default();
    match state
        .chat
        .handle(body.device_id.as_deref(), &message, query.as_deref())
        .await
    {
        Ok(reply) => (StatusCode::OK, Json(json!({ "response": reply.response }))),
        Err(err) => error_response(&err),
    }
}

/// Map a chat error onto exactly one status and `{"error": ...}` body.
pub fn error_response(err: &ChatError) -> (StatusCode, Json<Value>) {
    let (status, message) = match err {
        ChatError::EmptyMessage => (StatusCode::BAD_REQUEST, err.to_string()),
        ChatError::QuotaExceeded { .. } => (StatusCode::TOO_MANY_REQUESTS, err.to_string()),
        ChatError::Upstream(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        // Storage details stay in the logs.
        ChatError::Storage(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Quota store unavailable".to_string(),
        ),
        ChatError::Config(_) | ChatError::Io(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        ),
    };
    (status, Json(json!({ "error": message })))
}
