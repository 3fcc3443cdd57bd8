//! Health endpoint.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::server::AppState;

/// GET /health — liveness plus cache and usage counters.
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "daily_limit": state.chat.admission().daily_limit(),
        "cache": state.chat.cache().stats(),
        "usage": state.chat.metrics().snapshot(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::server::test_state;

    #[tokio::test]
    async fn test_get_health_returns_ok() {
        let Json(body) = get_health(State(Arc::new(test_state()))).await;
        assert_eq!(body["status"], "ok");
        assert!(body["version"].is_string());
        assert_eq!(body["daily_limit"], 10);
        assert_eq!(body["cache"]["ttl_secs"], 60);
        assert_eq!(body["usage"]["requests"], 0);
    }
}
