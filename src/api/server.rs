//! Axum HTTP server for chatgate.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::chat::ChatService;
use crate::config::ServerConfig;
use crate::error::Result;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared state for all handlers.
pub struct AppState {
    pub chat: ChatService,
}

impl AppState {
    pub fn new(chat: ChatService) -> Self {
        Self { chat }
    }
}

/// Build the axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .route("/", get(super::routes::home::index))
        .route("/chat", post(super::routes::chat::post_chat))
        .route("/health", get(super::routes::health::get_health))
        // Oversized payloads are refused before any JSON parsing.
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}

/// Serve until `shutdown_rx` flips to `true` (or its sender is dropped).
pub async fn start_server(
    config: &ServerConfig,
    state: AppState,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    let app = build_router(state);
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("chatgate listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
            tracing::info!("Shutting down HTTP server");
        })
        .await?;
    Ok(())
}

/// State with an in-memory quota store and a provider that echoes.
#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    use crate::cache::ResponseCache;
    use crate::providers::MockCompletionProvider;
    use crate::quota::{AdmissionController, QuotaStore, DEFAULT_DAILY_LIMIT};

    let mut mock = MockCompletionProvider::new();
    mock.expect_complete()
        .returning(|req| Ok(format!("reply to {}", req.user_message)));
    let store = QuotaStore::open_in_memory(DEFAULT_DAILY_LIMIT).expect("in-memory store");
    AppState::new(ChatService::new(
        AdmissionController::new(Arc::new(store)),
        ResponseCache::default(),
        Arc::new(mock),
    ))
}
