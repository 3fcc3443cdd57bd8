//! `chatgate serve` — run the HTTP gateway until Ctrl+C or SIGTERM.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};

use chatgate::api::server::{start_server, AppState};
use chatgate::config::Config;
use chatgate::health::{start_periodic_usage_flush, UsageMetrics};
use chatgate::providers::OpenAiProvider;
use chatgate::ChatService;

/// Start the server with optional bind/port overrides.
pub(crate) async fn cmd_serve(
    mut config: Config,
    bind: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate().context("Invalid configuration")?;

    let provider = OpenAiProvider::from_config(&config.upstream)
        .context("Failed to create completion provider")?;
    info!(model = provider.model(), "Using OpenAI-compatible provider");

    let metrics = Arc::new(UsageMetrics::new());
    let chat = ChatService::from_config(&config, Arc::new(provider))
        .context("Failed to initialise chat service")?
        .with_metrics(Arc::clone(&metrics));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let flush = start_periodic_usage_flush(metrics, shutdown_rx.clone());

    let signal = tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    println!("Press Ctrl+C to stop.");
    let served = start_server(&config.server, AppState::new(chat), shutdown_rx).await;
    // Dropping the sender also stops the flush task if the server failed early.
    signal.abort();

    if let Err(e) = flush.await {
        warn!("Usage flush task ended abnormally: {e}");
    }
    served.map_err(|e| anyhow::anyhow!("HTTP server error: {e}"))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
