//! Usage counters for the chat gateway.
//!
//! Provides:
//! - [`UsageMetrics`] for lock-free per-outcome counters
//! - [`start_periodic_usage_flush`] for periodic metric emission

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

const USAGE_FLUSH_INTERVAL_SECS: u64 = 60;

/// Lock-free counters, one per terminal state of a chat request.
#[derive(Debug, Default)]
pub struct UsageMetrics {
    /// Total chat requests received.
    pub requests: AtomicU64,
    /// Replies served (from cache or provider).
    pub replies: AtomicU64,
    /// Replies answered from the response cache.
    pub cache_hits: AtomicU64,
    /// Requests refused for an empty message.
    pub empty_rejections: AtomicU64,
    /// Requests refused because the device quota was exhausted.
    pub quota_rejections: AtomicU64,
    /// Provider failures.
    pub upstream_errors: AtomicU64,
    /// Quota store failures.
    pub storage_errors: AtomicU64,
}

/// Point-in-time copy of [`UsageMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub requests: u64,
    pub replies: u64,
    pub cache_hits: u64,
    pub empty_rejections: u64,
    pub quota_rejections: u64,
    pub upstream_errors: u64,
    pub storage_errors: u64,
}

impl UsageMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a successful reply; `cached` marks a cache hit.
    pub fn record_reply(&self, cached: bool) {
        self.replies.fetch_add(1, Ordering::Relaxed);
        if cached {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_empty_rejection(&self) {
        self.empty_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_quota_rejection(&self) {
        self.quota_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_error(&self) {
        self.upstream_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_storage_error(&self) {
        self.storage_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            replies: self.replies.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            empty_rejections: self.empty_rejections.load(Ordering::Relaxed),
            quota_rejections: self.quota_rejections.load(Ordering::Relaxed),
            upstream_errors: self.upstream_errors.load(Ordering::Relaxed),
            storage_errors: self.storage_errors.load(Ordering::Relaxed),
        }
    }

    /// Emit current counters as a structured log line.
    pub fn emit_usage(&self, reason: &str) {
        let s = self.snapshot();
        info!(
            event = "usage_summary",
            reason = reason,
            requests = s.requests,
            replies = s.replies,
            cache_hits = s.cache_hits,
            empty_rejections = s.empty_rejections,
            quota_rejections = s.quota_rejections,
            upstream_errors = s.upstream_errors,
            storage_errors = s.storage_errors,
            "Usage metrics"
        );
    }
}

/// Emit a usage summary every minute, and once more on shutdown.
pub fn start_periodic_usage_flush(
    metrics: Arc<UsageMetrics>,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(USAGE_FLUSH_INTERVAL_SECS));
        interval.tick().await; // skip first immediate tick

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    metrics.emit_usage("periodic");
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        metrics.emit_usage("shutdown");
                        break;
                    }
                }
            }
        }
    })
}
