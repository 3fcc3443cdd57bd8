//! Chat request orchestration.
//!
//! Every request walks the same path: validate input, spend quota, look up
//! the response cache, and only then call the completion provider. Quota is
//! always consulted before the cache, and the cache key includes the device
//! id, so no device can be served without spending its own quota.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::cache::ResponseCache;
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, DEFAULT_SYSTEM_PROMPT};
use crate::error::{ChatError, Result};
use crate::health::UsageMetrics;
use crate::providers::{CompletionProvider, CompletionRequest};
use crate::quota::{Admission, AdmissionController, QuotaStore, DEFAULT_DAILY_LIMIT};

/// Quota bucket shared by every caller that does not send a device id.
pub const DEFAULT_DEVICE_ID: &str = "unknown_device";

/// A successful reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub response: String,
    /// `true` when the reply came from the response cache.
    pub cached: bool,
}

/// Admission, caching and provider access behind one call.
pub struct ChatService {
    admission: AdmissionController,
    cache: ResponseCache,
    provider: Arc<dyn CompletionProvider>,
    clock: Arc<dyn Clock>,
    metrics: Arc<UsageMetrics>,
    system_prompt: String,
    max_tokens: u32,
}

impl ChatService {
    pub fn new(
        admission: AdmissionController,
        cache: ResponseCache,
        provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            admission,
            cache,
            provider,
            clock: Arc::new(SystemClock),
            metrics: Arc::new(UsageMetrics::new()),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: 150,
        }
    }

    /// Wire a service from configuration, opening the quota database if
    /// quota tracking is enabled.
    pub fn from_config(config: &Config, provider: Arc<dyn CompletionProvider>) -> Result<Self> {
        let admission = if config.quota.enabled {
            let store = QuotaStore::open(&config.quota.resolved_db_path(), config.quota.daily_limit)?;
            AdmissionController::new(Arc::new(store))
        } else {
            info!("Quota tracking disabled");
            AdmissionController::unlimited()
        };
        let cache = ResponseCache::new(config.cache.ttl());
        Ok(Self::new(admission, cache, provider)
            .with_prompt(&config.upstream.system_prompt, config.upstream.max_tokens))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<UsageMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_prompt(mut self, system_prompt: &str, max_tokens: u32) -> Self {
        self.system_prompt = system_prompt.to_string();
        self.max_tokens = max_tokens;
        self
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<UsageMetrics> {
        &self.metrics
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// Answer one chat message.
    ///
    /// `query` is the raw request query string; it is part of the cache key.
    pub async fn handle(
        &self,
        device_id: Option<&str>,
        message: &str,
        query: Option<&str>,
    ) -> Result<ChatReply> {
        self.metrics.record_request();
        let device_id = resolve_device_id(device_id);
        let admission = self
            .admission
            .admit(device_id, message, self.clock.today())
            .inspect_err(|e| {
                self.metrics.record_storage_error();
                error!(device_id, error = %e, "Quota store failure");
            })?;

        match admission {
            Admission::Admitted => {}
            Admission::RejectedEmpty => {
                self.metrics.record_empty_rejection();
                debug!(device_id, "Rejected empty message");
                return Err(ChatError::EmptyMessage);
            }
            Admission::RejectedQuotaExceeded => {
                self.metrics.record_quota_rejection();
                let limit = self.admission.daily_limit().unwrap_or(DEFAULT_DAILY_LIMIT);
                return Err(ChatError::QuotaExceeded { limit });
            }
        }

        let key = ResponseCache::cache_key(device_id, message, query);
        let request = CompletionRequest::new(&self.system_prompt, message, self.max_tokens);
        let provider = Arc::clone(&self.provider);

        let lookup = self
            .cache
            .get_or_compute(&key, self.clock.as_ref(), || async move {
                provider.complete(request).await
            })
            .await
            .inspect_err(|e| {
                self.metrics.record_upstream_error();
                warn!(device_id, error = %e, "Completion provider failed");
            })?;

        self.metrics.record_reply(lookup.hit);
        debug!(device_id, cached = lookup.hit, "Reply ready");
        Ok(ChatReply {
            response: lookup.value,
            cached: lookup.hit,
        })
    }
}

/// Blank or missing ids fall back to [`DEFAULT_DEVICE_ID`]; any other id is
/// used verbatim.
fn resolve_device_id(raw: Option<&str>) -> &str {
    match raw {
        Some(id) if !id.trim().is_empty() => id,
        _ => DEFAULT_DEVICE_ID,
    }
}
