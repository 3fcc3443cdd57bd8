//! Admission decisions for inbound chat requests.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use super::store::QuotaStore;
use crate::error::Result;

/// Outcome of admitting a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request may proceed to the cache and provider.
    Admitted,
    /// The message was missing or blank. Quota was not consulted.
    RejectedEmpty,
    /// The device already used its allowance for the day.
    RejectedQuotaExceeded,
}

/// Validates input and spends quota.
///
/// With no store attached, quota tracking is off and every non-empty
/// message is admitted.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    store: Option<Arc<QuotaStore>>,
}

impl AdmissionController {
    pub fn new(store: Arc<QuotaStore>) -> Self {
        Self { store: Some(store) }
    }

    /// Controller that never tracks quota.
    pub fn unlimited() -> Self {
        Self { store: None }
    }

    /// Daily limit enforced, or `None` when quota tracking is off.
    pub fn daily_limit(&self) -> Option<u32> {
        self.store.as_ref().map(|s| s.daily_limit())
    }

    /// Decide whether `device_id` may send `message` on `today`.
    ///
    /// Input is validated before the store is touched, so an empty message
    /// never costs quota. Storage failures are returned as errors.
    pub fn admit(&self, device_id: &str, message: &str, today: NaiveDate) -> Result<Admission> {
        if message.trim().is_empty() {
            return Ok(Admission::RejectedEmpty);
        }

        let Some(store) = &self.store else {
            return Ok(Admission::Admitted);
        };

        if store.check_and_increment(device_id, today)? {
            Ok(Admission::Admitted)
        } else {
            info!(device_id, limit = store.daily_limit(), "Daily quota exhausted");
            Ok(Admission::RejectedQuotaExceeded)
        }
    }
}
