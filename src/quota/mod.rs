//! Per-device daily quota: durable counters and the admission decision.

pub mod admission;
pub mod store;

pub use admission::{Admission, AdmissionController};
pub use store::{DeviceUsage, QuotaStore, DEFAULT_DAILY_LIMIT};
