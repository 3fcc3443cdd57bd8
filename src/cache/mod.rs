//! Chat reply caching with TTL expiry.

pub mod response_cache;

pub use response_cache::{CacheLookup, CacheStats, ResponseCache, DEFAULT_TTL};
