//! HTTP surface: router, shared state and handlers.

pub mod routes;
pub mod server;
