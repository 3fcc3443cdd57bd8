//! chatgate: a small HTTP gateway in front of an LLM chat-completion API.
//!
//! Each `POST /chat` is checked against a per-device daily quota, answered
//! from a short-lived response cache when possible, and otherwise forwarded
//! to the configured [`providers::CompletionProvider`].

pub mod api;
pub mod cache;
pub mod chat;
pub mod clock;
pub mod config;
pub mod error;
pub mod health;
pub mod providers;
pub mod quota;

pub use chat::{ChatReply, ChatService};
pub use config::Config;
pub use error::{ChatError, Result};
