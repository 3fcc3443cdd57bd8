//! Error types for chatgate.

use thiserror::Error;

/// Errors produced while admitting, answering or configuring a chat request.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The request carried no message text (or only whitespace).
    #[error("Please enter a message.")]
    EmptyMessage,

    /// The device already used its daily allowance.
    #[error("Daily request limit reached ({limit} per day). Please try again tomorrow.")]
    QuotaExceeded { limit: u32 },

    /// Any failure reported by the completion provider, stringified.
    #[error("OpenAI API error: {0}")]
    Upstream(String),

    /// The quota store could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for ChatError {
    fn from(err: rusqlite::Error) -> Self {
        ChatError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Config(err.to_string())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_message_embeds_detail() {
        let err = ChatError::Upstream("rate limit exceeded".into());
        assert_eq!(err.to_string(), "OpenAI API error: rate limit exceeded");
    }

    #[test]
    fn test_quota_message_mentions_limit() {
        let err = ChatError::QuotaExceeded { limit: 10 };
        assert!(err.to_string().contains("10 per day"));
    }

    #[test]
    fn test_rusqlite_error_maps_to_storage() {
        let err: ChatError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, ChatError::Storage(_)));
    }
}
