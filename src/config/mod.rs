//! Configuration for chatgate.
//!
//! Layering, later wins: built-in defaults, an optional JSON file
//! (`~/.chatgate/config.json` or `--config`), then environment variables
//! (a `.env` file is honoured via `dotenvy`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::DEFAULT_TTL;
use crate::error::{ChatError, Result};
use crate::providers::openai::{DEFAULT_OPENAI_MODEL, OPENAI_API_BASE};
use crate::quota::{QuotaStore, DEFAULT_DAILY_LIMIT};

/// Default system prompt sent ahead of every user message.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly and humorous counseling chatbot.";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub quota: QuotaConfig,
    pub cache: CacheConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (default: 0.0.0.0).
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

/// Completion provider settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// API key; usually supplied through `OPENAI_API_KEY`.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub system_prompt: String,
    /// Whole-request timeout for the provider call.
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: OPENAI_API_BASE.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            max_tokens: 150,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            timeout_secs: 60,
        }
    }
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Per-device quota settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// When false, no counters are kept and requests are never refused for quota.
    pub enabled: bool,
    pub daily_limit: u32,
    /// SQLite file; defaults to `~/.chatgate/quota.db`.
    pub db_path: Option<PathBuf>,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_limit: DEFAULT_DAILY_LIMIT,
            db_path: None,
        }
    }
}

impl QuotaConfig {
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(QuotaStore::default_path)
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: DEFAULT_TTL.as_secs(),
        }
    }
}

impl CacheConfig {
    /// Effective TTL; zero when caching is disabled.
    pub fn ttl(&self) -> std::time::Duration {
        if self.enabled {
            std::time::Duration::from_secs(self.ttl_secs)
        } else {
            std::time::Duration::ZERO
        }
    }
}

impl Config {
    /// Default config file location: `~/.chatgate/config.json`.
    pub fn path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".chatgate")
            .join("config.json")
    }

    /// Load defaults, the config file and the environment.
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(p) => Self::load_from_path(p)?,
            None => {
                let default = Self::path();
                if default.exists() {
                    Self::load_from_path(&default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a JSON config file. Missing fields take their defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            ChatError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config = serde_json::from_str(&data).map_err(|e| {
            ChatError::Config(format!("invalid config {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Overlay environment variables read through `lookup`.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.upstream.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.upstream.base_url = url;
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.upstream.model = model;
        }
        if let Some(bind) = lookup("CHATGATE_BIND") {
            self.server.bind = bind;
        }
        if let Some(port) = lookup("CHATGATE_PORT") {
            self.server.port = parse_var("CHATGATE_PORT", &port)?;
        }
        if let Some(path) = lookup("CHATGATE_DB_PATH") {
            self.quota.db_path = Some(PathBuf::from(path));
        }
        if let Some(limit) = lookup("CHATGATE_DAILY_LIMIT") {
            self.quota.daily_limit = parse_var("CHATGATE_DAILY_LIMIT", &limit)?;
        }
        if let Some(enabled) = lookup("CHATGATE_QUOTA_ENABLED") {
            self.quota.enabled = parse_var("CHATGATE_QUOTA_ENABLED", &enabled)?;
        }
        if let Some(ttl) = lookup("CHATGATE_CACHE_TTL_SECS") {
            self.cache.ttl_secs = parse_var("CHATGATE_CACHE_TTL_SECS", &ttl)?;
        }
        Ok(())
    }

    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self
            .upstream
            .api_key
            .as_deref()
            .map_or(true, |k| k.trim().is_empty())
        {
            return Err(ChatError::Config(
                "OPENAI_API_KEY is not set (environment, .env or config file)".into(),
            ));
        }
        if self.quota.enabled && self.quota.daily_limit == 0 {
            return Err(ChatError::Config("quota.daily_limit must be at least 1".into()));
        }
        if self.upstream.max_tokens == 0 {
            return Err(ChatError::Config("upstream.max_tokens must be at least 1".into()));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ChatError::Config(format!("{} has an invalid value: {:?}", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.server.bind, "0.0.0.0");
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.upstream.model, "gpt-3.5-turbo");
        assert_eq!(cfg.upstream.max_tokens, 150);
        assert!(cfg.upstream.api_key.is_none());
        assert!(cfg.quota.enabled);
        assert_eq!(cfg.quota.daily_limit, 10);
        assert!(cfg.cache.enabled);
        assert_eq!(cfg.cache.ttl_secs, 60);
    }

    #[test]
    fn test_config_deserialize_partial() {
        let json = r#"{"server": {"port": 8080}, "quota": {"daily_limit": 3}}"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.bind, "0.0.0.0"); // default
        assert_eq!(cfg.quota.daily_limit, 3);
        assert!(cfg.quota.enabled); // default
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = Config::default();
        cfg.apply_env_from(env(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MODEL", "gpt-4o-mini"),
            ("CHATGATE_PORT", "9000"),
            ("CHATGATE_DAILY_LIMIT", "25"),
            ("CHATGATE_QUOTA_ENABLED", "false"),
            ("CHATGATE_CACHE_TTL_SECS", "5"),
            ("CHATGATE_DB_PATH", "/tmp/q.db"),
        ]))
        .unwrap();
        assert_eq!(cfg.upstream.api_key.as_deref(), Some("sk-test"));
        assert_eq!(cfg.upstream.model, "gpt-4o-mini");
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.quota.daily_limit, 25);
        assert!(!cfg.quota.enabled);
        assert_eq!(cfg.cache.ttl_secs, 5);
        assert_eq!(cfg.quota.resolved_db_path(), PathBuf::from("/tmp/q.db"));
    }

    #[test]
    fn test_env_invalid_number_is_config_error() {
        let mut cfg = Config::default();
        let err = cfg
            .apply_env_from(env(&[("CHATGATE_PORT", "not-a-port")]))
            .unwrap_err();
        assert!(matches!(err, ChatError::Config(ref m) if m.contains("CHATGATE_PORT")));
    }

    #[test]
    fn test_validate_requires_api_key() {
        let cfg = Config::default();
        assert!(matches!(cfg.validate(), Err(ChatError::Config(_))));

        let mut cfg = Config::default();
        cfg.upstream.api_key = Some("sk-test".into());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        let mut cfg = Config::default();
        cfg.upstream.api_key = Some("sk-test".into());
        cfg.quota.daily_limit = 0;
        assert!(cfg.validate().is_err());
        cfg.quota.enabled = false;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_cache_ttl_zero_when_disabled() {
        let cfg = CacheConfig {
            enabled: false,
            ttl_secs: 60,
        };
        assert!(cfg.ttl().is_zero());
    }

    #[test]
    fn test_load_from_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"upstream": {"max_tokens": 300}}"#).unwrap();
        let cfg = Config::load_from_path(&path).unwrap();
        assert_eq!(cfg.upstream.max_tokens, 300);
        assert_eq!(cfg.upstream.model, "gpt-3.5-turbo");
    }

    #[test]
    fn test_load_from_missing_path_fails() {
        let tmp = TempDir::new().unwrap();
        let err = Config::load_from_path(&tmp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));
    }

    #[test]
    fn test_upstream_debug_redacts_key() {
        let cfg = UpstreamConfig {
            api_key: Some("sk-secret".into()),
            ..UpstreamConfig::default()
        };
        let debug = format!("{:?}", cfg);
        assert!(!debug.contains("sk-secret"));
    }
}
