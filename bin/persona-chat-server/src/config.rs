//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

use persona_chat_core::{OpenAiConfig, RateLimitConfig};

/// Runtime configuration for persona-chat-server.
///
/// Every field has a default so the server starts without any environment
/// variables set (completions will fail until `OPENAI_API_KEY` is provided).
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// sqlx SQLite URL for conversation history
    /// (default: `"sqlite://persona-chat.db?mode=rwc"`).  The special value
    /// `"memory:"` keeps history in process memory instead.
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Length of one rate-limit window.
    pub rate_limit_window: Duration,

    /// Requests allowed per client per window.
    pub rate_limit_max_requests: u32,

    /// Turns buffered for the persistence worker before new ones are dropped.
    pub persist_queue_capacity: usize,

    /// Comma-separated list of allowed CORS origins; `None` allows any.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI and the OpenAPI document.
    pub enable_swagger: bool,

    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub openai_temperature: f32,
}

impl Default for Config {
    fn default() -> Self {
        let openai = OpenAiConfig::default();
        let limits = RateLimitConfig::default();
        Self {
            bind_address: "0.0.0.0:3000".into(),
            database_url: "sqlite://persona-chat.db?mode=rwc".into(),
            log_level: "info".into(),
            log_json: false,
            rate_limit_window: limits.window,
            rate_limit_max_requests: limits.max_requests,
            persist_queue_capacity: 256,
            cors_allowed_origins: None,
            enable_swagger: true,
            openai_api_key: None,
            openai_base_url: openai.base_url,
            openai_model: openai.model,
            openai_temperature: openai.temperature,
        }
    }
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            bind_address: env_or("CHAT_BIND", &d.bind_address),
            database_url: env_or("CHAT_DATABASE_URL", &d.database_url),
            log_level: env_or("CHAT_LOG", &d.log_level),
            log_json: parse_bool("CHAT_LOG_JSON", d.log_json),
            rate_limit_window: Duration::from_secs(parse_env(
                "CHAT_RATE_LIMIT_WINDOW_SECS",
                d.rate_limit_window.as_secs(),
            )),
            rate_limit_max_requests: parse_env("CHAT_RATE_LIMIT_MAX_REQUESTS", d.rate_limit_max_requests),
            persist_queue_capacity: parse_env("CHAT_PERSIST_QUEUE_CAPACITY", d.persist_queue_capacity),
            cors_allowed_origins: std::env::var("CHAT_CORS_ORIGINS").ok().filter(|s| !s.trim().is_empty()),
            enable_swagger: parse_bool("CHAT_ENABLE_SWAGGER", d.enable_swagger),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok().filter(|s| !s.trim().is_empty()),
            openai_base_url: env_or("OPENAI_BASE_URL", &d.openai_base_url),
            openai_model: env_or("OPENAI_MODEL", &d.openai_model),
            openai_temperature: parse_env("OPENAI_TEMPERATURE", d.openai_temperature),
        }
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            window: self.rate_limit_window,
            max_requests: self.rate_limit_max_requests,
        }
    }

    pub fn openai(&self) -> OpenAiConfig {
        OpenAiConfig {
            api_key: self.openai_api_key.clone(),
            base_url: self.openai_base_url.clone(),
            model: self.openai_model.clone(),
            temperature: self.openai_temperature,
        }
    }

    /// `true` when history should live in process memory.
    pub fn uses_memory_store(&self) -> bool {
        self.database_url.eq_ignore_ascii_case("memory:")
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}
