//! Environment configuration.

use std::env;

pub const ENV_LOG: &str = "CHAT_STREAM_LOG";
pub const ENV_LOG_JSON: &str = "CHAT_STREAM_LOG_JSON";
pub const ENV_BASE_URL: &str = "CHAT_BASE_URL";
pub const ENV_MODEL: &str = "CHAT_MODEL";
pub const ENV_CONVERSATION_ID: &str = "CHAT_CONVERSATION_ID";

#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// `tracing` filter directive; falls back to `RUST_LOG` when unset.
    pub log_filter: Option<String>,
    pub log_json: bool,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub conversation_id: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            log_filter: env_string_opt(ENV_LOG),
            log_json: env_flag(ENV_LOG_JSON),
            base_url: env_string_opt(ENV_BASE_URL),
            model: env_string_opt(ENV_MODEL),
            conversation_id: env_string_opt(ENV_CONVERSATION_ID),
        }
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}
