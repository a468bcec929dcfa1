// src/config.rs

use std::env;
use std::time::Duration;
use dotenvy::dotenv;

/// Questions requested from the generator when the caller does not say.
pub const DEFAULT_QUESTION_COUNT: usize = 5;

/// Upper bound on questions requested in one generation call.
pub const MAX_QUESTION_COUNT: usize = 20;

const DEFAULT_SESSION_TTL_SECS: u64 = 2 * 60 * 60;
const DEFAULT_MAX_SESSIONS: usize = 10_000;

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Missing key means the generator reports itself as not ready.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Missing URL leaves the server up with every store-backed route answering 503.
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub rust_log: String,
    /// Enables the anonymous, never-persisted quiz path.
    pub allow_guests: bool,
    /// Quiz sessions idle longer than this are dropped.
    pub session_ttl: Duration,
    /// Live quiz sessions kept at most; the least recently used goes first.
    pub max_sessions: usize,
    pub generation: GenerationConfig,
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = non_empty_var("DATABASE_URL");

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let allow_guests = env::var("ALLOW_GUESTS")
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true);

        let session_ttl = env::var("SESSION_TTL_SECS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_SESSION_TTL_SECS));

        let max_sessions = env::var("MAX_SESSIONS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_MAX_SESSIONS);

        let generation = GenerationConfig {
            api_key: non_empty_var("OPENAI_API_KEY"),
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            model: env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
        };

        Self {
            database_url,
            bind_addr,
            rust_log,
            allow_guests,
            session_ttl,
            max_sessions,
            generation,
        }
    }
}
