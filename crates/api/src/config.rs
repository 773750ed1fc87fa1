use std::time::Duration;

use crate::auth::jwt::JwtConfig;

/// Which [`crate::engine::ReplyGenerator`] backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorBackend {
    /// Deterministic canned replies; no external dependency.
    Scripted,
    /// An OpenAI-compatible `/chat/completions` streaming endpoint.
    OpenAi,
}

impl GeneratorBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "scripted" => Some(Self::Scripted),
            "openai" => Some(Self::OpenAi),
            _ => None,
        }
    }
}

/// Settings for reply generation and the streaming gateway.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub backend: GeneratorBackend,
    /// Upper bound on one whole generation (default: `60`).
    pub timeout_secs: u64,
    /// How many prior messages are replayed to the generator (default: `20`).
    pub history_window: usize,
    /// Base URL of the OpenAI-compatible API, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Pause between scripted fragments (default: `40`).
    pub scripted_delay_ms: u64,
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Load generation settings from environment variables.
    ///
    /// | Env Var                   | Default                      |
    /// |---------------------------|------------------------------|
    /// | `GENERATOR`               | `scripted`                   |
    /// | `GENERATION_TIMEOUT_SECS` | `60`                         |
    /// | `HISTORY_WINDOW`          | `20`                         |
    /// | `GENERATOR_BASE_URL`      | `https://api.openai.com/v1`  |
    /// | `GENERATOR_API_KEY`       | --                           |
    /// | `GENERATOR_MODEL`         | `gpt-4o-mini`                |
    /// | `SCRIPTED_DELAY_MS`       | `40`                         |
    pub fn from_env() -> Self {
        let backend = std::env::var("GENERATOR")
            .map(|v| {
                GeneratorBackend::parse(&v)
                    .unwrap_or_else(|| panic!("GENERATOR must be 'scripted' or 'openai', got '{v}'"))
            })
            .unwrap_or(GeneratorBackend::Scripted);

        let timeout_secs: u64 = std::env::var("GENERATION_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("GENERATION_TIMEOUT_SECS must be a valid u64");

        let history_window: usize = std::env::var("HISTORY_WINDOW")
            .unwrap_or_else(|_| "20".into())
            .parse()
            .expect("HISTORY_WINDOW must be a valid usize");

        let base_url = std::env::var("GENERATOR_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".into())
            .trim_end_matches('/')
            .to_string();

        let api_key = std::env::var("GENERATOR_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());

        let model = std::env::var("GENERATOR_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

        let scripted_delay_ms: u64 = std::env::var("SCRIPTED_DELAY_MS")
            .unwrap_or_else(|_| "40".into())
            .parse()
            .expect("SCRIPTED_DELAY_MS must be a valid u64");

        if backend == GeneratorBackend::OpenAi {
            assert!(
                api_key.is_some(),
                "GENERATOR_API_KEY must be set when GENERATOR=openai"
            );
        }

        Self {
            backend,
            timeout_secs,
            history_window,
            base_url,
            api_key,
            model,
            scripted_delay_ms,
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// Timeout for producing response headers (default: `30`). Reply streams
    /// are bounded separately by [`GenerationConfig::timeout_secs`].
    pub request_timeout_secs: u64,
    /// How long shutdown waits for open reply streams to finish (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Postgres URL. When absent the server keeps sessions in memory.
    pub database_url: Option<String>,
    /// JWT validation configuration.
    pub jwt: JwtConfig,
    pub generation: GenerationConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    /// | `DATABASE_URL`         | -- (in-memory store)       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.is_empty());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            database_url,
            jwt: JwtConfig::from_env(),
            generation: GenerationConfig::from_env(),
        }
    }
}
