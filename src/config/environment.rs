// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses required credentials and optional chat tunables with documented defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Environment-based configuration management for production deployment

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use syntia_core::constants::{cache, embeddings, limits};
use tracing::{info, warn};

use crate::llm::RetryConfig;

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 8081;

/// Default Vertex AI API base URL
pub const DEFAULT_VERTEX_BASE_URL: &str = "https://aiplatform.googleapis.com";

/// Default Vertex AI location for generation
pub const DEFAULT_VERTEX_LOCATION: &str = "global";

/// Default generative model
pub const DEFAULT_VERTEX_MODEL: &str = "gemini-3-flash-preview";

/// Default Vertex AI location for embeddings
pub const DEFAULT_EMBEDDING_LOCATION: &str = "us-central1";

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-005";

/// Default OAuth2 token endpoint
pub const DEFAULT_GCP_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback to development
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Whether this is a production deployment
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// String that never appears in `Debug` output
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    /// Wrap a secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the secret value
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Postgres connection settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Connection URL (contains credentials)
    pub url: SecretString,
    /// Pool size
    pub max_connections: u32,
}

/// Identity provider (Supabase Auth) settings
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL
    pub url: String,
    /// Service role key sent as `apikey`
    pub service_role_key: SecretString,
}

/// Vertex AI generation and embedding settings
#[derive(Debug, Clone)]
pub struct VertexConfig {
    /// API base URL
    pub base_url: String,
    /// GCP project
    pub project_id: String,
    /// Location for generation calls
    pub location: String,
    /// Generative model
    pub model: String,
    /// Location for embedding calls
    pub embedding_location: String,
    /// Embedding model
    pub embedding_model: String,
    /// Embedding output dimensionality
    pub embedding_dimension: usize,
    /// OAuth2 token endpoint
    pub token_url: String,
    /// Base64-encoded service-account JSON
    pub service_account_key: SecretString,
    /// How long an exchanged access token is reused
    pub token_ttl: Duration,
}

/// Agent loop and history tunables
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Tool-calling rounds before the forced final answer
    pub max_tool_rounds: usize,
    /// Raw messages replayed without a summary
    pub max_history_messages: usize,
    /// Post-turn message count that triggers the first compaction
    pub compaction_threshold: usize,
    /// Re-compaction interval once a summary exists (0 disables)
    pub recompaction_interval: usize,
    /// Character ceiling of a tool result
    pub max_tool_result_chars: usize,
    /// Output token ceiling per model call
    pub max_output_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// System prompt cache TTL
    pub system_prompt_ttl: Duration,
    /// Backoff policy for 429/5xx from the model
    pub retry: RetryConfig,
    /// Keep-alive period while tools run
    pub keep_alive_interval: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: limits::MAX_TOOL_ROUNDS,
            max_history_messages: limits::MAX_HISTORY_MESSAGES,
            compaction_threshold: limits::COMPACTION_THRESHOLD,
            recompaction_interval: limits::RECOMPACTION_INTERVAL,
            max_tool_result_chars: limits::MAX_TOOL_RESULT_CHARS,
            max_output_tokens: limits::MAX_OUTPUT_TOKENS,
            temperature: limits::TEMPERATURE,
            system_prompt_ttl: Duration::from_secs(cache::SYSTEM_PROMPT_TTL_SECS),
            retry: RetryConfig::default_config(),
            keep_alive_interval: Duration::from_secs(limits::TOOL_KEEPALIVE_INTERVAL_SECS),
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Deployment environment
    pub environment: Environment,
    /// Allowed CORS origins (`*` for any)
    pub cors_origins: Vec<String>,
    /// Datastore
    pub database: DatabaseConfig,
    /// Identity provider
    pub supabase: SupabaseConfig,
    /// Generative backend
    pub vertex: VertexConfig,
    /// Agent loop tunables
    pub chat: ChatConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value fails to parse
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let config = Self {
            http_port: parse_env("HTTP_PORT", DEFAULT_HTTP_PORT)?,
            environment: Environment::from_str_or_default(&env_var_or(
                "ENVIRONMENT",
                "development",
            )),
            cors_origins: parse_origins(&env_var_or("CORS_ORIGINS", "*")),

            database: DatabaseConfig {
                url: SecretString::new(required_env("DATABASE_URL")?),
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10)?,
            },

            supabase: SupabaseConfig {
                url: required_env("SUPABASE_URL")?
                    .trim_end_matches('/')
                    .to_owned(),
                service_role_key: SecretString::new(required_env("SUPABASE_SERVICE_ROLE_KEY")?),
            },

            vertex: VertexConfig {
                base_url: env_var_or("VERTEX_BASE_URL", DEFAULT_VERTEX_BASE_URL)
                    .trim_end_matches('/')
                    .to_owned(),
                project_id: required_env("GCP_PROJECT_ID")?,
                location: env_var_or("VERTEX_LOCATION", DEFAULT_VERTEX_LOCATION),
                model: env_var_or("VERTEX_MODEL", DEFAULT_VERTEX_MODEL),
                embedding_location: env_var_or("EMBEDDING_LOCATION", DEFAULT_EMBEDDING_LOCATION),
                embedding_model: env_var_or("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
                embedding_dimension: parse_env(
                    "EMBEDDING_DIMENSION",
                    embeddings::DEFAULT_DIMENSION,
                )?,
                token_url: env_var_or("GCP_TOKEN_URL", DEFAULT_GCP_TOKEN_URL),
                service_account_key: SecretString::new(required_env("GCP_SERVICE_ACCOUNT_KEY")?),
                token_ttl: Duration::from_secs(parse_env(
                    "GCP_TOKEN_TTL_SECS",
                    cache::ACCESS_TOKEN_TTL_SECS,
                )?),
            },

            chat: ChatConfig {
                max_tool_rounds: parse_env("CHAT_MAX_TOOL_ROUNDS", limits::MAX_TOOL_ROUNDS)?,
                max_history_messages: parse_env(
                    "CHAT_MAX_HISTORY_MESSAGES",
                    limits::MAX_HISTORY_MESSAGES,
                )?,
                compaction_threshold: parse_env(
                    "CHAT_COMPACTION_THRESHOLD",
                    limits::COMPACTION_THRESHOLD,
                )?,
                recompaction_interval: parse_env(
                    "CHAT_RECOMPACTION_INTERVAL",
                    limits::RECOMPACTION_INTERVAL,
                )?,
                max_tool_result_chars: parse_env(
                    "CHAT_MAX_TOOL_RESULT_CHARS",
                    limits::MAX_TOOL_RESULT_CHARS,
                )?,
                max_output_tokens: parse_env("CHAT_MAX_OUTPUT_TOKENS", limits::MAX_OUTPUT_TOKENS)?,
                temperature: parse_env("CHAT_TEMPERATURE", limits::TEMPERATURE)?,
                system_prompt_ttl: Duration::from_secs(parse_env(
                    "CHAT_SYSTEM_PROMPT_TTL_SECS",
                    cache::SYSTEM_PROMPT_TTL_SECS,
                )?),
                retry: RetryConfig {
                    max_retries: parse_env("CHAT_RETRY_MAX", 3)?,
                    initial_delay_ms: parse_env("CHAT_RETRY_INITIAL_MS", 500)?,
                    max_delay_ms: parse_env("CHAT_RETRY_MAX_DELAY_MS", 5000)?,
                },
                keep_alive_interval: Duration::from_secs(limits::TOOL_KEEPALIVE_INTERVAL_SECS),
            },
        };

        config.validate()?;
        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error when a tunable is outside its usable range
    pub fn validate(&self) -> Result<()> {
        if self.chat.max_tool_rounds == 0 {
            return Err(anyhow!("CHAT_MAX_TOOL_ROUNDS must be at least 1"));
        }
        if self.chat.max_output_tokens == 0 {
            return Err(anyhow!("CHAT_MAX_OUTPUT_TOKENS must be at least 1"));
        }
        if !(0.0..=2.0).contains(&self.chat.temperature) {
            return Err(anyhow!("CHAT_TEMPERATURE must be between 0.0 and 2.0"));
        }
        if self.vertex.embedding_dimension == 0 {
            return Err(anyhow!("EMBEDDING_DIMENSION must be at least 1"));
        }
        if self.database.max_connections == 0 {
            return Err(anyhow!("DATABASE_MAX_CONNECTIONS must be at least 1"));
        }
        if self.chat.compaction_threshold == 0 {
            warn!("CHAT_COMPACTION_THRESHOLD is 0; every turn will trigger compaction");
        }
        if self.environment.is_production() && self.cors_origins.iter().any(|o| o == "*") {
            warn!("CORS allows any origin in production");
        }
        Ok(())
    }

    /// Get a summary of the configuration for logging (without secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Syntia Chat Configuration:\n\
             - HTTP Port: {}\n\
             - Environment: {}\n\
             - Database pool: {} connections\n\
             - Identity provider: {}\n\
             - Vertex AI: project={} location={} model={}\n\
             - Embeddings: location={} model={} dim={}\n\
             - Tool rounds: {}\n\
             - History window: {} (compaction at {}, every {} after)\n\
             - Output ceiling: {} tokens @ temperature {}\n\
             - Retries: {} (initial {}ms, max {}ms)\n\
             - CORS origins: {}",
            self.http_port,
            self.environment,
            self.database.max_connections,
            self.supabase.url,
            self.vertex.project_id,
            self.vertex.location,
            self.vertex.model,
            self.vertex.embedding_location,
            self.vertex.embedding_model,
            self.vertex.embedding_dimension,
            self.chat.max_tool_rounds,
            self.chat.max_history_messages,
            self.chat.compaction_threshold,
            self.chat.recompaction_interval,
            self.chat.max_output_tokens,
            self.chat.temperature,
            self.chat.retry.max_retries,
            self.chat.retry.initial_delay_ms,
            self.chat.retry.max_delay_ms,
            self.cors_origins.join(", "),
        )
    }
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Get a required, non-empty environment variable
fn required_env(key: &str) -> Result<String> {
    let value = env::var(key).with_context(|| format!("{key} environment variable not set"))?;
    if value.trim().is_empty() {
        return Err(anyhow!("{key} environment variable is empty"));
    }
    Ok(value)
}

/// Parse an optional environment variable, falling back to `default`
fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {key} value: {raw}")),
        _ => Ok(default),
    }
}

/// Parse comma-separated CORS origins
fn parse_origins(origins_str: &str) -> Vec<String> {
    if origins_str.trim() == "*" {
        vec!["*".to_owned()]
    } else {
        origins_str
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect()
    }
}
