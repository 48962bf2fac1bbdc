//! Configuration management for the API Architect
//!
//! Loads configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Where service records are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => anyhow::bail!("Unknown STORE_BACKEND '{}' (expected redis or memory)", other),
        }
    }
}

/// Google Cloud settings
#[derive(Debug, Clone)]
pub struct GcpConfig {
    pub project_id: String,
    pub region: String,
    pub source_bucket: String,
    pub artifact_repository: String,
    /// Static OAuth token; the metadata server is used when unset
    pub access_token: Option<String>,
    pub gemini_api_key: String,
    pub gemini_model: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server host
    pub api_host: String,

    /// API server port
    pub api_port: u16,

    /// Path prefix of the service routes
    pub api_prefix: String,

    /// Allowed CORS origins; empty allows all
    pub cors_origins: Vec<String>,

    pub store_backend: StoreBackend,
    pub redis_url: String,

    /// Use the in-memory cloud instead of Google Cloud
    pub mock_mode: bool,

    /// Concurrent generation pipelines
    pub pipeline_workers: usize,

    pub gcp: GcpConfig,

    /// Timeout of outgoing cloud API calls
    pub http_timeout: Duration,

    /// Bearer token → owner id; empty trusts the token as the owner id
    pub auth_tokens: HashMap<String, String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let config = Config {
            api_host: var("API_HOST", "0.0.0.0"),

            api_port: var("API_PORT", "8080")
                .parse()
                .context("Invalid API_PORT")?,

            api_prefix: var("API_PREFIX", "/api/v1"),

            cors_origins: split_list(&var("CORS_ORIGINS", "")),

            store_backend: var("STORE_BACKEND", "redis").parse()?,

            redis_url: var("REDIS_URL", "redis://127.0.0.1:6379"),

            mock_mode: parse_bool(&var("MOCK_MODE", "false")).context("Invalid MOCK_MODE")?,

            pipeline_workers: var("PIPELINE_WORKERS", "4")
                .parse()
                .context("Invalid PIPELINE_WORKERS")?,

            gcp: GcpConfig {
                project_id: var("GCP_PROJECT_ID", ""),
                region: var("GCP_REGION", "us-central1"),
                source_bucket: var("GCP_SOURCE_BUCKET_NAME", ""),
                artifact_repository: var("GCP_ARTIFACT_REPOSITORY", "api-architect-repo"),
                access_token: lookup("GCP_ACCESS_TOKEN").filter(|t| !t.trim().is_empty()),
                gemini_api_key: var("GEMINI_API_KEY", ""),
                gemini_model: var("GEMINI_MODEL", "gemini-1.5-pro"),
            },

            http_timeout: Duration::from_secs(
                var("HTTP_TIMEOUT_SECS", "30")
                    .parse()
                    .context("Invalid HTTP_TIMEOUT_SECS")?,
            ),

            auth_tokens: parse_tokens(&var("AUTH_TOKENS", ""))?,
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.api_port == 0 {
            anyhow::bail!("API_PORT must be greater than 0");
        }

        if self.pipeline_workers == 0 {
            anyhow::bail!("PIPELINE_WORKERS must be greater than 0");
        }

        if !self.mock_mode {
            let required = [
                ("GCP_PROJECT_ID", &self.gcp.project_id),
                ("GCP_SOURCE_BUCKET_NAME", &self.gcp.source_bucket),
                ("GEMINI_API_KEY", &self.gcp.gemini_api_key),
            ];
            for (key, value) in required {
                if value.is_empty() {
                    anyhow::bail!("{} is required unless MOCK_MODE is enabled", key);
                }
            }
        }

        Ok(())
    }

    /// Get the API server address
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got '{}'", other),
    }
}

/// `token=owner` pairs separated by commas
fn parse_tokens(raw: &str) -> Result<HashMap<String, String>> {
    split_list(raw)
        .into_iter()
        .map(|pair| -> Result<(String, String)> {
            let (token, owner) = pair
                .split_once('=')
                .with_context(|| format!("Invalid AUTH_TOKENS entry '{}'", pair))?;
            let (token, owner) = (token.trim(), owner.trim());
            if token.is_empty() || owner.is_empty() {
                anyhow::bail!("Invalid AUTH_TOKENS entry '{}'", pair);
            }
            Ok((token.to_string(), owner.to_string()))
        })
        .collect()
}
