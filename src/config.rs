//! Configuration management for agentflow.
//!
//! Configuration can be set via environment variables:
//! - `OPENROUTER_API_KEY` - Required. OpenRouter API key.
//! - `OPENROUTER_BASE_URL` - Optional. Defaults to `https://openrouter.ai/api/v1`.
//! - `SAMBANOVA_API_KEY` - Optional. Enables the SambaNova provider.
//! - `SAMBANOVA_BASE_URL` - Optional. Defaults to `https://cloud.sambanova.ai/apis`.
//! - `KESTRA_API_URL` - Optional. Workflow engine base URL. Defaults to `http://localhost:8080`.
//! - `KESTRA_API_KEY` - Optional. Bearer token for the workflow engine.
//! - `MAX_ITERATIONS` - Optional. Planning loop iteration cap. Defaults to `20`.
//!
//! Everything here is read once at startup and treated as read-only.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// A single model provider endpoint.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Human-readable provider name, used for provider-specific headers.
    pub name: String,

    /// Base URL; `/chat/completions` is appended per request.
    pub base_url: String,

    pub api_key: String,

    /// Model used when a caller does not specify one.
    pub default_model: String,
}

/// Workflow engine connection settings.
#[derive(Debug, Clone)]
pub struct KestraConfig {
    pub base_url: String,

    /// Optional bearer token sent on every request.
    pub api_key: Option<String>,
}

/// Process-wide configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Primary model provider (OpenRouter).
    pub openrouter: ProviderConfig,

    /// Secondary provider, present only when its key is configured.
    pub sambanova: Option<ProviderConfig>,

    /// Workflow engine endpoint.
    pub kestra: KestraConfig,

    /// Upper bound on planning loop iterations per run.
    pub max_iterations: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENROUTER_API_KEY` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let openrouter_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()))?;

        let openrouter = ProviderConfig {
            name: "OpenRouter".to_string(),
            base_url: std::env::var("OPENROUTER_BASE_URL")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string()),
            api_key: openrouter_key,
            default_model: "meta-llama/llama-3.1-405b-instruct".to_string(),
        };

        let sambanova = std::env::var("SAMBANOVA_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .map(|api_key| ProviderConfig {
                name: "SambaNova".to_string(),
                base_url: std::env::var("SAMBANOVA_BASE_URL")
                    .unwrap_or_else(|_| "https://cloud.sambanova.ai/apis".to_string()),
                api_key,
                default_model: "Meta-Llama-3.1-405B-Instruct".to_string(),
            });

        let kestra = KestraConfig {
            base_url: std::env::var("KESTRA_API_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            api_key: std::env::var("KESTRA_API_KEY").ok().filter(|k| !k.is_empty()),
        };

        let max_iterations = std::env::var("MAX_ITERATIONS")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("MAX_ITERATIONS".to_string(), format!("{}", e))
            })?;

        Ok(Self {
            openrouter,
            sambanova,
            kestra,
            max_iterations,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(openrouter_api_key: String, kestra_base_url: String) -> Self {
        Self {
            openrouter: ProviderConfig {
                name: "OpenRouter".to_string(),
                base_url: "https://openrouter.ai/api/v1".to_string(),
                api_key: openrouter_api_key,
                default_model: "meta-llama/llama-3.1-405b-instruct".to_string(),
            },
            sambanova: None,
            kestra: KestraConfig {
                base_url: kestra_base_url,
                api_key: None,
            },
            max_iterations: 20,
        }
    }
}
