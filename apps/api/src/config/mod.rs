use crate::error::{ApiError, Result};
use serde::Deserialize;
use std::path::PathBuf;

pub const MAX_RECOMMENDATIONS: usize = 10;
pub const MAX_PROVIDER_ATTEMPTS: u32 = 2;

/// Settings for the HTTP embedding provider.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub catalog_path: PathBuf,
    pub top_k: usize,
    pub embedding: EmbeddingConfig,
}

impl Config {
    /// Loads configuration from defaults, an optional `config/default.toml`
    /// and `APP_*` environment variables, in increasing precedence.
    ///
    /// Nested keys use a double underscore, e.g. `APP_EMBEDDING__API_KEY`.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let settings = ::config::Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8000)?
            .set_default("catalog_path", "data/catalog.json")?
            .set_default("top_k", MAX_RECOMMENDATIONS as i64)?
            .set_default("embedding.base_url", "https://openrouter.ai/api/v1")?
            .set_default("embedding.model", "openai/text-embedding-ada-002")?
            .set_default("embedding.timeout_secs", 30)?
            .set_default("embedding.max_attempts", MAX_PROVIDER_ATTEMPTS as i64)?
            .set_default("embedding.retry_delay_ms", 500)?
            .add_source(::config::File::with_name("config/default").required(false))
            .add_source(
                ::config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 || self.top_k > MAX_RECOMMENDATIONS {
            return Err(ApiError::Configuration(format!(
                "top_k must be between 1 and {}, got {}",
                MAX_RECOMMENDATIONS, self.top_k
            )));
        }

        if self.embedding.max_attempts == 0 || self.embedding.max_attempts > MAX_PROVIDER_ATTEMPTS
        {
            return Err(ApiError::Configuration(format!(
                "embedding.max_attempts must be between 1 and {}, got {}",
                MAX_PROVIDER_ATTEMPTS, self.embedding.max_attempts
            )));
        }

        Ok(())
    }
}
