use crate::config::{EmbeddingConfig, MAX_PROVIDER_ATTEMPTS};
use crate::error::{ApiError, Result};
use crate::ml::embedder::Embedder;
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MAX_TEXT_PREVIEW_LENGTH: usize = 70;

/// Embedding client for OpenAI-compatible `/embeddings` endpoints
/// (OpenAI itself, OpenRouter and most self-hosted gateways).
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
    endpoint: String,
    model_name: String,
    max_attempts: u32,
    retry_delay: Duration,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// The formats seen in the wild: the OpenAI `data` envelope, a bare
/// `embedding` object, a nested array and a flat array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbeddingResponse {
    OpenAi { data: Vec<EmbeddingData> },
    Single { embedding: Vec<f32> },
    Nested(Vec<Vec<f32>>),
    Flat(Vec<f32>),
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ApiError::Configuration(
                "Missing embedding API key (APP_EMBEDDING__API_KEY)".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(15)))
            .pool_max_idle_per_host(10)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .build()
            .map_err(|e| ApiError::InternalError(format!("Failed to create HTTP client: {}", e)))?;

        let endpoint = format!("{}/embeddings", config.base_url.trim_end_matches('/'));

        info!(
            "Initialized embedding client with model: {}, endpoint: {}, timeout: {}s",
            config.model, endpoint, config.timeout_secs
        );

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint,
            model_name: config.model.clone(),
            max_attempts: config.max_attempts.clamp(1, MAX_PROVIDER_ATTEMPTS),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    async fn request_once(&self, text: &str) -> std::result::Result<Vec<f32>, RequestError> {
        let request = EmbeddingRequest {
            model: &self.model_name,
            input: text,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                RequestError::transient(format!("Failed to send embedding request: {}", e))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            RequestError::transient(format!("Failed to read embedding response: {}", e))
        })?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        parse_embedding_response(&body).map_err(RequestError::permanent)
    }
}

/// A failed provider call and whether another attempt may succeed.
#[derive(Debug)]
struct RequestError {
    error: ApiError,
    retryable: bool,
}

impl RequestError {
    /// Transport errors, rate limits and server errors are worth one more try.
    fn transient(message: String) -> Self {
        Self {
            error: ApiError::ProviderFailure(message),
            retryable: true,
        }
    }

    fn permanent(error: ApiError) -> Self {
        Self {
            error,
            retryable: false,
        }
    }
}

fn status_error(status: StatusCode, body: &str) -> RequestError {
    let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
    let message = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            "Authentication failed, check the embedding API key".to_string()
        }
        StatusCode::TOO_MANY_REQUESTS => "Rate limit exceeded".to_string(),
        _ => format!("Provider returned {}: {}", status, body),
    };
    RequestError {
        error: ApiError::ProviderFailure(message),
        retryable,
    }
}

pub(crate) fn parse_embedding_response(body: &str) -> Result<Vec<f32>> {
    let parsed: EmbeddingResponse = serde_json::from_str(body).map_err(|e| {
        ApiError::ProviderFailure(format!("Malformed embedding response: {}", e))
    })?;

    let embedding = match parsed {
        EmbeddingResponse::OpenAi { data } => data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .unwrap_or_default(),
        EmbeddingResponse::Single { embedding } => embedding,
        EmbeddingResponse::Nested(rows) => rows.into_iter().next().unwrap_or_default(),
        EmbeddingResponse::Flat(values) => values,
    };

    if embedding.is_empty() {
        return Err(ApiError::ProviderFailure(
            "Provider returned an empty embedding".to_string(),
        ));
    }

    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(ApiError::ProviderFailure(
            "Provider returned non-finite embedding values".to_string(),
        ));
    }

    Ok(embedding)
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let preview: String = text.chars().take(MAX_TEXT_PREVIEW_LENGTH).collect();
        debug!("Embedding text (length: {}): {}", text.len(), preview);

        let mut attempt = 1;
        loop {
            match self.request_once(text).await {
                Ok(embedding) => {
                    debug!("Got embedding of size {}", embedding.len());
                    return Ok(embedding);
                }
                Err(e) if attempt < self.max_attempts && e.retryable => {
                    warn!(
                        "Embedding request failed (attempt {}/{}): {}. Retrying...",
                        attempt, self.max_attempts, e.error
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.error),
            }
        }
    }

    fn model_info(&self) -> String {
        format!("Model: {}", self.model_name)
    }
}
