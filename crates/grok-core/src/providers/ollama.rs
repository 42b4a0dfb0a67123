//! Local inference via an Ollama server.
//!
//! POST {base_url}/api/generate
//! ```json
//! {"model": "llama3.1:8b", "prompt": "...", "stream": false,
//!  "options": {"temperature": 0.2, "num_predict": 2000}}
//! ```
//! Availability is probed with `GET {base_url}/api/tags`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ProviderError;
use crate::models::profile::{ModelConfig, ProviderKind};
use crate::providers::{elapsed_ms, map_transport_error, CompletionResponse, ModelProvider, ProviderHealth};

const PROVIDER_NAME: &str = "ollama";
pub const DEFAULT_MODEL: &str = "llama3.1:8b";
const HEALTH_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    #[serde(default)]
    name: String,
}

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    default_model: String,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch_tags(&self, timeout_seconds: u64) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(timeout_seconds))
            .send()
            .await
            .map_err(|e| map_transport_error(PROVIDER_NAME, timeout_seconds, e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                provider: PROVIDER_NAME.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| map_transport_error(PROVIDER_NAME, timeout_seconds, e))?;
        Ok(tags
            .models
            .into_iter()
            .map(|m| m.name)
            .filter(|name| !name.is_empty())
            .collect())
    }
}

#[async_trait]
impl ModelProvider for OllamaProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn generate_completion(
        &self,
        prompt: &str,
        config: &ModelConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let start = Instant::now();
        let url = format!("{}/api/generate", self.base_url);
        let body = serde_json::json!({
            "model": config.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": config.temperature,
                "num_predict": config.max_tokens,
            }
        });

        tracing::info!(
            "[Ollama] Calling {} (model: {}, prompt: {} chars)",
            url,
            config.model,
            prompt.chars().count()
        );

        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(PROVIDER_NAME, config.timeout_seconds, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| map_transport_error(PROVIDER_NAME, config.timeout_seconds, e))?;

        if !status.is_success() {
            return Err(ProviderError::Http {
                provider: PROVIDER_NAME.to_string(),
                status: status.as_u16(),
                message: text,
            });
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| ProviderError::MalformedResponse {
                provider: PROVIDER_NAME.to_string(),
                message: e.to_string(),
            })?;

        if parsed.response.trim().is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: PROVIDER_NAME.to_string(),
            });
        }

        let tokens_used = parsed.eval_count.unwrap_or(0);
        tracing::debug!("[Ollama] Completed in {}ms ({} tokens)", elapsed_ms(start), tokens_used);

        Ok(CompletionResponse {
            content: parsed.response,
            tokens_used,
            provider: PROVIDER_NAME.to_string(),
            model: config.model.clone(),
            processing_time_ms: elapsed_ms(start),
        })
    }

    async fn check_health(&self) -> ProviderHealth {
        let start = Instant::now();
        match self.fetch_tags(HEALTH_TIMEOUT_SECS).await {
            Ok(models) => ProviderHealth {
                available: true,
                response_time_ms: Some(elapsed_ms(start)),
                error_message: if models.is_empty() {
                    Some("Service available but no models found".to_string())
                } else {
                    None
                },
                models_available: models,
            },
            Err(ProviderError::Http { status, .. }) => ProviderHealth {
                response_time_ms: Some(elapsed_ms(start)),
                ..ProviderHealth::unavailable(format!("HTTP {}", status))
            },
            Err(ProviderError::Timeout { .. }) => ProviderHealth::unavailable("Connection timeout"),
            Err(e) => ProviderHealth::unavailable(e.to_string()),
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let models = self.fetch_tags(HEALTH_TIMEOUT_SECS).await?;
        tracing::info!("[Ollama] Found {} models", models.len());
        Ok(models)
    }
}
