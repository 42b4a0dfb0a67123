//! Remote models via the OpenRouter aggregator (OpenAI-compatible API).
//!
//! POST {base_url}/chat/completions
//! Headers:
//!   Authorization: Bearer {api_key}
//!   X-Title: {app_name}
//!   HTTP-Referer: {app_url}

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::models::profile::{ModelConfig, ProviderKind};
use crate::providers::{elapsed_ms, map_transport_error, CompletionResponse, ModelProvider, ProviderHealth};

const PROVIDER_NAME: &str = "openrouter";
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
const HEALTH_TIMEOUT_SECS: u64 = 5;

/// Models offered by `list_models`; OpenRouter serves many more.
pub const POPULAR_MODELS: &[&str] = &[
    "openai/gpt-4o",
    "openai/gpt-4o-mini",
    "anthropic/claude-3.5-sonnet",
    "anthropic/claude-3-haiku",
    "google/gemini-pro-1.5",
    "meta-llama/llama-3.1-70b-instruct",
    "mistralai/mistral-large",
    "cohere/command-r-plus",
];

#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    pub api_key: String,
    pub base_url: String,
    pub app_name: Option<String>,
    pub app_url: Option<String>,
    /// Model used for steps that fall back from the local provider
    pub default_model: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            app_name: Some("grok-intelligence-engine".to_string()),
            app_url: None,
            default_model: DEFAULT_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u64,
}

/// Cumulative counters for one provider instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub request_count: u64,
    pub total_tokens_used: u64,
}

pub struct OpenRouterProvider {
    client: reqwest::Client,
    config: OpenRouterConfig,
    request_count: AtomicU64,
    total_tokens: AtomicU64,
}

impl OpenRouterProvider {
    pub fn new(config: OpenRouterConfig) -> Self {
        let config = OpenRouterConfig {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            ..config
        };
        Self {
            client: reqwest::Client::builder()
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            config,
            request_count: AtomicU64::new(0),
            total_tokens: AtomicU64::new(0),
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.config.api_key.trim().is_empty()
    }

    pub fn usage_stats(&self) -> UsageStats {
        UsageStats {
            request_count: self.request_count.load(Ordering::Relaxed),
            total_tokens_used: self.total_tokens.load(Ordering::Relaxed),
        }
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut builder = builder.bearer_auth(&self.config.api_key);
        if let Some(ref name) = self.config.app_name {
            builder = builder.header("X-Title", name);
        }
        if let Some(ref url) = self.config.app_url {
            builder = builder.header("HTTP-Referer", url);
        }
        builder
    }

    fn error_for_status(status: reqwest::StatusCode, retry_after: Option<u64>, body: &str) -> ProviderError {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.to_string());

        match status.as_u16() {
            429 => ProviderError::RateLimited {
                provider: PROVIDER_NAME.to_string(),
                retry_after,
            },
            401 | 403 => ProviderError::Authentication {
                provider: PROVIDER_NAME.to_string(),
                message,
            },
            code => ProviderError::Http {
                provider: PROVIDER_NAME.to_string(),
                status: code,
                message,
            },
        }
    }
}

fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[async_trait]
impl ModelProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Remote
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    async fn generate_completion(
        &self,
        prompt: &str,
        config: &ModelConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        if !self.has_api_key() {
            return Err(ProviderError::Authentication {
                provider: PROVIDER_NAME.to_string(),
                message: "no API key configured".to_string(),
            });
        }

        let start = Instant::now();
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = serde_json::json!({
            "model": config.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": config.temperature,
            "max_tokens": config.max_tokens,
            "stream": false,
        });

        tracing::info!(
            "[OpenRouter] Calling {} (model: {}, prompt: {} chars)",
            url,
            config.model,
            prompt.chars().count()
        );
        self.request_count.fetch_add(1, Ordering::Relaxed);

        let response = self
            .request(self.client.post(&url))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(PROVIDER_NAME, config.timeout_seconds, e))?;

        let status = response.status();
        let retry_after = retry_after_secs(response.headers());
        let text = response
            .text()
            .await
            .map_err(|e| map_transport_error(PROVIDER_NAME, config.timeout_seconds, e))?;

        if !status.is_success() {
            return Err(Self::error_for_status(status, retry_after, &text));
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| ProviderError::MalformedResponse {
                provider: PROVIDER_NAME.to_string(),
                message: e.to_string(),
            })?;

        let Some(first) = parsed.choices.into_iter().next() else {
            return Err(ProviderError::MalformedResponse {
                provider: PROVIDER_NAME.to_string(),
                message: "response contained no choices".to_string(),
            });
        };

        let content = first.message.and_then(|m| m.content).unwrap_or_default();
        if content.trim().is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: PROVIDER_NAME.to_string(),
            });
        }

        let tokens_used = parsed.usage.map(|u| u.total_tokens).unwrap_or(0);
        self.total_tokens.fetch_add(tokens_used, Ordering::Relaxed);

        Ok(CompletionResponse {
            content,
            tokens_used,
            provider: PROVIDER_NAME.to_string(),
            model: config.model.clone(),
            processing_time_ms: elapsed_ms(start),
        })
    }

    async fn check_health(&self) -> ProviderHealth {
        if !self.has_api_key() {
            return ProviderHealth::unavailable("No API key configured");
        }

        let start = Instant::now();
        let url = format!("{}/auth/key", self.config.base_url);
        let result = self
            .request(self.client.get(&url))
            .timeout(Duration::from_secs(HEALTH_TIMEOUT_SECS))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => ProviderHealth {
                available: true,
                response_time_ms: Some(elapsed_ms(start)),
                models_available: POPULAR_MODELS.iter().map(|m| m.to_string()).collect(),
                error_message: None,
            },
            Ok(response) => {
                let message = match response.status().as_u16() {
                    401 | 403 => "Invalid API key".to_string(),
                    code => format!("HTTP {}", code),
                };
                ProviderHealth {
                    response_time_ms: Some(elapsed_ms(start)),
                    ..ProviderHealth::unavailable(message)
                }
            }
            Err(e) if e.is_timeout() => ProviderHealth::unavailable("Connection timeout"),
            Err(e) => ProviderHealth::unavailable(format!("Connection error: {}", e)),
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        Ok(POPULAR_MODELS.iter().map(|m| m.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let err = OpenRouterProvider::error_for_status(
            reqwest::StatusCode::UNAUTHORIZED,
            None,
            r#"{"error": {"message": "No auth credentials found"}}"#,
        );
        assert!(matches!(err, ProviderError::Authentication { ref message, .. } if message == "No auth credentials found"));

        let err = OpenRouterProvider::error_for_status(reqwest::StatusCode::TOO_MANY_REQUESTS, Some(7), "");
        assert!(matches!(err, ProviderError::RateLimited { retry_after: Some(7), .. }));
        assert!(err.is_transient());

        let err = OpenRouterProvider::error_for_status(reqwest::StatusCode::BAD_GATEWAY, None, "upstream down");
        assert!(matches!(err, ProviderError::Http { status: 502, ref message, .. } if message == "upstream down"));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_missing_key_is_unavailable_and_permanent() {
        let provider = OpenRouterProvider::new(OpenRouterConfig::default());
        assert!(!provider.check_availability().await);

        let err = provider
            .generate_completion("hello {transcript}", &ModelConfig::default())
            .await
            .unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(provider.usage_stats().request_count, 0);
    }
}
