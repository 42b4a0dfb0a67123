//! Model providers.
//!
//! ```text
//!                  ┌──────────────────┐
//!  StepExecutor ──►│  ModelSelector   │── preferred / fallback ──┐
//!                  └──────────────────┘                          │
//!                        ┌───────────────────────────────────────┴──┐
//!                        ▼                                          ▼
//!                ┌────────────────┐                       ┌──────────────────┐
//!                │ OllamaProvider │  (local)              │ OpenRouterProvider│ (remote)
//!                │ /api/generate  │                       │ /chat/completions │
//!                └────────────────┘                       └──────────────────┘
//! ```
//!
//! Providers hold only a pooled `reqwest::Client` and immutable settings, so
//! one instance is shared by every concurrent run.

pub mod ollama;
pub mod openrouter;
pub mod selector;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::models::profile::{ModelConfig, ProviderKind};

pub use ollama::OllamaProvider;
pub use openrouter::OpenRouterProvider;
pub use selector::ModelSelector;

/// Raw completion returned by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub tokens_used: u64,
    /// Name of the provider that served the request
    pub provider: String,
    pub model: String,
    pub processing_time_ms: u64,
}

/// Result of a provider health probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderHealth {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(default)]
    pub models_available: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ProviderHealth {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            available: false,
            error_message: Some(message.into()),
            ..Default::default()
        }
    }
}

/// A backend that turns a prompt into a completion.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Short name used in logs and results, e.g. `ollama`.
    fn name(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    /// Model used when a step falls back to this provider from another kind.
    fn default_model(&self) -> &str;

    /// Run one completion. The call must give up after
    /// `config.timeout_seconds` with [`ProviderError::Timeout`].
    async fn generate_completion(
        &self,
        prompt: &str,
        config: &ModelConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Probe the backend. Never fails; problems are reported in the result.
    async fn check_health(&self) -> ProviderHealth;

    async fn list_models(&self) -> Result<Vec<String>, ProviderError>;

    async fn check_availability(&self) -> bool {
        self.check_health().await.available
    }
}

/// Map a transport error from `reqwest` onto the provider taxonomy.
pub(crate) fn map_transport_error(provider: &str, timeout_seconds: u64, err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout {
            provider: provider.to_string(),
            seconds: timeout_seconds,
        }
    } else if err.is_decode() {
        ProviderError::MalformedResponse {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    } else {
        ProviderError::Connection {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }
}

pub(crate) fn elapsed_ms(start: std::time::Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
