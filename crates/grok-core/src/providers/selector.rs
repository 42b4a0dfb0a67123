//! Provider selection with fallback.
//!
//! 1. `force_provider` / `force_model` overrides replace the requested values.
//! 2. The requested provider is used if it reports available.
//! 3. Otherwise [`ProviderKind::FALLBACK_ORDER`] is walked, skipping the
//!    provider already tried; `config.provider` is updated to the choice.
//!    The requested model belongs to the other provider, so `config.model`
//!    becomes the fallback provider's default unless the caller pinned it.
//! 4. If nothing is reachable the step fails with `NoProviderAvailable`.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ProviderError;
use crate::models::overrides::GlobalOverrides;
use crate::models::profile::{ModelConfig, ProviderKind};
use crate::providers::{ModelProvider, ProviderHealth};

#[derive(Clone, Default)]
pub struct ModelSelector {
    providers: Vec<Arc<dyn ModelProvider>>,
}

impl ModelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider. A later registration of the same kind replaces
    /// the earlier one.
    pub fn with_provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn register(&mut self, provider: Arc<dyn ModelProvider>) {
        let kind = provider.kind();
        self.providers.retain(|p| p.kind() != kind);
        self.providers.push(provider);
    }

    pub fn get(&self, kind: ProviderKind) -> Option<&Arc<dyn ModelProvider>> {
        self.providers.iter().find(|p| p.kind() == kind)
    }

    pub fn providers(&self) -> &[Arc<dyn ModelProvider>] {
        &self.providers
    }

    /// Pick a reachable provider for `config`, updating `config.provider`
    /// and `config.model` to the ones actually used. Only `force_model`
    /// pins the model across a fallback.
    pub async fn select_provider(
        &self,
        config: &mut ModelConfig,
        overrides: Option<&GlobalOverrides>,
    ) -> Result<Arc<dyn ModelProvider>, ProviderError> {
        let pinned = overrides.is_some_and(|o| o.force_model.is_some());
        self.select(config, overrides, pinned).await
    }

    /// Like [`select_provider`](Self::select_provider), but a model set in
    /// `step_overrides[step_id]` is also kept across a fallback.
    pub async fn select_for_step(
        &self,
        step_id: &str,
        config: &mut ModelConfig,
        overrides: &GlobalOverrides,
    ) -> Result<Arc<dyn ModelProvider>, ProviderError> {
        self.select(config, Some(overrides), overrides.pins_model(step_id)).await
    }

    async fn select(
        &self,
        config: &mut ModelConfig,
        overrides: Option<&GlobalOverrides>,
        model_pinned: bool,
    ) -> Result<Arc<dyn ModelProvider>, ProviderError> {
        if let Some(overrides) = overrides {
            overrides.apply_forced(config);
        }

        let requested = config.provider;
        let mut tried: Vec<String> = Vec::new();

        if let Some(provider) = self.get(requested) {
            tried.push(requested.to_string());
            if provider.check_availability().await {
                tracing::info!("[ModelSelector] using preferred provider {} ({})", requested, provider.name());
                return Ok(Arc::clone(provider));
            }
        }

        for kind in ProviderKind::FALLBACK_ORDER {
            if kind == requested {
                continue;
            }
            let Some(provider) = self.get(kind) else {
                continue;
            };
            tried.push(kind.to_string());
            if provider.check_availability().await {
                tracing::warn!(
                    "[ModelSelector] {} unavailable, falling back to {} ({})",
                    requested,
                    kind,
                    provider.name()
                );
                config.provider = kind;
                if !model_pinned && config.model != provider.default_model() {
                    tracing::info!(
                        "[ModelSelector] model {} belongs to {}, using {} on {}",
                        config.model,
                        requested,
                        provider.default_model(),
                        kind
                    );
                    config.model = provider.default_model().to_string();
                }
                return Ok(Arc::clone(provider));
            }
        }

        tracing::error!("[ModelSelector] No provider available (requested: {}, tried: {:?})", requested, tried);
        Err(ProviderError::NoProviderAvailable {
            requested: requested.to_string(),
            tried,
        })
    }

    /// Health of every registered provider, keyed by provider name.
    pub async fn provider_status(&self) -> BTreeMap<String, ProviderHealth> {
        let mut status = BTreeMap::new();
        for provider in &self.providers {
            status.insert(provider.name().to_string(), provider.check_health().await);
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::ModelConfig;
    use crate::providers::CompletionResponse;
    use async_trait::async_trait;

    struct FixedProvider {
        kind: ProviderKind,
        available: bool,
    }

    #[async_trait]
    impl ModelProvider for FixedProvider {
        fn name(&self) -> &str {
            self.kind.as_str()
        }

        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn default_model(&self) -> &str {
            match self.kind {
                ProviderKind::Local => "llama3.1:8b",
                ProviderKind::Remote => "openai/gpt-4o-mini",
            }
        }

        async fn generate_completion(
            &self,
            _prompt: &str,
            config: &ModelConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            Ok(CompletionResponse {
                content: "{}".to_string(),
                tokens_used: 1,
                provider: self.name().to_string(),
                model: config.model.clone(),
                processing_time_ms: 0,
            })
        }

        async fn check_health(&self) -> ProviderHealth {
            if self.available {
                ProviderHealth {
                    available: true,
                    ..Default::default()
                }
            } else {
                ProviderHealth::unavailable("down")
            }
        }

        async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
            Ok(vec![])
        }
    }

    fn selector(local_up: bool, remote_up: bool) -> ModelSelector {
        ModelSelector::new()
            .with_provider(Arc::new(FixedProvider {
                kind: ProviderKind::Local,
                available: local_up,
            }))
            .with_provider(Arc::new(FixedProvider {
                kind: ProviderKind::Remote,
                available: remote_up,
            }))
    }

    fn remote_config() -> ModelConfig {
        ModelConfig {
            provider: ProviderKind::Remote,
            model: "openai/gpt-4o-mini".to_string(),
            ..ModelConfig::default()
        }
    }

    #[tokio::test]
    async fn test_preferred_provider_used_when_available() {
        let mut config = remote_config();
        let provider = selector(true, true).select_provider(&mut config, None).await.unwrap();
        assert_eq!(provider.kind(), ProviderKind::Remote);
        assert_eq!(config.provider, ProviderKind::Remote);
    }

    #[tokio::test]
    async fn test_falls_back_and_updates_config() {
        let mut config = remote_config();
        let provider = selector(true, false).select_provider(&mut config, None).await.unwrap();
        assert_eq!(provider.kind(), ProviderKind::Local);
        assert_eq!(config.provider, ProviderKind::Local);
        assert_eq!(config.model, "llama3.1:8b");
    }

    #[tokio::test]
    async fn test_fallback_keeps_pinned_model() {
        let forced = GlobalOverrides {
            force_model: Some("openai/gpt-4o".to_string()),
            ..Default::default()
        };
        let mut config = remote_config();
        selector(true, false)
            .select_provider(&mut config, Some(&forced))
            .await
            .unwrap();
        assert_eq!(config.provider, ProviderKind::Local);
        assert_eq!(config.model, "openai/gpt-4o");

        let mut per_step = GlobalOverrides::default();
        per_step.step_overrides.insert(
            "assess_risks".to_string(),
            crate::models::overrides::StepOverride {
                model: Some("mistral:7b".to_string()),
                ..Default::default()
            },
        );
        let mut config = per_step.resolve("assess_risks", &remote_config());
        selector(true, false)
            .select_for_step("assess_risks", &mut config, &per_step)
            .await
            .unwrap();
        assert_eq!(config.provider, ProviderKind::Local);
        assert_eq!(config.model, "mistral:7b");

        // a step without its own model override still swaps
        let mut config = remote_config();
        selector(true, false)
            .select_for_step("summarize", &mut config, &per_step)
            .await
            .unwrap();
        assert_eq!(config.model, "llama3.1:8b");
    }

    #[tokio::test]
    async fn test_preferred_provider_keeps_requested_model() {
        let mut config = ModelConfig {
            provider: ProviderKind::Local,
            model: "qwen2.5:14b".to_string(),
            ..ModelConfig::default()
        };
        selector(true, true).select_provider(&mut config, None).await.unwrap();
        assert_eq!(config.model, "qwen2.5:14b");
    }

    #[tokio::test]
    async fn test_no_provider_available() {
        let mut config = remote_config();
        let err = selector(false, false)
            .select_provider(&mut config, None)
            .await
            .err()
            .unwrap();
        match err {
            ProviderError::NoProviderAvailable { requested, tried } => {
                assert_eq!(requested, "remote");
                assert_eq!(tried, vec!["remote", "local"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_force_overrides_applied_first() {
        let overrides = GlobalOverrides {
            force_provider: Some(ProviderKind::Local),
            force_model: Some("mistral:7b".to_string()),
            ..Default::default()
        };
        let mut config = remote_config();
        let provider = selector(true, true)
            .select_provider(&mut config, Some(&overrides))
            .await
            .unwrap();
        assert_eq!(provider.kind(), ProviderKind::Local);
        assert_eq!(config.model, "mistral:7b");
    }

    #[tokio::test]
    async fn test_unregistered_provider_falls_back() {
        let selector = ModelSelector::new().with_provider(Arc::new(FixedProvider {
            kind: ProviderKind::Local,
            available: true,
        }));
        let mut config = remote_config();
        let provider = selector.select_provider(&mut config, None).await.unwrap();
        assert_eq!(provider.kind(), ProviderKind::Local);
    }

    #[tokio::test]
    async fn test_provider_status_lists_all() {
        let status = selector(true, false).provider_status().await;
        assert_eq!(status.len(), 2);
        assert!(status["local"].available);
        assert!(!status["remote"].available);
    }
}
