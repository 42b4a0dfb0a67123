//! Engine settings read from `GROK_*` environment variables.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::executor::RetryPolicy;
use crate::providers::openrouter::{self, OpenRouterConfig};
use crate::providers::ollama;
use crate::providers::{ModelSelector, OllamaProvider, OpenRouterProvider};

pub const ENV_OLLAMA_URL: &str = "GROK_OLLAMA_URL";
pub const ENV_OLLAMA_MODEL: &str = "GROK_OLLAMA_MODEL";
pub const ENV_OPENROUTER_API_KEY: &str = "GROK_OPENROUTER_API_KEY";
pub const ENV_OPENROUTER_URL: &str = "GROK_OPENROUTER_URL";
pub const ENV_OPENROUTER_APP_NAME: &str = "GROK_OPENROUTER_APP_NAME";
pub const ENV_OPENROUTER_APP_URL: &str = "GROK_OPENROUTER_APP_URL";
pub const ENV_OPENROUTER_MODEL: &str = "GROK_OPENROUTER_MODEL";
pub const ENV_PROFILES_DIR: &str = "GROK_PROFILES_DIR";
pub const ENV_MAX_CONCURRENT_JOBS: &str = "GROK_MAX_CONCURRENT_JOBS";
pub const ENV_MAX_RETRIES: &str = "GROK_MAX_RETRIES";
pub const ENV_RETRY_BASE_DELAY_MS: &str = "GROK_RETRY_BASE_DELAY_MS";
pub const ENV_RETRY_MAX_DELAY_MS: &str = "GROK_RETRY_MAX_DELAY_MS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Model a step gets when it falls back to the local provider
    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,

    #[serde(default, skip_serializing)]
    pub openrouter_api_key: Option<String>,

    #[serde(default = "default_openrouter_url")]
    pub openrouter_url: String,

    #[serde(default = "default_app_name")]
    pub openrouter_app_name: String,

    #[serde(default)]
    pub openrouter_app_url: Option<String>,

    /// Model a step gets when it falls back to the remote provider
    #[serde(default = "default_openrouter_model")]
    pub openrouter_model: String,

    #[serde(default = "default_profiles_dir")]
    pub profiles_dir: PathBuf,

    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    ollama::DEFAULT_MODEL.to_string()
}

fn default_openrouter_model() -> String {
    openrouter::DEFAULT_MODEL.to_string()
}

fn default_openrouter_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_app_name() -> String {
    "grok-intelligence-engine".to_string()
}

fn default_profiles_dir() -> PathBuf {
    PathBuf::from("./profiles")
}

fn default_max_concurrent_jobs() -> usize {
    5
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    8000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ollama_url: default_ollama_url(),
            ollama_model: default_ollama_model(),
            openrouter_api_key: None,
            openrouter_url: default_openrouter_url(),
            openrouter_app_name: default_app_name(),
            openrouter_app_url: None,
            openrouter_model: default_openrouter_model(),
            profiles_dir: default_profiles_dir(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; unset or blank variables keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut settings = Self::default();

        if let Some(v) = get(ENV_OLLAMA_URL) {
            settings.ollama_url = v;
        }
        if let Some(v) = get(ENV_OLLAMA_MODEL) {
            settings.ollama_model = v;
        }
        settings.openrouter_api_key = get(ENV_OPENROUTER_API_KEY);
        if let Some(v) = get(ENV_OPENROUTER_URL) {
            settings.openrouter_url = v;
        }
        if let Some(v) = get(ENV_OPENROUTER_APP_NAME) {
            settings.openrouter_app_name = v;
        }
        settings.openrouter_app_url = get(ENV_OPENROUTER_APP_URL);
        if let Some(v) = get(ENV_OPENROUTER_MODEL) {
            settings.openrouter_model = v;
        }
        if let Some(v) = get(ENV_PROFILES_DIR) {
            settings.profiles_dir = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_MAX_CONCURRENT_JOBS) {
            settings.max_concurrent_jobs = parse_number(ENV_MAX_CONCURRENT_JOBS, &v)?;
            if settings.max_concurrent_jobs == 0 {
                return Err(ConfigError::InvalidValue {
                    var: ENV_MAX_CONCURRENT_JOBS.to_string(),
                    value: v,
                    message: "must be at least 1".to_string(),
                });
            }
        }
        if let Some(v) = get(ENV_MAX_RETRIES) {
            settings.max_retries = parse_number(ENV_MAX_RETRIES, &v)?;
        }
        if let Some(v) = get(ENV_RETRY_BASE_DELAY_MS) {
            settings.retry_base_delay_ms = parse_number(ENV_RETRY_BASE_DELAY_MS, &v)?;
        }
        if let Some(v) = get(ENV_RETRY_MAX_DELAY_MS) {
            settings.retry_max_delay_ms = parse_number(ENV_RETRY_MAX_DELAY_MS, &v)?;
        }
        Ok(settings)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms.max(self.retry_base_delay_ms)),
        }
    }

    pub fn openrouter_config(&self) -> OpenRouterConfig {
        OpenRouterConfig {
            api_key: self.openrouter_api_key.clone().unwrap_or_default(),
            base_url: self.openrouter_url.clone(),
            app_name: Some(self.openrouter_app_name.clone()),
            app_url: self.openrouter_app_url.clone(),
            default_model: self.openrouter_model.clone(),
        }
    }

    /// Selector with the local and remote providers these settings describe.
    pub fn build_selector(&self) -> ModelSelector {
        ModelSelector::new()
            .with_provider(Arc::new(
                OllamaProvider::new(self.ollama_url.clone()).with_default_model(self.ollama_model.clone()),
            ))
            .with_provider(Arc::new(OpenRouterProvider::new(self.openrouter_config())))
    }
}

fn parse_number<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        var: var.to_string(),
        value: value.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::ProviderKind;
    use crate::providers::ModelProvider;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.retry_policy(), RetryPolicy::default());
        assert!(settings.openrouter_api_key.is_none());
    }

    #[test]
    fn test_values_read_and_trimmed() {
        let settings = Settings::from_lookup(lookup(&[
            (ENV_OLLAMA_URL, " http://gpu-box:11434 "),
            (ENV_OPENROUTER_API_KEY, "sk-test"),
            (ENV_MAX_CONCURRENT_JOBS, "2"),
            (ENV_MAX_RETRIES, "0"),
            (ENV_OPENROUTER_APP_URL, ""),
        ]))
        .unwrap();
        assert_eq!(settings.ollama_url, "http://gpu-box:11434");
        assert_eq!(settings.openrouter_api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.max_concurrent_jobs, 2);
        assert_eq!(settings.retry_policy().max_attempts(), 1);
        assert!(settings.openrouter_app_url.is_none());
    }

    #[test]
    fn test_fallback_models_reach_providers() {
        let settings = Settings::from_lookup(lookup(&[
            (ENV_OLLAMA_MODEL, "qwen2.5:14b"),
            (ENV_OPENROUTER_MODEL, "anthropic/claude-3-haiku"),
        ]))
        .unwrap();
        let selector = settings.build_selector();
        let local = selector.get(ProviderKind::Local).unwrap();
        let remote = selector.get(ProviderKind::Remote).unwrap();
        assert_eq!(local.default_model(), "qwen2.5:14b");
        assert_eq!(remote.default_model(), "anthropic/claude-3-haiku");

        let defaults = Settings::default();
        assert_eq!(defaults.ollama_model, "llama3.1:8b");
        assert_eq!(defaults.openrouter_model, "openai/gpt-4o-mini");
    }

    #[test]
    fn test_malformed_number_is_error() {
        let err = Settings::from_lookup(lookup(&[(ENV_MAX_RETRIES, "lots")])).unwrap_err();
        assert!(err.to_string().contains(ENV_MAX_RETRIES));
        assert!(Settings::from_lookup(lookup(&[(ENV_MAX_CONCURRENT_JOBS, "0")])).is_err());
    }

    #[test]
    fn test_api_key_never_serialized() {
        let settings = Settings {
            openrouter_api_key: Some("sk-secret".to_string()),
            ..Settings::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
