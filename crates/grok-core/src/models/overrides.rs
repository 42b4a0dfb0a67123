//! Caller-supplied runtime overrides.
//!
//! Overrides never touch the profile: `resolve` returns a fresh
//! `ModelConfig` for each step invocation, so concurrent runs of the same
//! profile with different overrides stay isolated.
//!
//! Precedence, lowest to highest:
//! 1. the step's own `model_config`
//! 2. `global_temperature` / `global_max_tokens` / `global_timeout_seconds`
//! 3. `step_overrides[step_id]`
//! 4. `force_provider` / `force_model`

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::models::profile::{ModelConfig, ProviderKind};

/// Per-step override; unset fields keep the lower-precedence value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StepOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

/// Overrides for a single profile run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GlobalOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_provider: Option<ProviderKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub step_overrides: HashMap<String, StepOverride>,
}

impl GlobalOverrides {
    /// Effective model configuration for `step_id`.
    pub fn resolve(&self, step_id: &str, base: &ModelConfig) -> ModelConfig {
        let mut config = base.clone();

        if let Some(t) = self.global_temperature {
            config.temperature = t;
        }
        if let Some(n) = self.global_max_tokens {
            config.max_tokens = n;
        }
        if let Some(s) = self.global_timeout_seconds {
            config.timeout_seconds = s;
        }

        if let Some(step) = self.step_overrides.get(step_id) {
            if let Some(p) = step.provider {
                config.provider = p;
            }
            if let Some(ref m) = step.model {
                config.model = m.clone();
            }
            if let Some(t) = step.temperature {
                config.temperature = t;
            }
            if let Some(n) = step.max_tokens {
                config.max_tokens = n;
            }
            if let Some(s) = step.timeout_seconds {
                config.timeout_seconds = s;
            }
        }

        self.apply_forced(&mut config);
        config
    }

    /// Apply only `force_provider` / `force_model`.
    pub fn apply_forced(&self, config: &mut ModelConfig) {
        if let Some(p) = self.force_provider {
            config.provider = p;
        }
        if let Some(ref m) = self.force_model {
            config.model = m.clone();
        }
    }

    /// Whether the caller chose the model for `step_id` explicitly, through
    /// `force_model` or a step override.
    pub fn pins_model(&self, step_id: &str) -> bool {
        self.force_model.is_some()
            || self
                .step_overrides
                .get(step_id)
                .is_some_and(|step| step.model.is_some())
    }

    /// Range-check every numeric override and reject unknown step ids.
    pub fn validate(&self, step_ids: &[&str]) -> Result<(), ValidationError> {
        check_numbers(
            "global",
            self.global_temperature,
            self.global_max_tokens,
            self.global_timeout_seconds,
        )?;
        if matches!(self.force_model.as_deref(), Some(m) if m.trim().is_empty()) {
            return Err(invalid("force_model", "must not be empty"));
        }

        for (step_id, step) in &self.step_overrides {
            if !step_ids.contains(&step_id.as_str()) {
                return Err(invalid(
                    format!("step_overrides.{}", step_id),
                    "no such step in profile",
                ));
            }
            check_numbers(
                &format!("step_overrides.{}", step_id),
                step.temperature,
                step.max_tokens,
                step.timeout_seconds,
            )?;
        }
        Ok(())
    }
}

fn check_numbers(
    scope: &str,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    timeout_seconds: Option<u64>,
) -> Result<(), ValidationError> {
    if let Some(t) = temperature {
        if !(0.0..=2.0).contains(&t) {
            return Err(invalid(format!("{}.temperature", scope), "must be between 0 and 2"));
        }
    }
    if let Some(n) = max_tokens {
        if n == 0 {
            return Err(invalid(format!("{}.max_tokens", scope), "must be positive"));
        }
    }
    if let Some(s) = timeout_seconds {
        if s == 0 {
            return Err(invalid(format!("{}.timeout_seconds", scope), "must be positive"));
        }
    }
    Ok(())
}

fn invalid(field: impl Into<String>, message: &str) -> ValidationError {
    ValidationError::InvalidOverride {
        field: field.into(),
        message: message.to_string(),
    }
}
