//! Processing profile schema.
//!
//! A profile is a named, versioned sequence of LLM steps applied to a
//! transcript. Profiles are stored as JSON or YAML:
//!
//! ```yaml
//! profile_id: business_meeting
//! name: "Business Meeting Analysis"
//! description: "Extract entities, decisions, and action items"
//! version: "1.0.0"
//! steps:
//!   - step_id: extract_entities
//!     name: "Extract Key Entities"
//!     prompt_template: "Extract entities from:\n{transcript}"
//!     model_config:
//!       provider: local
//!       model: "llama3.1:8b"
//!       temperature: 0.1
//!   - step_id: analyze_decisions
//!     name: "Analyze Decisions"
//!     prompt_template: "Transcript: {transcript}\nEntities: {extract_entities}"
//! ```
//!
//! Values here are plain data; `profile::validation` enforces the invariants.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Which kind of backend serves a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local inference server (Ollama).
    #[serde(alias = "ollama")]
    Local,
    /// Remote API aggregator (OpenRouter).
    #[serde(alias = "openrouter")]
    Remote,
}

impl ProviderKind {
    /// Fixed fallback order used when the requested provider is down.
    pub const FALLBACK_ORDER: [ProviderKind; 2] = [ProviderKind::Local, ProviderKind::Remote];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "ollama" => Ok(Self::Local),
            "remote" | "openrouter" => Ok(Self::Remote),
            other => Err(format!("unknown provider '{}' (expected local or remote)", other)),
        }
    }
}

/// Model settings for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_provider() -> ProviderKind {
    ProviderKind::Local
}

fn default_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_temperature() -> f64 {
    0.2
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_timeout_seconds() -> u64 {
    30
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// How a step's raw completion is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

/// Expected top-level JSON type of a step output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    #[default]
    Object,
    Array,
    String,
}

/// Lightweight shape check applied to JSON step output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OutputSchema {
    #[serde(rename = "type", default)]
    pub schema_type: SchemaType,

    /// Keys that must be present when `type` is `object`.
    #[serde(default)]
    pub required_fields: Vec<String>,
}

/// A single LLM invocation inside a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStep {
    /// Unique slug; also the placeholder name later steps use (`{step_id}`)
    pub step_id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Must contain `{transcript}`; may contain `{<earlier step_id>}`
    pub prompt_template: String,

    #[serde(default, alias = "llm_config")]
    pub model_config: ModelConfig,

    #[serde(default)]
    pub output_format: OutputFormat,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<OutputSchema>,

    /// A failing required step aborts the run
    #[serde(default = "default_true")]
    pub required: bool,

    /// Expose this step's output to later steps
    #[serde(default = "default_true")]
    pub pass_to_next: bool,

    /// Keep this step's output in the final result; defaults to `pass_to_next`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_in_output: Option<bool>,

    /// Explicit ordering edges on top of the placeholder references
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl ProcessingStep {
    pub fn includes_in_output(&self) -> bool {
        self.include_in_output.unwrap_or(self.pass_to_next)
    }
}

/// Provenance information kept alongside a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProfileMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// "builtin", "file" or "user"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Top-level profile definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingProfile {
    pub profile_id: String,

    pub name: String,

    pub description: String,

    #[serde(default = "default_version")]
    pub version: String,

    pub steps: Vec<ProcessingStep>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_output_schema: Option<HashMap<String, serde_json::Value>>,

    /// Duplicates collapse; serialized sorted.
    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(default)]
    pub use_cases: Vec<String>,

    #[serde(default = "default_estimated_tokens")]
    pub estimated_tokens: u32,

    #[serde(default)]
    pub metadata: ProfileMetadata,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_estimated_tokens() -> u32 {
    1000
}

impl ProcessingProfile {
    /// Parse a profile from a JSON string (no validation).
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json).map_err(|e| ValidationError::Parse(e.to_string()))
    }

    /// Parse a profile from a YAML string (no validation).
    pub fn from_yaml(yaml: &str) -> Result<Self, ValidationError> {
        serde_yaml::from_str(yaml).map_err(|e| ValidationError::Parse(e.to_string()))
    }

    /// Parse a profile, picking the format from the file extension.
    pub fn from_source(source: &str, path: &Path) -> Result<Self, ValidationError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(source),
            _ => Self::from_json(source),
        }
    }

    pub fn get_step(&self, step_id: &str) -> Option<&ProcessingStep> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.step_id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_tags_collapse() {
        let json = r#"{
            "profile_id": "tagged",
            "name": "Tagged",
            "description": "Repeated tags",
            "tags": ["risk", "planning", "risk", "planning", "notes"],
            "steps": [
                {"step_id": "s", "name": "S", "prompt_template": "Summarize {transcript}"}
            ]
        }"#;
        let profile = ProcessingProfile::from_json(json).unwrap();
        let tags: Vec<&str> = profile.tags.iter().map(String::as_str).collect();
        assert_eq!(tags, vec!["notes", "planning", "risk"]);

        let back = serde_json::to_value(&profile).unwrap();
        assert_eq!(back["tags"], serde_json::json!(["notes", "planning", "risk"]));
    }

    #[test]
    fn test_parse_minimal_profile_applies_defaults() {
        let yaml = r#"
profile_id: quick
name: "Quick"
description: "One step"
steps:
  - step_id: summarize
    name: "Summarize"
    prompt_template: "Summarize this: {transcript}"
"#;
        let profile = ProcessingProfile::from_yaml(yaml).unwrap();
        assert_eq!(profile.version, "1.0.0");
        assert_eq!(profile.estimated_tokens, 1000);

        let step = &profile.steps[0];
        assert!(step.required);
        assert!(step.pass_to_next);
        assert!(step.includes_in_output());
        assert_eq!(step.output_format, OutputFormat::Json);
        assert_eq!(step.model_config, ModelConfig::default());
    }

    #[test]
    fn test_parse_accepts_original_field_names() {
        let json = r#"{
            "profile_id": "legacy",
            "name": "Legacy",
            "description": "Uses llm_config and openrouter",
            "steps": [{
                "step_id": "risks",
                "name": "Risks",
                "prompt_template": "Find risks in {transcript}",
                "llm_config": {"provider": "openrouter", "model": "openai/gpt-4o-mini"},
                "output_format": "text",
                "pass_to_next": false
            }]
        }"#;
        let profile = ProcessingProfile::from_json(json).unwrap();
        let step = &profile.steps[0];
        assert_eq!(step.model_config.provider, ProviderKind::Remote);
        assert_eq!(step.model_config.model, "openai/gpt-4o-mini");
        assert_eq!(step.output_format, OutputFormat::Text);
        assert!(!step.includes_in_output());
    }

    #[test]
    fn test_include_in_output_overrides_pass_to_next() {
        let mut step: ProcessingStep = serde_json::from_value(serde_json::json!({
            "step_id": "notes",
            "name": "Notes",
            "prompt_template": "Notes for {transcript}",
            "pass_to_next": false,
            "include_in_output": true
        }))
        .unwrap();
        assert!(step.includes_in_output());
        step.include_in_output = None;
        assert!(!step.includes_in_output());
    }

    #[test]
    fn test_provider_kind_from_str() {
        assert_eq!("ollama".parse::<ProviderKind>().unwrap(), ProviderKind::Local);
        assert_eq!("Remote".parse::<ProviderKind>().unwrap(), ProviderKind::Remote);
        assert!("azure".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_malformed_source_is_parse_error() {
        let err = ProcessingProfile::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ValidationError::Parse(_)));
    }
}
