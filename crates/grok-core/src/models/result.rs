//! Step and profile results.

use serde::{Deserialize, Serialize};

/// Output of one successful step invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Parsed JSON for `json` steps, a string for `text` steps
    pub content: serde_json::Value,
    pub tokens_used: u64,
    /// Provider that actually served the call (after fallback)
    pub provider: String,
    pub model: String,
    /// Retries beyond the first attempt
    pub retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Completed,
    Skipped,
    Failed,
}

/// Per-step line in the run metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    pub step_id: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub tokens_used: u64,
    pub retries: u32,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub profile_id: String,
    pub steps_completed: usize,
    pub total_tokens: u64,
    pub processing_time_ms: u64,

    pub run_id: String,
    pub profile_name: String,
    pub profile_version: String,
    pub steps_failed: usize,
    /// RFC 3339 timestamp
    pub completed_at: String,
    pub step_summary: Vec<StepSummary>,
}

/// Final bundle returned for a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileResult {
    /// step_id → content, for steps kept in the output
    pub result: serde_json::Map<String, serde_json::Value>,
    pub metadata: ExecutionMetadata,
}

impl ProfileResult {
    pub fn get(&self, step_id: &str) -> Option<&serde_json::Value> {
        self.result.get(step_id)
    }
}
