//! Per-run execution state.

use std::collections::HashMap;
use std::time::Instant;

use serde_json::Value;

use crate::error::StepExecutionError;
use crate::interpolation::render_value;
use crate::models::profile::ProcessingStep;
use crate::models::result::{StepResult, StepStatus, StepSummary};
use crate::profile::validation::TRANSCRIPT_VAR;
use crate::providers::elapsed_ms;

/// Everything one profile run knows. Created at the start of a run, owned by
/// that run alone, and dropped when it ends.
#[derive(Debug)]
pub struct ExecutionContext {
    pub run_id: String,
    pub profile_id: String,
    transcript: String,
    /// Outputs of completed steps with `pass_to_next`
    available: HashMap<String, Value>,
    /// Outputs of completed steps kept in the final result
    included: serde_json::Map<String, Value>,
    pub steps_completed: usize,
    pub steps_failed: usize,
    pub total_tokens: u64,
    started: Instant,
    summaries: Vec<StepSummary>,
}

impl ExecutionContext {
    pub fn new(profile_id: impl Into<String>, transcript: impl Into<String>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            profile_id: profile_id.into(),
            transcript: transcript.into(),
            available: HashMap::new(),
            included: serde_json::Map::new(),
            steps_completed: 0,
            steps_failed: 0,
            total_tokens: 0,
            started: Instant::now(),
            summaries: Vec::new(),
        }
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Output of an earlier step, if it completed and passes its output on.
    pub fn output(&self, step_id: &str) -> Option<&Value> {
        self.available.get(step_id)
    }

    /// Prompt variables: the transcript plus every available step output,
    /// each rendered to text.
    pub fn variables(&self) -> HashMap<String, String> {
        let mut vars: HashMap<String, String> = self
            .available
            .iter()
            .map(|(k, v)| (k.clone(), render_value(v)))
            .collect();
        vars.insert(TRANSCRIPT_VAR.to_string(), self.transcript.clone());
        vars
    }

    pub fn record_success(&mut self, step: &ProcessingStep, result: StepResult, duration_ms: u64) {
        self.steps_completed += 1;
        self.total_tokens += result.tokens_used;
        self.summaries.push(StepSummary {
            step_id: step.step_id.clone(),
            status: StepStatus::Completed,
            provider: Some(result.provider),
            model: Some(result.model),
            tokens_used: result.tokens_used,
            retries: result.retries,
            duration_ms,
            error: None,
        });

        if step.includes_in_output() {
            self.included.insert(step.step_id.clone(), result.content.clone());
        }
        if step.pass_to_next {
            self.available.insert(step.step_id.clone(), result.content);
        }
    }

    pub fn record_failure(
        &mut self,
        step: &ProcessingStep,
        error: &StepExecutionError,
        status: StepStatus,
        duration_ms: u64,
    ) {
        self.steps_failed += 1;
        self.summaries.push(StepSummary {
            step_id: step.step_id.clone(),
            status,
            provider: None,
            model: None,
            tokens_used: 0,
            retries: error.attempts.saturating_sub(1),
            duration_ms,
            error: Some(error.cause.to_string()),
        });
    }

    pub fn elapsed_ms(&self) -> u64 {
        elapsed_ms(self.started)
    }

    pub fn summaries(&self) -> &[StepSummary] {
        &self.summaries
    }

    /// Consume the context, yielding the final result map and step summaries.
    pub fn into_parts(self) -> (serde_json::Map<String, Value>, Vec<StepSummary>) {
        (self.included, self.summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepFailure;
    use serde_json::json;

    fn step(id: &str, pass_to_next: bool, include: Option<bool>) -> ProcessingStep {
        let mut step: ProcessingStep = serde_json::from_value(json!({
            "step_id": id,
            "name": id,
            "prompt_template": "Analyze {transcript}",
        }))
        .unwrap();
        step.pass_to_next = pass_to_next;
        step.include_in_output = include;
        step
    }

    fn result(content: Value, tokens: u64) -> StepResult {
        StepResult {
            content,
            tokens_used: tokens,
            provider: "ollama".to_string(),
            model: "llama3.1:8b".to_string(),
            retries: 0,
        }
    }

    #[test]
    fn test_variables_include_transcript_and_passed_outputs() {
        let mut ctx = ExecutionContext::new("p", "John: ship Friday");
        ctx.record_success(&step("a", true, None), result(json!({"x": 1}), 10), 5);
        ctx.record_success(&step("hidden", false, Some(true)), result(json!("h"), 5), 5);

        let vars = ctx.variables();
        assert_eq!(vars["transcript"], "John: ship Friday");
        assert!(vars["a"].contains("\"x\": 1"));
        assert!(!vars.contains_key("hidden"));

        assert_eq!(ctx.steps_completed, 2);
        assert_eq!(ctx.total_tokens, 15);
        let (included, summaries) = ctx.into_parts();
        assert_eq!(included.len(), 2);
        assert_eq!(summaries.len(), 2);
    }

    #[test]
    fn test_failure_recorded_without_output() {
        let mut ctx = ExecutionContext::new("p", "t");
        let s = step("opt", true, None);
        let err = StepExecutionError {
            step_id: "opt".to_string(),
            attempts: 3,
            cause: StepFailure::InvalidStepOutput("bad".to_string()),
        };
        ctx.record_failure(&s, &err, StepStatus::Failed, 1);
        assert!(ctx.output("opt").is_none());
        assert_eq!(ctx.steps_failed, 1);
        assert_eq!(ctx.summaries()[0].retries, 2);
    }

    #[test]
    fn test_each_context_gets_a_fresh_run_id() {
        assert_ne!(ExecutionContext::new("p", "t").run_id, ExecutionContext::new("p", "t").run_id);
    }
}
