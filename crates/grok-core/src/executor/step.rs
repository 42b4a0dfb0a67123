//! Single-step execution: interpolate, sanitize, select, call, parse.
//!
//! ```text
//! template + context ──► interpolate ──► sanitize ──► ModelSelector ──► provider
//!                                                         ▲               │
//!                                                         └── retry ◄─────┤ transient error
//!                                                                         ▼
//!                                                               parse / schema check
//! ```
//!
//! Only transient provider failures (timeout, connection, rate limit, empty
//! response, 5xx) are retried. Invalid output, authentication failures and
//! `NoProviderAvailable` fail on the spot.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::{ProviderError, StepExecutionError, StepFailure};
use crate::executor::context::ExecutionContext;
use crate::executor::output::parse_output;
use crate::interpolation::interpolate;
use crate::models::overrides::GlobalOverrides;
use crate::models::profile::{ModelConfig, ProcessingStep};
use crate::models::result::StepResult;
use crate::providers::ModelSelector;
use crate::sanitize::sanitize;

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = `max_retries + 1`
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(8000),
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// `base * 2^(retry-1)`, raised to a provider's `Retry-After` hint, and
    /// never above `max_delay`.
    pub fn delay_for(&self, retry: u32, retry_after: Option<u64>) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        let backoff = self.base_delay.saturating_mul(factor);
        let hinted = retry_after
            .map(Duration::from_secs)
            .map_or(backoff, |hint| hint.max(backoff));
        hinted.min(self.max_delay)
    }
}

pub struct StepExecutor {
    selector: ModelSelector,
    retry: RetryPolicy,
}

impl StepExecutor {
    pub fn new(selector: ModelSelector, retry: RetryPolicy) -> Self {
        Self { selector, retry }
    }

    pub fn selector(&self) -> &ModelSelector {
        &self.selector
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Run `step` against the outputs gathered so far in `context`.
    pub async fn execute_step(
        &self,
        step: &ProcessingStep,
        context: &ExecutionContext,
        overrides: &GlobalOverrides,
    ) -> Result<StepResult, StepExecutionError> {
        let fail = |attempts: u32, cause: StepFailure| StepExecutionError {
            step_id: step.step_id.clone(),
            attempts,
            cause,
        };

        let prompt = self
            .build_prompt(step, context)
            .map_err(|missing| fail(0, StepFailure::MissingVariable(missing)))?;
        let resolved = overrides.resolve(&step.step_id, &step.model_config);

        let max_attempts = self.retry.max_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            tracing::debug!(
                "[StepExecutor] {} attempt {}/{} (requested: {}/{})",
                step.step_id,
                attempt,
                max_attempts,
                resolved.provider,
                resolved.model
            );

            let mut config = resolved.clone();
            let err = match self.call_provider(&step.step_id, &prompt, &mut config, overrides).await {
                Ok(response) => {
                    let content = parse_output(
                        &response.content,
                        step.output_format,
                        step.output_schema.as_ref(),
                    )
                    .map_err(|reason| fail(attempt, StepFailure::InvalidStepOutput(reason)))?;

                    tracing::info!(
                        "[StepExecutor] {} completed via {} ({} tokens, {} retries)",
                        step.step_id,
                        response.provider,
                        response.tokens_used,
                        attempt - 1
                    );
                    return Ok(StepResult {
                        content,
                        tokens_used: response.tokens_used,
                        provider: response.provider,
                        model: response.model,
                        retries: attempt - 1,
                    });
                }
                Err(err) => err,
            };

            if !err.is_transient() || attempt >= max_attempts {
                return Err(fail(attempt, StepFailure::Provider(err)));
            }

            let retry_after = match &err {
                ProviderError::RateLimited { retry_after, .. } => *retry_after,
                _ => None,
            };
            let delay = self.retry.delay_for(attempt, retry_after);
            tracing::warn!(
                "[StepExecutor] {} attempt {} failed ({}), retrying in {}ms",
                step.step_id,
                attempt,
                err,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Interpolate the template with sanitized variables and sanitize the result.
    fn build_prompt(&self, step: &ProcessingStep, context: &ExecutionContext) -> Result<String, String> {
        let variables: HashMap<String, String> = context
            .variables()
            .into_iter()
            .map(|(k, v)| (k, sanitize(&v)))
            .collect();
        let prompt = interpolate(&step.prompt_template, &variables)?;
        Ok(sanitize(&prompt))
    }

    async fn call_provider(
        &self,
        step_id: &str,
        prompt: &str,
        config: &mut ModelConfig,
        overrides: &GlobalOverrides,
    ) -> Result<crate::providers::CompletionResponse, ProviderError> {
        let provider = self.selector.select_for_step(step_id, config, overrides).await?;
        let limit = Duration::from_secs(config.timeout_seconds);
        let started = Instant::now();

        match tokio::time::timeout(limit, provider.generate_completion(prompt, config)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    "[StepExecutor] {} exceeded {}s after {}ms",
                    provider.name(),
                    config.timeout_seconds,
                    started.elapsed().as_millis()
                );
                Err(ProviderError::Timeout {
                    provider: provider.name().to_string(),
                    seconds: config.timeout_seconds,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(3000),
        };
        assert_eq!(policy.max_attempts(), 6);
        assert_eq!(policy.delay_for(1, None), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2, None), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3, None), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(4, None), Duration::from_millis(3000));
        assert_eq!(policy.delay_for(40, None), Duration::from_millis(3000));
    }

    #[test]
    fn test_retry_after_raises_delay_within_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1, Some(2)), Duration::from_secs(2));
        assert_eq!(policy.delay_for(1, Some(60)), Duration::from_millis(8000));
        assert_eq!(policy.delay_for(3, Some(0)), Duration::from_millis(2000));
    }
}
