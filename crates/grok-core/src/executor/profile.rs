//! Whole-profile execution.
//!
//! Steps run one at a time in dependency order. A required step's failure
//! ends the run with no partial result; an optional step's failure is logged
//! and its key is left out of the result. Cancellation is checked between
//! steps.

use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::error::{ProfileExecutionError, StepFailure};
use crate::executor::context::ExecutionContext;
use crate::executor::step::StepExecutor;
use crate::models::overrides::GlobalOverrides;
use crate::models::profile::ProcessingProfile;
use crate::models::result::{ExecutionMetadata, ProfileResult, StepStatus};
use crate::profile::validation::execution_order;
use crate::providers::elapsed_ms;

pub struct ProfileExecutor {
    steps: StepExecutor,
}

impl ProfileExecutor {
    pub fn new(steps: StepExecutor) -> Self {
        Self { steps }
    }

    pub fn step_executor(&self) -> &StepExecutor {
        &self.steps
    }

    /// Run `profile` over `transcript` to completion.
    pub async fn execute_profile(
        &self,
        profile: &ProcessingProfile,
        transcript: &str,
        overrides: Option<&GlobalOverrides>,
    ) -> Result<ProfileResult, ProfileExecutionError> {
        self.execute_profile_with_cancellation(profile, transcript, overrides, &CancellationToken::new())
            .await
    }

    /// Like [`execute_profile`](Self::execute_profile), stopping before the
    /// next step once `cancel` fires.
    pub async fn execute_profile_with_cancellation(
        &self,
        profile: &ProcessingProfile,
        transcript: &str,
        overrides: Option<&GlobalOverrides>,
        cancel: &CancellationToken,
    ) -> Result<ProfileResult, ProfileExecutionError> {
        let invalid = |source| ProfileExecutionError::InvalidProfile {
            profile_id: profile.profile_id.clone(),
            source,
        };

        let default_overrides = GlobalOverrides::default();
        let overrides = overrides.unwrap_or(&default_overrides);
        overrides.validate(&profile.step_ids()).map_err(invalid)?;
        let order = execution_order(profile).map_err(invalid)?;

        let mut ctx = ExecutionContext::new(&profile.profile_id, transcript);
        tracing::info!(
            run_id = %ctx.run_id,
            profile_id = %profile.profile_id,
            steps = order.len(),
            "[ProfileExecutor] Starting run"
        );

        for (position, &index) in order.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(
                    run_id = %ctx.run_id,
                    "[ProfileExecutor] Cancelled before step {}/{}",
                    position + 1,
                    order.len()
                );
                return Err(ProfileExecutionError::Cancelled {
                    profile_id: profile.profile_id.clone(),
                    steps_completed: ctx.steps_completed,
                });
            }

            let step = &profile.steps[index];
            tracing::info!(
                run_id = %ctx.run_id,
                "[ProfileExecutor] Step {}/{}: {}",
                position + 1,
                order.len(),
                step.step_id
            );

            let started = Instant::now();
            match self.steps.execute_step(step, &ctx, overrides).await {
                Ok(result) => {
                    ctx.record_success(step, result, elapsed_ms(started));
                }
                Err(err) if step.required => {
                    tracing::error!(
                        run_id = %ctx.run_id,
                        "[ProfileExecutor] Required step {} failed: {}",
                        step.step_id,
                        err
                    );
                    return Err(ProfileExecutionError::StepFailed {
                        profile_id: profile.profile_id.clone(),
                        source: err,
                    });
                }
                Err(err) => {
                    let status = match err.cause {
                        StepFailure::MissingVariable(_) => StepStatus::Skipped,
                        _ => StepStatus::Failed,
                    };
                    tracing::warn!(
                        run_id = %ctx.run_id,
                        "[ProfileExecutor] Optional step {} did not complete, continuing: {}",
                        step.step_id,
                        err
                    );
                    ctx.record_failure(step, &err, status, elapsed_ms(started));
                }
            }
        }

        let processing_time_ms = ctx.elapsed_ms();
        tracing::info!(
            run_id = %ctx.run_id,
            profile_id = %profile.profile_id,
            steps_completed = ctx.steps_completed,
            steps_failed = ctx.steps_failed,
            total_tokens = ctx.total_tokens,
            processing_time_ms,
            "[ProfileExecutor] Run finished"
        );

        let run_id = ctx.run_id.clone();
        let steps_completed = ctx.steps_completed;
        let steps_failed = ctx.steps_failed;
        let total_tokens = ctx.total_tokens;
        let (result, step_summary) = ctx.into_parts();

        Ok(ProfileResult {
            result,
            metadata: ExecutionMetadata {
                profile_id: profile.profile_id.clone(),
                steps_completed,
                total_tokens,
                processing_time_ms,
                run_id,
                profile_name: profile.name.clone(),
                profile_version: profile.version.clone(),
                steps_failed,
                completed_at: chrono::Utc::now().to_rfc3339(),
                step_summary,
            },
        })
    }
}
