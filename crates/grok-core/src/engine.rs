//! Engine facade: repository + executor + concurrency ceiling.
//!
//! ```text
//! AnalysisRequest ──► Engine ──► permit (Semaphore) ──► ProfileRepository::load_profile
//!                                                   └─► ProfileExecutor::execute_profile
//! ```
//!
//! `run` queues for a permit; `try_run` rejects with [`EngineError::Busy`]
//! when all `max_concurrent_jobs` permits are taken.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::error::{EngineError, ValidationError};
use crate::executor::{ProfileExecutor, StepExecutor};
use crate::models::overrides::GlobalOverrides;
use crate::models::result::ProfileResult;
use crate::profile::repository::{FileProfileRepository, ProfileRepository};
use crate::providers::{ModelSelector, ProviderHealth};

/// One analysis job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub profile_id: String,
    pub transcript: String,
    #[serde(default)]
    pub overrides: GlobalOverrides,
}

impl AnalysisRequest {
    pub fn new(profile_id: impl Into<String>, transcript: impl Into<String>) -> Self {
        Self {
            profile_id: profile_id.into(),
            transcript: transcript.into(),
            overrides: GlobalOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: GlobalOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

pub struct Engine {
    repository: Arc<dyn ProfileRepository>,
    executor: ProfileExecutor,
    permits: Semaphore,
    max_concurrent_jobs: usize,
}

impl Engine {
    pub fn new(
        repository: Arc<dyn ProfileRepository>,
        executor: ProfileExecutor,
        max_concurrent_jobs: usize,
    ) -> Self {
        let max_concurrent_jobs = max_concurrent_jobs.max(1);
        Self {
            repository,
            executor,
            permits: Semaphore::new(max_concurrent_jobs),
            max_concurrent_jobs,
        }
    }

    /// Engine wired to the file repository and HTTP providers from `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        let repository = Arc::new(FileProfileRepository::new(settings.profiles_dir.clone()));
        let steps = StepExecutor::new(settings.build_selector(), settings.retry_policy());
        Self::new(repository, ProfileExecutor::new(steps), settings.max_concurrent_jobs)
    }

    pub fn repository(&self) -> &Arc<dyn ProfileRepository> {
        &self.repository
    }

    pub fn selector(&self) -> &ModelSelector {
        self.executor.step_executor().selector()
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.max_concurrent_jobs
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run a request, waiting for capacity if needed.
    pub async fn run(&self, request: &AnalysisRequest) -> Result<ProfileResult, EngineError> {
        self.run_with_cancellation(request, &CancellationToken::new()).await
    }

    /// Run a request only if capacity is free right now.
    pub async fn try_run(&self, request: &AnalysisRequest) -> Result<ProfileResult, EngineError> {
        let permit = self.permits.try_acquire().map_err(|_| {
            tracing::warn!(
                "[Engine] Rejecting run of {}: {} jobs in flight",
                request.profile_id,
                self.max_concurrent_jobs
            );
            EngineError::Busy {
                limit: self.max_concurrent_jobs,
            }
        })?;
        self.execute(request, &CancellationToken::new(), permit).await
    }

    /// Run a request that stops before its next step once `cancel` fires.
    pub async fn run_with_cancellation(
        &self,
        request: &AnalysisRequest,
        cancel: &CancellationToken,
    ) -> Result<ProfileResult, EngineError> {
        let permit = self.permits.acquire().await.map_err(|_| EngineError::Busy {
            limit: self.max_concurrent_jobs,
        })?;
        self.execute(request, cancel, permit).await
    }

    pub async fn provider_status(&self) -> BTreeMap<String, ProviderHealth> {
        self.selector().provider_status().await
    }

    async fn execute(
        &self,
        request: &AnalysisRequest,
        cancel: &CancellationToken,
        _permit: SemaphorePermit<'_>,
    ) -> Result<ProfileResult, EngineError> {
        if request.transcript.trim().is_empty() {
            return Err(ValidationError::field("transcript", "must not be empty").into());
        }
        let profile = self.repository.load_profile(&request.profile_id)?;
        request.overrides.validate(&profile.step_ids())?;

        let result = self
            .executor
            .execute_profile_with_cancellation(&profile, &request.transcript, Some(&request.overrides), cancel)
            .await?;
        Ok(result)
    }
}
