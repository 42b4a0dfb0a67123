//! Grok Core — profile-driven LLM orchestration for transcript analysis.
//!
//! A *profile* is a named, versioned list of LLM steps. Running a profile
//! over a transcript:
//!
//! 1. Validates the profile and orders its steps by their `{step_id}`
//!    references (stable topological order)
//! 2. Interpolates each step's prompt from the transcript and earlier outputs
//! 3. Sanitizes the prompt and picks a provider, falling back when the
//!    requested one is down
//! 4. Retries transient provider failures with exponential backoff
//! 5. Parses and checks the output, then aggregates results and metadata
//!
//! The crate is transport-agnostic: HTTP servers, CLIs and tests all drive
//! it through [`Engine`] or [`ProfileExecutor`] directly.

pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod interpolation;
pub mod models;
pub mod profile;
pub mod providers;
pub mod sanitize;

// Convenience re-exports
pub use config::Settings;
pub use engine::{AnalysisRequest, Engine};
pub use error::{
    ConfigError, EngineError, ErrorResponse, ProfileExecutionError, ProviderError,
    RepositoryError, StepExecutionError, StepFailure, ValidationError,
};
pub use executor::{ExecutionContext, ProfileExecutor, RetryPolicy, StepExecutor};
pub use models::{
    GlobalOverrides, ModelConfig, OutputFormat, ProcessingProfile, ProcessingStep, ProfileResult,
    ProviderKind, StepOverride, StepResult,
};
pub use profile::{FileProfileRepository, ProfileRepository};
pub use providers::{CompletionResponse, ModelProvider, ModelSelector, ProviderHealth};
