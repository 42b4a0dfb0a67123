//! Error types for the Grok engine.
//!
//! Errors are layered the same way execution is:
//!
//! ```text
//! ProviderError ──► StepFailure ──► StepExecutionError ──► ProfileExecutionError ──► EngineError
//!                                                                                       │
//! ValidationError (load time) ──► RepositoryError ──────────────────────────────────────┘
//! ```
//!
//! `ErrorResponse` is the structured body an outer layer (HTTP, CLI) hands back
//! to its caller.

use serde::{Deserialize, Serialize};

// ─── Provider errors ──────────────────────────────────────────────────────

/// Failure reported by a model provider (or by the selector choosing one).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} request timed out after {seconds}s")]
    Timeout { provider: String, seconds: u64 },

    #[error("{provider} connection error: {message}")]
    Connection { provider: String, message: String },

    #[error("{provider} rate limited the request")]
    RateLimited {
        provider: String,
        retry_after: Option<u64>,
    },

    #[error("{provider} rejected the credentials: {message}")]
    Authentication { provider: String, message: String },

    #[error("{provider} API error: HTTP {status} - {message}")]
    Http {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("{provider} returned a malformed response: {message}")]
    MalformedResponse { provider: String, message: String },

    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: String },

    #[error("no available model provider (requested: {requested}, tried: {})", .tried.join(", "))]
    NoProviderAvailable {
        requested: String,
        tried: Vec<String>,
    },
}

impl ProviderError {
    /// Whether the failure may go away on its own and is worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout { .. }
            | ProviderError::Connection { .. }
            | ProviderError::RateLimited { .. }
            | ProviderError::EmptyResponse { .. } => true,
            ProviderError::Http { status, .. } => *status >= 500,
            ProviderError::Authentication { .. }
            | ProviderError::MalformedResponse { .. }
            | ProviderError::NoProviderAvailable { .. } => false,
        }
    }

    /// Name of the provider that produced the error.
    pub fn provider(&self) -> &str {
        match self {
            ProviderError::Timeout { provider, .. }
            | ProviderError::Connection { provider, .. }
            | ProviderError::RateLimited { provider, .. }
            | ProviderError::Authentication { provider, .. }
            | ProviderError::Http { provider, .. }
            | ProviderError::MalformedResponse { provider, .. }
            | ProviderError::EmptyResponse { provider } => provider,
            ProviderError::NoProviderAvailable { .. } => "selector",
        }
    }
}

// ─── Validation errors ────────────────────────────────────────────────────

/// A profile (or an override set) failed validation. Raised at load time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("failed to parse profile: {0}")]
    Parse(String),

    #[error("{field}: {message}")]
    Field { field: String, message: String },

    #[error("duplicate step id '{0}'")]
    DuplicateStepId(String),

    #[error("step '{step_id}' has an invalid prompt template: {reason}")]
    InvalidTemplate { step_id: String, reason: String },

    #[error("step '{step_id}' references undefined step '{reference}'")]
    UndefinedReference { step_id: String, reference: String },

    #[error("step '{step_id}' references '{reference}', whose output is not passed to later steps")]
    UnavailableReference { step_id: String, reference: String },

    #[error("circular dependency between steps: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    #[error("invalid override {field}: {message}")]
    InvalidOverride { field: String, message: String },
}

impl ValidationError {
    pub(crate) fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::Field {
            field: field.into(),
            message: message.into(),
        }
    }
}

// ─── Step / profile execution errors ──────────────────────────────────────

/// Underlying cause of a step failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StepFailure {
    #[error("prompt variable '{0}' has no value")]
    MissingVariable(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("invalid step output: {0}")]
    InvalidStepOutput(String),
}

impl StepFailure {
    pub fn is_transient(&self) -> bool {
        match self {
            StepFailure::Provider(e) => e.is_transient(),
            StepFailure::MissingVariable(_) | StepFailure::InvalidStepOutput(_) => false,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            StepFailure::MissingVariable(_) => "missing_variable",
            StepFailure::InvalidStepOutput(_) => "invalid_step_output",
            StepFailure::Provider(ProviderError::NoProviderAvailable { .. }) => {
                "no_provider_available"
            }
            StepFailure::Provider(_) => "provider_error",
        }
    }
}

/// A step's final failure, after any retries.
#[derive(Debug, Clone, thiserror::Error)]
#[error("step '{step_id}' failed after {attempts} attempt(s): {cause}")]
pub struct StepExecutionError {
    pub step_id: String,
    pub attempts: u32,
    #[source]
    pub cause: StepFailure,
}

impl StepExecutionError {
    pub fn is_invalid_output(&self) -> bool {
        matches!(self.cause, StepFailure::InvalidStepOutput(_))
    }
}

/// Terminal failure of a profile run. Carries no partial results.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProfileExecutionError {
    #[error("profile '{profile_id}' aborted: required {source}")]
    StepFailed {
        profile_id: String,
        #[source]
        source: StepExecutionError,
    },

    #[error("profile '{profile_id}' cancelled after {steps_completed} step(s)")]
    Cancelled {
        profile_id: String,
        steps_completed: usize,
    },

    #[error("profile '{profile_id}' cannot run: {source}")]
    InvalidProfile {
        profile_id: String,
        #[source]
        source: ValidationError,
    },
}

impl ProfileExecutionError {
    /// The step whose failure ended the run, if any.
    pub fn step_id(&self) -> Option<&str> {
        match self {
            ProfileExecutionError::StepFailed { source, .. } => Some(&source.step_id),
            _ => None,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            ProfileExecutionError::StepFailed { source, .. } => source.cause.is_transient(),
            ProfileExecutionError::Cancelled { .. } => true,
            ProfileExecutionError::InvalidProfile { .. } => false,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let kind = match self {
            ProfileExecutionError::StepFailed { source, .. } => source.cause.kind(),
            ProfileExecutionError::Cancelled { .. } => "cancelled",
            ProfileExecutionError::InvalidProfile { .. } => "invalid_profile",
        };
        ErrorResponse {
            error: self.to_string(),
            kind: kind.to_string(),
            step_id: self.step_id().map(str::to_string),
            recoverable: self.is_recoverable(),
        }
    }
}

// ─── Repository / engine errors ───────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    #[error("profile already exists: {0}")]
    AlreadyExists(String),

    #[error("profile I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}' ({message})")]
    InvalidValue {
        var: String,
        value: String,
        message: String,
    },
}

/// Error surfaced by the `Engine` facade.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),

    #[error("engine busy: {limit} profile run(s) already in flight")]
    Busy { limit: usize },

    #[error(transparent)]
    Execution(#[from] ProfileExecutionError),
}

impl EngineError {
    pub fn to_response(&self) -> ErrorResponse {
        match self {
            EngineError::Execution(e) => e.to_response(),
            EngineError::Busy { .. } => ErrorResponse::new(self, "busy", true),
            EngineError::Repository(RepositoryError::ProfileNotFound(_)) => {
                ErrorResponse::new(self, "profile_not_found", false)
            }
            EngineError::Repository(_) => ErrorResponse::new(self, "repository_error", false),
            EngineError::InvalidRequest(_) => ErrorResponse::new(self, "invalid_request", false),
        }
    }
}

/// Structured error body for callers of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    pub recoverable: bool,
}

impl ErrorResponse {
    fn new(error: &impl std::fmt::Display, kind: &str, recoverable: bool) -> Self {
        Self {
            error: error.to_string(),
            kind: kind.to_string(),
            step_id: None,
            recoverable,
        }
    }
}
