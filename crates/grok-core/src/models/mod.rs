//! Data model: profiles, overrides and results.

pub mod overrides;
pub mod profile;
pub mod result;

pub use overrides::{GlobalOverrides, StepOverride};
pub use profile::{
    ModelConfig, OutputFormat, OutputSchema, ProcessingProfile, ProcessingStep, ProfileMetadata,
    ProviderKind, SchemaType,
};
pub use result::{ExecutionMetadata, ProfileResult, StepResult, StepStatus, StepSummary};
