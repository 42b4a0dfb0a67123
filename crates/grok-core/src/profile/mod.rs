//! Profile loading, validation and storage.

pub mod builtin;
pub mod repository;
pub mod validation;

pub use builtin::builtin_profiles;
pub use repository::{
    validate_profile_source, FileProfileRepository, ProfileDetails, ProfileRepository,
    ProfileSummary, StepDetails,
};
pub use validation::{
    collect_problems, dependency_graph, execution_order, execution_order_ids, validate_profile,
    StepDependencies,
};
