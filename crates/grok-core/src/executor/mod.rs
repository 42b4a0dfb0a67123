//! Profile and step execution.

pub mod context;
pub mod output;
pub mod profile;
pub mod step;

pub use context::ExecutionContext;
pub use profile::ProfileExecutor;
pub use step::{RetryPolicy, StepExecutor};
