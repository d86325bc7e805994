//! ci-runner - A fail-fast CI pipeline runner

pub mod cache;
pub mod cli;
pub mod core;
pub mod execution;
pub mod executor;

// Re-export commonly used types
pub use crate::cache::{DependencyCache, DirectoryCache, NoCache};
pub use crate::core::config::PipelineConfig;
pub use crate::core::{
    Environment, ExecutionStatus, Pipeline, RunReport, SecretStore, Step, StepOutcome, StepStatus,
};
pub use crate::execution::{PipelineRunner, RunEvent};
pub use crate::executor::{CommandExecutor, CommandOutput, Invocation, ShellExecutor};
