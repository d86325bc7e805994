//! Command execution for pipeline steps

pub mod output;
pub mod shell;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub use output::{CommandOutput, ExecutorError};
pub use shell::ShellExecutor;

/// One command to run, fully resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Shell command line
    pub command: String,

    /// Variables layered over the inherited process environment
    pub env: BTreeMap<String, String>,

    /// Directory the command starts in
    pub working_dir: PathBuf,
}

/// Trait for command execution - allows for different implementations
///
/// Implementations run the command to completion and report its exit
/// status and captured output. A non-zero exit is a normal `Ok` result;
/// `Err` is reserved for commands that could not be run at all.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, invocation: &Invocation) -> Result<CommandOutput, ExecutorError>;
}

#[async_trait]
impl<T: CommandExecutor + ?Sized> CommandExecutor for std::sync::Arc<T> {
    async fn execute(&self, invocation: &Invocation) -> Result<CommandOutput, ExecutorError> {
        (**self).execute(invocation).await
    }
}
