//! Shell subprocess executor - runs step commands through `sh`

use crate::executor::{CommandExecutor, CommandOutput, ExecutorError, Invocation};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Executor that runs each command line through a shell
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    /// Path to the shell
    shell: String,

    /// Arguments placed before the command line
    shell_args: Vec<String>,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            // -e: a multi-line command stops at its first failing line
            shell_args: vec!["-e".to_string(), "-c".to_string()],
        }
    }
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different shell, e.g. `bash` with `["-eo", "pipefail", "-c"]`
    pub fn with_shell(mut self, shell: impl Into<String>, args: Vec<String>) -> Self {
        self.shell = shell.into();
        self.shell_args = args;
        self
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(&self, invocation: &Invocation) -> Result<CommandOutput, ExecutorError> {
        if !invocation.working_dir.is_dir() {
            return Err(ExecutorError::MissingWorkingDir(
                invocation.working_dir.display().to_string(),
            ));
        }

        debug!(
            "Spawning {} in {} with {} variables",
            self.shell,
            invocation.working_dir.display(),
            invocation.env.len()
        );

        let output = Command::new(&self.shell)
            .args(&self.shell_args)
            .arg(&invocation.command)
            .envs(&invocation.env)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ExecutorError::Spawn {
                program: self.shell.clone(),
                source,
            })?;

        let exit_code = output.status.code();
        if exit_code.is_none() {
            warn!("Command terminated by a signal");
        }

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
