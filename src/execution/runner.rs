//! Pipeline runner - executes steps in order and halts at the first failure

use crate::{
    cache::DependencyCache,
    core::{
        config::CacheAction,
        interpolate::{InterpolationError, Scope},
        CacheLookup, Environment, Pipeline, RunReport, SecretStore, Step, StepKind, StepOutcome,
    },
    execution::{EventHandler, RunEvent},
    executor::{CommandExecutor, Invocation},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

/// Variable naming the file a command may append `KEY=VALUE` exports to
pub const EXPORT_FILE_VAR: &str = "CI_ENV";

/// Variable holding the absolute workspace path
pub const WORKSPACE_VAR: &str = "CI_WORKSPACE";

/// Runs a pipeline's steps strictly in definition order
pub struct PipelineRunner<E, C> {
    executor: E,
    cache: C,
    workspace: PathBuf,
    overrides: Vec<(String, String)>,
    secrets: SecretStore,
    scratch_root: PathBuf,
    event_handlers: Vec<EventHandler>,
}

impl<E: CommandExecutor, C: DependencyCache> PipelineRunner<E, C> {
    pub fn new(executor: E, cache: C, workspace: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            cache,
            workspace: workspace.into(),
            overrides: Vec::new(),
            secrets: SecretStore::new(),
            scratch_root: std::env::temp_dir(),
            event_handlers: Vec::new(),
        }
    }

    /// Variables applied after the pipeline's baseline environment
    pub fn with_overrides(mut self, overrides: Vec<(String, String)>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_secrets(mut self, secrets: SecretStore) -> Self {
        self.secrets = secrets;
        self
    }

    /// Parent of the per-step directories holding export files
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_root = dir.into();
        self
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(&RunEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn secrets(&self) -> &SecretStore {
        &self.secrets
    }

    /// Emit an event to all handlers
    fn emit(&self, event: RunEvent) {
        for handler in &self.event_handlers {
            handler(&event);
        }
    }

    /// Set the baseline variables every step sees
    ///
    /// Order: the pipeline `env:` block, then command-line overrides, then
    /// the built-ins `CI` and `CI_WORKSPACE`.
    pub fn initialize(&self, pipeline: &Pipeline, env: &mut Environment) {
        env.merge(pipeline.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env.merge(self.overrides.iter().cloned());
        env.set("CI", "true");
        env.set(WORKSPACE_VAR, self.workspace.to_string_lossy());

        debug!(
            "Initialized environment: {}",
            env.keys().collect::<Vec<_>>().join(", ")
        );
    }

    /// Execute the entire pipeline with a fresh environment
    pub async fn run_pipeline(&self, pipeline: &Pipeline) -> RunReport {
        let mut env = Environment::new();
        self.run_pipeline_with(pipeline, &mut env).await
    }

    /// Execute the entire pipeline against `env`
    ///
    /// Returns once every step has been processed or right after the first
    /// failing step. `env` holds everything the run accumulated.
    pub async fn run_pipeline_with(
        &self,
        pipeline: &Pipeline,
        env: &mut Environment,
    ) -> RunReport {
        let mut report = RunReport::new(&pipeline.name);

        info!("Starting pipeline execution: {} ({})", pipeline.name, report.run_id);
        self.emit(RunEvent::PipelineStarted {
            run_id: report.run_id,
            pipeline_name: pipeline.name.clone(),
            total_steps: pipeline.steps.len(),
        });

        report.start();
        self.initialize(pipeline, env);

        for step in &pipeline.steps {
            let outcome = self.run_step(step, env).await;
            let failed = outcome.is_failure();
            report.record(outcome);

            if failed {
                let remaining = pipeline.steps.len() - report.outcomes.len();
                error!(
                    "Step {} failed; halting with {} step(s) not run",
                    step.id, remaining
                );
                break;
            }
        }

        report.finish();
        info!(
            "Pipeline execution finished: {} - {:?}",
            pipeline.name, report.status
        );
        self.emit(RunEvent::PipelineFinished {
            run_id: report.run_id,
            status: report.status,
        });

        report
    }

    /// Execute a single step
    ///
    /// A disabled step records a skipped outcome and touches nothing.
    /// Otherwise the step's `env` is merged into `env`, then its commands
    /// run in order until one fails.
    pub async fn run_step(&self, step: &Step, env: &mut Environment) -> StepOutcome {
        if !step.enabled {
            let reason = step
                .disabled_reason
                .clone()
                .unwrap_or_else(|| "step is disabled".to_string());
            info!("Skipping disabled step {}: {}", step.id, reason);
            self.emit(RunEvent::StepSkipped {
                step_id: step.id.clone(),
                reason: reason.clone(),
            });
            return StepOutcome::skipped(step, reason);
        }

        info!("Running step: {}", step.id);
        self.emit(RunEvent::StepStarted {
            step_id: step.id.clone(),
            name: step.name.clone(),
        });

        let outcome = StepOutcome::started(step);

        // Values see the environment as it was before this step
        let mut step_env = Vec::with_capacity(step.env.len());
        for (key, template) in &step.env {
            match self.expand(template, env) {
                Ok(value) => step_env.push((key.clone(), value)),
                Err(e) => {
                    let label = format!("env {}", key);
                    return self.fail_step(outcome, None, label, Some(e.to_string()));
                }
            }
        }
        env.merge(step_env);

        let outcome = match &step.kind {
            StepKind::Run { commands } => self.run_commands(step, commands, env, outcome).await,
            StepKind::Cache { action, key, paths } => {
                self.run_cache(step, *action, key, paths, outcome).await
            }
        };

        if outcome.is_failure() {
            return outcome;
        }

        info!("Step {} completed successfully", step.id);
        self.emit(RunEvent::StepSucceeded {
            step_id: step.id.clone(),
        });
        outcome.succeed()
    }

    async fn run_commands(
        &self,
        step: &Step,
        commands: &[String],
        env: &mut Environment,
        mut outcome: StepOutcome,
    ) -> StepOutcome {
        let working_dir = match &step.working_directory {
            None => self.workspace.clone(),
            Some(dir) => match self.expand(dir, env) {
                Ok(dir) => self.workspace.join(dir),
                Err(e) => {
                    return self.fail_step(outcome, None, "working_directory", Some(e.to_string()))
                }
            },
        };

        // Removed when the step returns, whatever its outcome
        let scratch = match self.step_scratch_dir(&step.id).await {
            Ok(dir) => dir,
            Err(e) => {
                let message = format!("cannot create export directory: {}", e);
                return self.fail_step(outcome, None, EXPORT_FILE_VAR, Some(message));
            }
        };

        for (index, template) in commands.iter().enumerate() {
            let command = match self.expand(template, env) {
                Ok(command) => command,
                Err(e) => {
                    return self.fail_step(outcome, None, template.as_str(), Some(e.to_string()))
                }
            };
            let shown = self.secrets.mask(&command);

            let export_file = match prepare_export_file(scratch.path(), index).await {
                Ok(path) => path,
                Err(e) => {
                    let message = format!("cannot create export file: {}", e);
                    return self.fail_step(outcome, None, shown, Some(message));
                }
            };

            let mut vars = env.to_map();
            vars.insert(EXPORT_FILE_VAR.to_string(), export_file.to_string_lossy().into_owned());

            let invocation = Invocation {
                command,
                env: vars,
                working_dir: working_dir.clone(),
            };

            debug!(
                "Step {} command {}/{} in {}: {}",
                step.id,
                index + 1,
                commands.len(),
                working_dir.display(),
                shown
            );
            self.emit(RunEvent::CommandStarted {
                step_id: step.id.clone(),
                command: shown.clone(),
            });
            outcome.commands_run += 1;

            let output = match self.executor.execute(&invocation).await {
                Ok(output) => output,
                Err(e) => {
                    let message = self.secrets.mask(&e.to_string());
                    return self.fail_step(outcome, None, shown, Some(message));
                }
            };

            self.emit(RunEvent::StepOutput {
                step_id: step.id.clone(),
                command: shown.clone(),
                output: self.secrets.mask(&output.combined()),
                success: output.is_success(),
            });

            if !output.is_success() {
                // Exports of a failing command are discarded
                let _ = tokio::fs::remove_file(&export_file).await;
                return self.fail_step(outcome, output.exit_code, shown, None);
            }

            match self.collect_exports(&export_file).await {
                Ok(exports) if exports.is_empty() => {}
                Ok(exports) => {
                    let keys: Vec<String> = exports.iter().map(|(k, _)| k.clone()).collect();
                    debug!("Step {} exported {}", step.id, keys.join(", "));
                    env.merge(exports);
                    self.emit(RunEvent::StepExported {
                        step_id: step.id.clone(),
                        keys,
                    });
                }
                Err(message) => return self.fail_step(outcome, None, shown, Some(message)),
            }
        }

        outcome
    }

    async fn run_cache(
        &self,
        step: &Step,
        action: CacheAction,
        key: &str,
        paths: &[PathBuf],
        mut outcome: StepOutcome,
    ) -> StepOutcome {
        match action {
            CacheAction::Restore => {
                let lookup = match self.cache.restore(key, paths, &self.workspace).await {
                    Ok(lookup) => lookup,
                    Err(e) => {
                        warn!(
                            "Cache restore for '{}' failed, continuing without cache: {}",
                            key, e
                        );
                        CacheLookup::Miss
                    }
                };

                match lookup {
                    CacheLookup::Hit => {
                        info!("Restored cache '{}'", key);
                        self.emit(RunEvent::CacheRestored {
                            step_id: step.id.clone(),
                            key: key.to_string(),
                        });
                    }
                    CacheLookup::Miss => {
                        info!("Cache miss for '{}'; the build will start cold", key);
                        self.emit(RunEvent::CacheMiss {
                            step_id: step.id.clone(),
                            key: key.to_string(),
                        });
                    }
                }
                outcome.cache = Some(lookup);
            }
            CacheAction::Save => match self.cache.save(key, paths, &self.workspace).await {
                Ok(()) => {
                    info!("Saved cache '{}'", key);
                    self.emit(RunEvent::CacheSaved {
                        step_id: step.id.clone(),
                        key: key.to_string(),
                    });
                }
                Err(e) => warn!("Cache save for '{}' failed: {}", key, e),
            },
        }

        outcome
    }

    fn expand(&self, template: &str, env: &Environment) -> Result<String, InterpolationError> {
        Scope {
            env,
            secrets: &self.secrets,
            workspace: &self.workspace,
        }
        .expand(template)
    }

    async fn step_scratch_dir(&self, step_id: &str) -> std::io::Result<TempDir> {
        tokio::fs::create_dir_all(&self.scratch_root).await?;
        tempfile::Builder::new()
            .prefix(&format!("ci-runner-{}-", step_id))
            .tempdir_in(&self.scratch_root)
    }

    async fn collect_exports(&self, path: &Path) -> Result<Vec<(String, String)>, String> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(format!("cannot read {}: {}", EXPORT_FILE_VAR, e)),
        };
        let _ = tokio::fs::remove_file(path).await;

        Environment::parse_exports(&content)
            .map_err(|e| format!("malformed {} export: {}", EXPORT_FILE_VAR, e))
    }

    fn fail_step(
        &self,
        outcome: StepOutcome,
        exit_code: Option<i32>,
        command: impl Into<String>,
        message: Option<String>,
    ) -> StepOutcome {
        let command = command.into();
        let error = match (&message, exit_code) {
            (Some(message), _) => message.clone(),
            (None, Some(code)) => format!("'{}' exited with code {}", command, code),
            (None, None) => format!("'{}' was terminated by a signal", command),
        };

        error!("Step {} failed: {}", outcome.step_id, error);
        self.emit(RunEvent::StepFailed {
            step_id: outcome.step_id.clone(),
            exit_code,
            error,
        });

        outcome.fail(exit_code, command, message)
    }
}

/// Create the empty export file for the `index`th command of a step
async fn prepare_export_file(scratch: &Path, index: usize) -> std::io::Result<PathBuf> {
    let path = scratch.join(format!("{}.env", index));
    tokio::fs::write(&path, b"").await?;
    Ok(path)
}
