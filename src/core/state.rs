//! Execution state models

use crate::core::Step;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall pipeline execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Pipeline has not started
    Pending,
    /// Pipeline is currently running
    Running,
    /// Every enabled step succeeded
    Completed,
    /// A step failed and the run halted there
    Failed,
}

/// Result of a cache lookup performed by a cache step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheLookup {
    Hit,
    Miss,
}

/// Final status of a single step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    /// Every command exited with status zero
    Succeeded,
    /// A command failed; no later command or step ran
    Failed {
        /// Exit code, or `None` when killed by a signal or never spawned
        exit_code: Option<i32>,
        /// The command that failed (secrets masked)
        command: String,
        /// Extra detail when the failure was not a plain non-zero exit
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Step is disabled and was never executed
    Skipped { reason: String },
}

/// Recorded outcome of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step_id: String,
    pub step_name: String,
    #[serde(flatten)]
    pub status: StepStatus,
    /// Number of commands that were started
    pub commands_run: usize,
    /// Present for cache-restore steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheLookup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl StepOutcome {
    /// Outcome for a disabled step
    pub fn skipped(step: &Step, reason: impl Into<String>) -> Self {
        Self {
            step_id: step.id.clone(),
            step_name: step.name.clone(),
            status: StepStatus::Skipped { reason: reason.into() },
            commands_run: 0,
            cache: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Outcome for a step that is about to run; finish it with
    /// [`StepOutcome::succeed`] or [`StepOutcome::fail`]
    pub fn started(step: &Step) -> Self {
        Self {
            step_id: step.id.clone(),
            step_name: step.name.clone(),
            status: StepStatus::Succeeded,
            commands_run: 0,
            cache: None,
            started_at: Some(Utc::now()),
            finished_at: None,
        }
    }

    pub fn succeed(mut self) -> Self {
        self.status = StepStatus::Succeeded;
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn fail(
        mut self,
        exit_code: Option<i32>,
        command: impl Into<String>,
        message: Option<String>,
    ) -> Self {
        self.status = StepStatus::Failed {
            exit_code,
            command: command.into(),
            message,
        };
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, StepStatus::Skipped { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, StepStatus::Failed { .. })
    }

    /// Succeeded, or skipped (which counts as success for the verdict)
    pub fn is_success(&self) -> bool {
        !self.is_failure()
    }

    pub fn exit_code(&self) -> Option<i32> {
        match &self.status {
            StepStatus::Succeeded => Some(0),
            StepStatus::Failed { exit_code, .. } => *exit_code,
            StepStatus::Skipped { .. } => None,
        }
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// Everything a pipeline run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run ID
    pub run_id: Uuid,

    pub pipeline_name: String,

    pub status: ExecutionStatus,

    /// One entry per processed step, in execution order
    pub outcomes: Vec<StepOutcome>,

    pub started_at: Option<DateTime<Utc>>,

    pub completed_at: Option<DateTime<Utc>>,
}

impl RunReport {
    pub fn new(pipeline_name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            pipeline_name: pipeline_name.into(),
            status: ExecutionStatus::Pending,
            outcomes: Vec::new(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Mark the run as started
    pub fn start(&mut self) {
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn record(&mut self, outcome: StepOutcome) {
        self.outcomes.push(outcome);
    }

    /// Settle the verdict: completed iff no recorded step failed
    pub fn finish(&mut self) {
        self.status = if self.outcomes.iter().all(StepOutcome::is_success) {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        };
        self.completed_at = Some(Utc::now());
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }

    /// The step the run halted at, if any
    pub fn failed_step(&self) -> Option<&StepOutcome> {
        self.outcomes.iter().find(|o| o.is_failure())
    }

    pub fn outcome(&self, step_id: &str) -> Option<&StepOutcome> {
        self.outcomes.iter().find(|o| o.step_id == step_id)
    }

    /// Steps that actually ran (not skipped)
    pub fn executed_steps(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_skipped()).count()
    }

    pub fn skipped_steps(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_skipped()).count()
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}
