//! Events emitted while a pipeline runs

use crate::core::ExecutionStatus;
use std::sync::Arc;
use uuid::Uuid;

/// Events that can occur during pipeline execution
///
/// Every string carried by an event has secrets masked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    PipelineStarted {
        run_id: Uuid,
        pipeline_name: String,
        total_steps: usize,
    },
    StepStarted {
        step_id: String,
        name: String,
    },
    StepSkipped {
        step_id: String,
        reason: String,
    },
    CommandStarted {
        step_id: String,
        command: String,
    },
    StepOutput {
        step_id: String,
        command: String,
        output: String,
        success: bool,
    },
    StepExported {
        step_id: String,
        keys: Vec<String>,
    },
    CacheRestored {
        step_id: String,
        key: String,
    },
    CacheMiss {
        step_id: String,
        key: String,
    },
    CacheSaved {
        step_id: String,
        key: String,
    },
    StepSucceeded {
        step_id: String,
    },
    StepFailed {
        step_id: String,
        exit_code: Option<i32>,
        error: String,
    },
    PipelineFinished {
        run_id: Uuid,
        status: ExecutionStatus,
    },
}

impl RunEvent {
    /// Step the event belongs to, if any
    pub fn step_id(&self) -> Option<&str> {
        match self {
            RunEvent::PipelineStarted { .. } | RunEvent::PipelineFinished { .. } => None,
            RunEvent::StepStarted { step_id, .. }
            | RunEvent::StepSkipped { step_id, .. }
            | RunEvent::CommandStarted { step_id, .. }
            | RunEvent::StepOutput { step_id, .. }
            | RunEvent::StepExported { step_id, .. }
            | RunEvent::CacheRestored { step_id, .. }
            | RunEvent::CacheMiss { step_id, .. }
            | RunEvent::CacheSaved { step_id, .. }
            | RunEvent::StepSucceeded { step_id }
            | RunEvent::StepFailed { step_id, .. } => Some(step_id),
        }
    }
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(&RunEvent) + Send + Sync>;
