//! Step domain model

use crate::core::config::{CacheAction, StepConfig};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A single step in a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Unique step identifier
    pub id: String,

    /// Human-readable step name
    pub name: String,

    /// What the step does
    pub kind: StepKind,

    /// Variables merged into the run environment before the step runs
    pub env: BTreeMap<String, String>,

    /// Directory to run in, relative to the workspace
    pub working_directory: Option<String>,

    pub enabled: bool,

    pub disabled_reason: Option<String>,
}

/// The work a step performs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    /// Shell commands run in order, stopping at the first failure
    Run { commands: Vec<String> },
    /// Restore or save the dependency cache
    Cache {
        action: CacheAction,
        key: String,
        paths: Vec<PathBuf>,
    },
}

impl Step {
    /// Create a step from a validated step config
    pub fn from_config(config: &StepConfig) -> Self {
        let kind = match (&config.run, &config.cache) {
            (_, Some(cache)) => StepKind::Cache {
                action: cache.action,
                key: cache.key.clone(),
                paths: cache.paths.iter().map(PathBuf::from).collect(),
            },
            (Some(run), None) => StepKind::Run {
                commands: run.commands(),
            },
            (None, None) => StepKind::Run { commands: Vec::new() },
        };

        Step {
            id: config.id.clone(),
            name: config.display_name().to_string(),
            kind,
            env: config.env_as_string_map(),
            working_directory: config.working_directory.clone(),
            enabled: config.enabled,
            disabled_reason: config.disabled_reason.clone(),
        }
    }

    /// Commands this step runs (empty for cache steps)
    pub fn commands(&self) -> &[String] {
        match &self.kind {
            StepKind::Run { commands } => commands,
            StepKind::Cache { .. } => &[],
        }
    }

    pub fn is_cache(&self) -> bool {
        matches!(self.kind, StepKind::Cache { .. })
    }

    /// Short label for listings
    pub fn kind_label(&self) -> String {
        match &self.kind {
            StepKind::Run { commands } if commands.len() == 1 => "run".to_string(),
            StepKind::Run { commands } => format!("run x{}", commands.len()),
            StepKind::Cache {
                action: CacheAction::Restore,
                key,
                ..
            } => format!("cache restore ({})", key),
            StepKind::Cache {
                action: CacheAction::Save,
                key,
                ..
            } => format!("cache save ({})", key),
        }
    }
}
