//! Pipeline domain model

use crate::core::{
    config::PipelineConfig,
    step::Step,
    trigger::{PushEvent, PushFilter},
};
use std::collections::BTreeMap;
use tracing::warn;

/// A pipeline definition
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Baseline environment applied by `initialize`
    pub env: BTreeMap<String, String>,

    /// Names of secrets the steps may reference
    pub secrets: Vec<String>,

    /// Push filter; `None` runs for every event
    pub trigger: Option<PushFilter>,

    /// Steps in execution order
    pub steps: Vec<Step>,
}

impl Pipeline {
    /// Create a pipeline from configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        let trigger = config
            .trigger
            .as_ref()
            .and_then(|t| t.push.as_ref())
            .and_then(|push| match PushFilter::from_config(push) {
                Ok(filter) => Some(filter),
                Err(e) => {
                    warn!("Ignoring invalid trigger filter: {}", e);
                    None
                }
            });

        Pipeline {
            name: config.name.clone(),
            env: config.env_as_string_map(),
            secrets: config.secrets.clone(),
            trigger,
            steps: config.steps.iter().map(Step::from_config).collect(),
        }
    }

    /// Get a step by ID
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn enabled_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|s| s.enabled)
    }

    /// Whether `event` passes the trigger filter
    pub fn should_run(&self, event: &PushEvent) -> bool {
        self.trigger.as_ref().map_or(true, |filter| filter.matches(event))
    }
}
