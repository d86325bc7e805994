//! Pipeline configuration from YAML

use crate::core::{
    interpolate::{self, Expression},
    trigger::{PushFilter, TriggerConfig},
    Pipeline,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path};

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Events that start the pipeline
    #[serde(default, rename = "on")]
    pub trigger: Option<TriggerConfig>,

    /// Baseline environment set before the first step
    #[serde(default)]
    pub env: BTreeMap<String, Value>,

    /// Secrets read from the process environment at start-up
    #[serde(default)]
    pub secrets: Vec<String>,

    /// Pipeline steps, in execution order
    pub steps: Vec<StepConfig>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    /// Unique step identifier
    pub id: String,

    /// Human-readable step name (defaults to the id)
    #[serde(default)]
    pub name: Option<String>,

    /// Shell command(s) to run
    #[serde(default)]
    pub run: Option<RunConfig>,

    /// Dependency cache operation
    #[serde(default)]
    pub cache: Option<CacheConfig>,

    /// Variables merged into the run environment before the step runs
    #[serde(default)]
    pub env: BTreeMap<String, Value>,

    /// Directory to run in, relative to the workspace
    #[serde(default)]
    pub working_directory: Option<String>,

    /// Disabled steps stay declared but never execute
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Why the step is disabled
    #[serde(default)]
    pub disabled_reason: Option<String>,
}

fn default_enabled() -> bool {
    true
}

/// `run:` accepts one command or a list of commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunConfig {
    Single(String),
    Multiple(Vec<String>),
}

impl RunConfig {
    pub fn commands(&self) -> Vec<String> {
        match self {
            RunConfig::Single(command) => vec![command.clone()],
            RunConfig::Multiple(commands) => commands.clone(),
        }
    }
}

/// Dependency cache step configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Cache key shared between runs
    pub key: String,

    /// Workspace-relative paths to restore or save
    pub paths: Vec<String>,

    /// Whether this step restores or saves
    pub action: CacheAction,
}

/// What a cache step does
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheAction {
    Restore,
    Save,
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Pipeline name must not be empty");
        }

        let declared_secrets: HashSet<&str> = self.secrets.iter().map(String::as_str).collect();
        for secret in &self.secrets {
            if !crate::core::environment::is_valid_name(secret) {
                anyhow::bail!("Invalid secret name '{}'", secret);
            }
        }

        for (key, value) in &self.env {
            check_variable(key, value).with_context(|| "Invalid pipeline env")?;
        }

        if let Some(push) = self.trigger.as_ref().and_then(|t| t.push.as_ref()) {
            PushFilter::from_config(push).context("Invalid trigger pattern")?;
        }

        // Check that all step IDs are unique
        let mut seen_ids = HashSet::new();
        for step in &self.steps {
            if !seen_ids.insert(&step.id) {
                anyhow::bail!("Duplicate step ID: {}", step.id);
            }
            step.validate(&declared_secrets)
                .with_context(|| format!("Invalid step '{}'", step.id))?;
        }

        Ok(())
    }

    /// Baseline environment as strings
    pub fn env_as_string_map(&self) -> BTreeMap<String, String> {
        stringify_map(&self.env)
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Pipeline {
        Pipeline::from_config(self)
    }
}

impl StepConfig {
    /// Display name, falling back to the id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn env_as_string_map(&self) -> BTreeMap<String, String> {
        stringify_map(&self.env)
    }

    fn validate(&self, declared_secrets: &HashSet<&str>) -> Result<()> {
        if self.id.is_empty()
            || !self
                .id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            anyhow::bail!("Step ID '{}' may only contain letters, digits, '-' and '_'", self.id);
        }

        let mut templates: Vec<&str> = Vec::new();

        match (&self.run, &self.cache) {
            (Some(_), Some(_)) => anyhow::bail!("Step has both 'run' and 'cache'; pick one"),
            (None, None) => anyhow::bail!("Step needs either 'run' or 'cache'"),
            (Some(run), None) => {
                let commands = match run {
                    RunConfig::Single(command) => std::slice::from_ref(command),
                    RunConfig::Multiple(commands) => commands.as_slice(),
                };
                if commands.is_empty() {
                    anyhow::bail!("'run' must list at least one command");
                }
                for command in commands {
                    if command.trim().is_empty() {
                        anyhow::bail!("'run' contains an empty command");
                    }
                    templates.push(command);
                }
            }
            (None, Some(cache)) => {
                if cache.key.trim().is_empty() {
                    anyhow::bail!("Cache key must not be empty");
                }
                if cache.paths.is_empty() {
                    anyhow::bail!("Cache step must list at least one path");
                }
                for path in &cache.paths {
                    check_relative_path(path).with_context(|| "Invalid cache path")?;
                }
            }
        }

        for (key, value) in &self.env {
            check_variable(key, value)?;
            if let Value::String(s) = value {
                // Step values expand against the environment before the step
                for expression in interpolate::expressions(s)? {
                    if let Expression::Env(name) = expression {
                        if name != *key && self.env.contains_key(&name) {
                            anyhow::bail!(
                                "env '{}' references '{}' from the same step; \
                                 move '{}' to an earlier step or the pipeline env",
                                key,
                                name,
                                name
                            );
                        }
                    }
                }
                templates.push(s);
            }
        }

        if let Some(dir) = &self.working_directory {
            check_relative_path(dir).with_context(|| "Invalid working_directory")?;
            templates.push(dir);
        }

        for template in templates {
            for expression in interpolate::expressions(template)? {
                if let Expression::Secret(name) = expression {
                    if !declared_secrets.contains(name.as_str()) {
                        anyhow::bail!("References undeclared secret '{}'", name);
                    }
                }
            }
        }

        Ok(())
    }
}

fn check_variable(key: &str, value: &Value) -> Result<()> {
    if !crate::core::environment::is_valid_name(key) {
        anyhow::bail!("Invalid environment variable name '{}'", key);
    }
    if scalar_to_string(value).is_none() {
        anyhow::bail!("Environment variable '{}' must be a string, number or boolean", key);
    }
    Ok(())
}

fn check_relative_path(path: &str) -> Result<()> {
    let p = Path::new(path);
    if path.trim().is_empty() {
        anyhow::bail!("Path must not be empty");
    }
    if p.is_absolute() {
        anyhow::bail!("Path '{}' must be relative to the workspace", path);
    }
    if p.components().any(|c| matches!(c, Component::ParentDir)) {
        anyhow::bail!("Path '{}' must not leave the workspace", path);
    }
    Ok(())
}

/// Render a YAML scalar as an environment value
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

fn stringify_map(map: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
    map.iter()
        .filter_map(|(k, v)| scalar_to_string(v).map(|s| (k.clone(), s)))
        .collect()
}
