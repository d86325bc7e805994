//! CLI command definitions

use clap::Args;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Workspace root the commands run in (defaults to the current directory)
    #[arg(short, long)]
    pub workspace: Option<String>,

    /// Environment overrides (KEY=VALUE), applied after the pipeline `env:`
    #[arg(long, value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Branch of the push event; enables the trigger filter
    #[arg(long)]
    pub branch: Option<String>,

    /// Paths changed by the push event
    #[arg(long)]
    pub changed: Vec<String>,

    /// Cache directory (defaults to the platform cache directory)
    #[arg(long)]
    pub cache_dir: Option<String>,

    /// Run without restoring or saving the dependency cache
    #[arg(long, conflicts_with = "cache_dir")]
    pub no_cache: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List the steps of a pipeline
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid key=value pair: {}", s))?;
    if !crate::core::environment::is_valid_name(key) {
        return Err(format!("Invalid variable name: {}", key));
    }
    Ok((key.to_string(), value.to_string()))
}
