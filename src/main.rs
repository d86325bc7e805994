use anyhow::{Context, Result};
use ci_runner::cache::{DependencyCache, DirectoryCache, NoCache};
use ci_runner::cli::commands::{ListCommand, RunCommand, ValidateCommand};
use ci_runner::cli::output::*;
use ci_runner::cli::terminal_output::TerminalReporter;
use ci_runner::cli::{Cli, Command};
use ci_runner::core::config::PipelineConfig;
use ci_runner::core::trigger::PushEvent;
use ci_runner::core::SecretStore;
use ci_runner::execution::PipelineRunner;
use ci_runner::executor::ShellExecutor;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// A step failed
const EXIT_FAILURE: i32 = 1;

/// The pipeline file could not be loaded or the workspace is unusable
const EXIT_CONFIG_ERROR: i32 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG takes precedence over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let code = match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd, &cli).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::List(cmd) => list_steps(cmd)?,
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn load_config(file: &str) -> Option<PipelineConfig> {
    match PipelineConfig::from_file(file) {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("{} Failed to load pipeline config:", CROSS);
            eprintln!("  {}", style(format!("{:#}", e)).red());
            None
        }
    }
}

async fn run_pipeline(cmd: &RunCommand, cli: &Cli) -> Result<i32> {
    let Some(config) = load_config(&cmd.file) else {
        return Ok(EXIT_CONFIG_ERROR);
    };
    let pipeline = config.to_pipeline();
    let quiet = cmd.json;

    if !quiet {
        println!("{} Loaded pipeline: {}", INFO, style(&pipeline.name).bold());
    }

    // Trigger filter only applies when a push event is described
    if let Some(branch) = &cmd.branch {
        let event = PushEvent::new(branch).with_changed(cmd.changed.iter().cloned());
        if !pipeline.should_run(&event) {
            if quiet {
                let data = serde_json::json!({
                    "pipeline": pipeline.name,
                    "branch": branch,
                    "triggered": false,
                });
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                println!(
                    "{} Push to {} does not match the pipeline trigger; nothing to run",
                    INFO,
                    style(branch).cyan()
                );
            }
            return Ok(0);
        }
    }

    let workspace = match &cmd.workspace {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let workspace = match workspace.canonicalize() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("{} Workspace {} is not usable: {}", CROSS, workspace.display(), e);
            return Ok(EXIT_CONFIG_ERROR);
        }
    };

    if !quiet {
        for (key, value) in &cmd.env {
            println!(
                "{} Variable override: {} = {}",
                INFO,
                style(key).cyan(),
                style(value).dim()
            );
        }
    }

    let cache: Arc<dyn DependencyCache> = if cmd.no_cache {
        Arc::new(NoCache)
    } else if let Some(dir) = &cmd.cache_dir {
        Arc::new(DirectoryCache::new(dir))
    } else {
        Arc::new(DirectoryCache::with_default_path())
    };

    let secrets = SecretStore::from_process_env(&pipeline.secrets);
    let mut runner = PipelineRunner::new(ShellExecutor::new(), cache, workspace)
        .with_overrides(cmd.env.clone())
        .with_secrets(secrets);

    if !quiet {
        let reporter = TerminalReporter::new(cli.stream).with_spinner(console::user_attended());
        runner.add_event_handler(move |event| reporter.on_event(event));
        println!();
    }

    let report = runner.run_pipeline(&pipeline).await;

    if quiet {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("\n{}", format_report(&report));
    }

    if report.is_success() {
        if !quiet {
            println!(
                "\n{} {} completed {}",
                CHECK,
                style(&pipeline.name).bold(),
                style("successfully").green()
            );
        }
        Ok(0)
    } else {
        if !quiet {
            println!(
                "\n{} {} {}",
                CROSS,
                style(&pipeline.name).bold(),
                style("failed").red()
            );
        }
        if let Some(failed) = report.failed_step() {
            error!("Pipeline halted at step {}", failed.step_id);
        }
        Ok(EXIT_FAILURE)
    }
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<i32> {
    println!("{} Validating pipeline...", INFO);

    let Some(config) = load_config(&cmd.file) else {
        return Ok(EXIT_CONFIG_ERROR);
    };

    let disabled = config.steps.iter().filter(|s| !s.enabled).count();
    println!("{} Pipeline configuration is valid!", CHECK);
    println!("  Name: {}", style(&config.name).bold());
    println!(
        "  Steps: {} ({} disabled)",
        style(config.steps.len()).cyan(),
        style(disabled).dim()
    );
    println!("  Variables: {}", style(config.env.len()).cyan());
    println!("  Secrets: {}", style(config.secrets.len()).cyan());

    if cmd.json {
        let json = serde_json::to_string_pretty(&config)?;
        println!("\n{}", json);
    }
    Ok(0)
}

fn list_steps(cmd: &ListCommand) -> Result<i32> {
    let Some(config) = load_config(&cmd.file) else {
        return Ok(EXIT_CONFIG_ERROR);
    };
    let pipeline = config.to_pipeline();

    if cmd.json {
        let steps: Vec<_> = pipeline
            .steps
            .iter()
            .map(|step| {
                serde_json::json!({
                    "id": step.id,
                    "name": step.name,
                    "kind": step.kind_label(),
                    "enabled": step.enabled,
                    "disabled_reason": step.disabled_reason,
                })
            })
            .collect();
        let data = serde_json::json!({ "pipeline": pipeline.name, "steps": steps });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(0);
    }

    println!("{} Steps in {}:", INFO, style(&pipeline.name).bold());
    for (index, step) in pipeline.steps.iter().enumerate() {
        let state = if step.enabled {
            style("enabled").green().to_string()
        } else {
            match &step.disabled_reason {
                Some(reason) => format!("{} ({})", style("disabled").yellow(), style(reason).dim()),
                None => style("disabled").yellow().to_string(),
            }
        };
        println!(
            "  {:>2}. {} [{}] {}",
            index + 1,
            style(&step.id).bold(),
            style(step.kind_label()).cyan(),
            state
        );
    }
    Ok(0)
}
