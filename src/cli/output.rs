//! CLI output formatting

use crate::{
    core::{ExecutionStatus, RunReport, StepOutcome, StepStatus},
    execution::RunEvent,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Create a spinner for a running step
pub fn create_spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Format a step status for display
pub fn format_step_status(status: &StepStatus) -> String {
    match status {
        StepStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        StepStatus::Failed { exit_code: Some(code), .. } => {
            style(format!("FAILED (exit {})", code)).red().to_string()
        }
        StepStatus::Failed { .. } => style("FAILED").red().to_string(),
        StepStatus::Skipped { .. } => style("SKIPPED").dim().to_string(),
    }
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// One line per recorded step
pub fn format_outcome(outcome: &StepOutcome) -> String {
    let icon = match &outcome.status {
        StepStatus::Succeeded => CHECK,
        StepStatus::Failed { .. } => CROSS,
        StepStatus::Skipped { .. } => SKIP,
    };

    let mut line = format!(
        "{} {} {}",
        icon,
        style(&outcome.step_id).bold(),
        format_step_status(&outcome.status)
    );
    if let Some(duration) = outcome.duration().and_then(|d| d.to_std().ok()) {
        line.push_str(&format!(" {}", style(format_duration(duration)).dim()));
    }
    if let StepStatus::Skipped { reason } = &outcome.status {
        line.push_str(&format!(" ({})", style(reason).dim()));
    }
    line
}

/// Final summary printed after a run
pub fn format_report(report: &RunReport) -> String {
    let mut lines: Vec<String> = report
        .outcomes
        .iter()
        .map(|o| format!("  {}", format_outcome(o)))
        .collect();

    let mut totals = format!(
        "{} executed, {} skipped",
        style(report.executed_steps()).cyan(),
        style(report.skipped_steps()).dim()
    );
    if let Some(duration) = report.duration().and_then(|d| d.to_std().ok()) {
        totals.push_str(&format!(" in {}", format_duration(duration)));
    }
    lines.push(format!("  {}", totals));

    if let Some(failed) = report.failed_step() {
        if let StepStatus::Failed { command, message, .. } = &failed.status {
            lines.push(format!("  {} failing command: {}", CROSS, style(command).red()));
            if let Some(message) = message {
                lines.push(format!("    {}", style(message).dim()));
            }
        }
    }

    lines.join("\n")
}

/// Format a run event for display
pub fn format_run_event(event: &RunEvent) -> String {
    match event {
        RunEvent::PipelineStarted {
            run_id,
            pipeline_name,
            total_steps,
        } => format!(
            "{} Starting pipeline {} ({}, {} steps)",
            ROCKET,
            style(pipeline_name).bold(),
            style(&run_id.to_string()[..8]).dim(),
            total_steps
        ),
        RunEvent::StepStarted { step_id, name } => {
            if name != step_id {
                format!("{} {} {}", SPINNER, style(step_id).cyan(), style(name).dim())
            } else {
                format!("{} {}", SPINNER, style(step_id).cyan())
            }
        }
        RunEvent::StepSkipped { step_id, reason } => {
            format!("{} {} skipped: {}", SKIP, style(step_id).dim(), style(reason).dim())
        }
        RunEvent::CommandStarted { step_id, command } => {
            format!("  {} {}", style(format!("[{}]", step_id)).dim(), style(command).dim())
        }
        RunEvent::StepOutput { step_id, output, .. } => {
            format!("{} Output from {}:\n{}", INFO, style(step_id).dim(), output)
        }
        RunEvent::StepExported { step_id, keys } => format!(
            "{} {} exported {}",
            INFO,
            style(step_id).dim(),
            style(keys.join(", ")).cyan()
        ),
        RunEvent::CacheRestored { step_id, key } => {
            format!("{} {} restored cache {}", CHECK, style(step_id).green(), style(key).cyan())
        }
        RunEvent::CacheMiss { step_id, key } => format!(
            "{} {} cache miss for {}, continuing without cache",
            WARN,
            style(step_id).yellow(),
            style(key).cyan()
        ),
        RunEvent::CacheSaved { step_id, key } => {
            format!("{} {} saved cache {}", CHECK, style(step_id).green(), style(key).cyan())
        }
        RunEvent::StepSucceeded { step_id } => format!("{} {}", CHECK, style(step_id).green()),
        RunEvent::StepFailed { step_id, error, .. } => {
            format!("{} {}: {}", CROSS, style(step_id).red(), style(error).dim())
        }
        RunEvent::PipelineFinished { run_id, status } => {
            let status_str = match status {
                ExecutionStatus::Completed => {
                    format!("{} completed", style("successfully").green())
                }
                ExecutionStatus::Failed => style("failed").red().to_string(),
                _ => format_status(*status),
            };
            format!(
                "{} Pipeline ({}) {}",
                INFO,
                style(&run_id.to_string()[..8]).dim(),
                status_str
            )
        }
    }
}

/// Format step output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
