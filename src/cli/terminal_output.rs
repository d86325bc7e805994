//! Terminal reporter for pipeline runs
//!
//! Turns [`RunEvent`]s into console output:
//!
//! - Step headers with progress indicators: `[2 / 11] setup`
//! - Horizontal separators between steps
//! - A spinner while a step's commands run (interactive terminals only)
//! - Command output when streaming, and always for a failing command

use crate::cli::output::{create_spinner, format_output, format_run_event};
use crate::execution::RunEvent;
use console::style;
use indicatif::ProgressBar;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Lines of output shown per command when streaming
const STREAM_LINES: usize = 20;

/// Event handler that prints a run to the terminal
pub struct TerminalReporter {
    stream: bool,
    use_spinner: bool,
    step_number: AtomicUsize,
    total_steps: AtomicUsize,
    spinner: Mutex<Option<ProgressBar>>,
}

impl TerminalReporter {
    pub fn new(stream: bool) -> Self {
        Self {
            stream,
            use_spinner: false,
            step_number: AtomicUsize::new(0),
            total_steps: AtomicUsize::new(0),
            spinner: Mutex::new(None),
        }
    }

    /// Show a spinner while commands run
    pub fn with_spinner(mut self, enabled: bool) -> Self {
        self.use_spinner = enabled;
        self
    }

    /// Steps announced so far (started or skipped)
    pub fn steps_seen(&self) -> usize {
        self.step_number.load(Ordering::SeqCst)
    }

    /// Print a separator line spanning the terminal width
    pub fn print_separator(&self) {
        let width = term_size::dimensions_stdout().map(|(w, _)| w).unwrap_or(80);
        self.print(&style("─".repeat(width)).dim().to_string());
    }

    fn print_step_header(&self, step_num: usize, step_id: &str) {
        let total = self.total_steps.load(Ordering::SeqCst);
        self.print(&format!(
            "[{} / {}] {}",
            style(step_num).cyan(),
            style(total).dim(),
            style(step_id).bold()
        ));
    }

    /// Print a line without tearing the spinner
    fn print(&self, line: &str) {
        match self.spinner.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(spinner) => spinner.suspend(|| println!("{}", line)),
                None => println!("{}", line),
            },
            Err(_) => println!("{}", line),
        }
        let _ = io::stdout().flush();
    }

    fn start_spinner(&self, message: String) {
        if !self.use_spinner {
            return;
        }
        if let Ok(mut guard) = self.spinner.lock() {
            if let Some(old) = guard.replace(create_spinner(message)) {
                old.finish_and_clear();
            }
        }
    }

    fn set_spinner_message(&self, message: String) -> bool {
        match self.spinner.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(spinner) => {
                    spinner.set_message(message);
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    fn stop_spinner(&self) {
        if let Ok(mut guard) = self.spinner.lock() {
            if let Some(spinner) = guard.take() {
                spinner.finish_and_clear();
            }
        }
    }

    /// Handle one run event
    pub fn on_event(&self, event: &RunEvent) {
        match event {
            RunEvent::PipelineStarted { total_steps, .. } => {
                self.total_steps.store(*total_steps, Ordering::SeqCst);
                self.step_number.store(0, Ordering::SeqCst);
                self.print(&format_run_event(event));
            }
            RunEvent::StepStarted { step_id, .. } => {
                let step_num = self.step_number.fetch_add(1, Ordering::SeqCst) + 1;
                self.print_separator();
                self.print_step_header(step_num, step_id);
                self.start_spinner(step_id.clone());
            }
            RunEvent::StepSkipped { .. } => {
                self.step_number.fetch_add(1, Ordering::SeqCst);
                self.print_separator();
                self.print(&format_run_event(event));
            }
            RunEvent::CommandStarted { command, .. } => {
                if !self.set_spinner_message(command.clone()) {
                    self.print(&format_run_event(event));
                }
            }
            RunEvent::StepOutput { output, success, .. } => {
                if output.trim().is_empty() {
                    return;
                }
                if !success {
                    self.print(output.trim_end());
                } else if self.stream {
                    self.print(&format_output(output.trim_end(), STREAM_LINES));
                }
            }
            RunEvent::StepSucceeded { .. }
            | RunEvent::StepFailed { .. }
            | RunEvent::PipelineFinished { .. } => {
                self.stop_spinner();
                self.print(&format_run_event(event));
            }
            _ => self.print(&format_run_event(event)),
        }
    }
}
