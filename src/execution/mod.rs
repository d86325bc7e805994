//! Pipeline execution

pub mod events;
pub mod runner;

pub use events::{EventHandler, RunEvent};
pub use runner::{PipelineRunner, EXPORT_FILE_VAR, WORKSPACE_VAR};
