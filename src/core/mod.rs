//! Core domain models for a pipeline run
//!
//! This module defines the pipeline definition, the environment that
//! accumulates across steps, and the outcomes a run records.

pub mod config;
pub mod environment;
pub mod interpolate;
pub mod pipeline;
pub mod secrets;
pub mod state;
pub mod step;
pub mod trigger;

pub use environment::*;
pub use pipeline::*;
pub use secrets::*;
pub use state::*;
pub use step::*;
