//! Scenario-based tests for ci-runner

mod coverage_flow;
mod environment;
mod fail_fast;
mod secrets;
