//! Test: Environment - baseline, step env, and exports flow forward

use crate::helpers::*;
use ci_runner::core::StepStatus;
use ci_runner::execution::{EXPORT_FILE_VAR, WORKSPACE_VAR};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Baseline variables and built-ins reach every command
#[tokio::test]
async fn test_baseline_visible_to_every_step() {
    let pipeline = pipeline_from_yaml(
        r#"
name: "Test: Baseline"
env:
  RUST_BACKTRACE: 1
  PRUSTI_ASSERT_TIMEOUT: 60000
steps:
  - id: build
    run: python x.py build --all
  - id: test
    run: python x.py test --all
"#,
    );

    let result = run_pipeline_with_fake(&pipeline, FakeExecutor::new()).await;

    assert_pipeline_completed(&result);
    for call in &result.calls {
        assert_eq!(call.env.get("RUST_BACKTRACE").map(String::as_str), Some("1"));
        assert_eq!(call.env.get("PRUSTI_ASSERT_TIMEOUT").map(String::as_str), Some("60000"));
        assert_eq!(call.env.get("CI").map(String::as_str), Some("true"));
        assert_eq!(call.env.get(WORKSPACE_VAR).map(String::as_str), Some(WORKSPACE));
        assert!(call.env.contains_key(EXPORT_FILE_VAR));
    }
}

/// Command-line overrides win over the pipeline baseline
#[tokio::test]
async fn test_overrides_apply_after_baseline() {
    let pipeline = pipeline_from_yaml(
        r#"
name: "Test: Overrides"
env:
  PRUSTI_ASSERT_TIMEOUT: 60000
steps:
  - id: test
    run: python x.py test --all
"#,
    );

    let result = TestRun::new(FakeExecutor::new())
        .with_override("PRUSTI_ASSERT_TIMEOUT", "120000")
        .run(&pipeline)
        .await;

    let call = result.invocation("x.py test");
    assert_eq!(call.env.get("PRUSTI_ASSERT_TIMEOUT").map(String::as_str), Some("120000"));
}

/// A step's env persists for later steps, last writer wins
#[tokio::test]
async fn test_step_env_persists() {
    let pipeline = pipeline_from_yaml(
        r#"
name: "Test: Step env"
env:
  RUSTFLAGS: "-Dwarnings"
steps:
  - id: enable-coverage
    env:
      RUSTFLAGS: "-Cinstrument-coverage"
    run: "true"
  - id: build
    run: cargo build
"#,
    );

    let result = run_pipeline_with_fake(&pipeline, FakeExecutor::new()).await;

    let build = result.invocation("cargo build");
    assert_eq!(build.env.get("RUSTFLAGS").map(String::as_str), Some("-Cinstrument-coverage"));
    assert_eq!(result.env.get("RUSTFLAGS"), Some("-Cinstrument-coverage"));
}

/// Variables exported through the export file are visible downstream
#[tokio::test]
async fn test_exports_visible_to_later_steps() {
    let pipeline = pipeline_from_yaml(
        r#"
name: "Test: Exports"
steps:
  - id: enable-coverage
    run: echo "RUSTFLAGS=-Cinstrument-coverage" >> "$CI_ENV"
  - id: build
    run: cargo build
"#,
    );
    let executor =
        FakeExecutor::new().export_on("RUSTFLAGS", "RUSTFLAGS=-Cinstrument-coverage\n# comment\n");

    let result = run_pipeline_with_fake(&pipeline, executor).await;

    assert_pipeline_completed(&result);
    let build = result.invocation("cargo build");
    assert_eq!(build.env.get("RUSTFLAGS").map(String::as_str), Some("-Cinstrument-coverage"));
    assert!(result.events.iter().any(|e| matches!(
        e,
        ci_runner::RunEvent::StepExported { step_id, keys }
            if step_id == "enable-coverage" && keys == &vec!["RUSTFLAGS".to_string()]
    )));
}

/// Exports from a failing command are discarded
#[tokio::test]
async fn test_exports_of_failing_command_discarded() {
    let pipeline = pipeline_from_yaml(
        r#"
name: "Test: Failing export"
steps:
  - id: setup
    run: python x.py setup
"#,
    );
    let executor = FakeExecutor::new()
        .export_on("setup", "PRUSTI_HOME=/opt/prusti")
        .fail_on("setup", 1);

    let result = run_pipeline_with_fake(&pipeline, executor).await;

    assert_pipeline_failed(&result);
    assert!(!result.env.contains("PRUSTI_HOME"));
}

/// A malformed export line fails the step
#[tokio::test]
async fn test_malformed_export_fails_step() {
    let pipeline = pipeline_from_yaml(
        r#"
name: "Test: Malformed export"
steps:
  - id: setup
    run: python x.py setup
  - id: build
    run: cargo build
"#,
    );
    let executor = FakeExecutor::new().export_on("setup", "this is not an assignment");

    let result = run_pipeline_with_fake(&pipeline, executor).await;

    assert_pipeline_failed(&result);
    assert_step_failed(&result, "setup", None);
    match &result.outcome("setup").unwrap().status {
        StepStatus::Failed { message, .. } => {
            assert!(message.as_deref().unwrap_or_default().contains("malformed CI_ENV export"));
        }
        other => panic!("unexpected status {:?}", other),
    }
    assert_step_not_run(&result, "build");
}

/// Every command sees at least the keys its predecessors saw
#[tokio::test]
async fn test_environment_grows_monotonically() {
    let pipeline = pipeline_from_yaml(
        r#"
name: "Test: Monotonic"
env:
  RUST_BACKTRACE: 1
steps:
  - id: a
    env: { A: "1" }
    run: step-a
  - id: b
    run: step-b
  - id: c
    env: { C: "3", A: "overwritten" }
    run: step-c
  - id: d
    run: step-d
"#,
    );
    let executor = FakeExecutor::new().export_on("step-b", "B=2");

    let result = run_pipeline_with_fake(&pipeline, executor).await;

    assert_pipeline_completed(&result);
    let key_sets: Vec<BTreeSet<&String>> =
        result.calls.iter().map(|c| c.env.keys().collect()).collect();
    for pair in key_sets.windows(2) {
        assert!(pair[0].is_subset(&pair[1]), "{:?} is not within {:?}", pair[0], pair[1]);
    }
    let last = result.invocation("step-d");
    assert_eq!(last.env.get("A").map(String::as_str), Some("overwritten"));
    assert_eq!(last.env.get("B").map(String::as_str), Some("2"));
    assert_eq!(last.env.get("C").map(String::as_str), Some("3"));
}

/// Interpolation expands against the environment at step time
#[tokio::test]
async fn test_interpolation_and_working_directory() {
    let pipeline = pipeline_from_yaml(
        r#"
name: "Test: Interpolation"
steps:
  - id: setup
    run: python x.py setup
  - id: check
    working_directory: "prusti-contracts/${{ env.CONTRACTS }}"
    run: echo "${{ env.PRUSTI_HOME }}/bin in ${{ workspace }} ${{ env.UNSET }}|"
"#,
    );
    let executor = FakeExecutor::new()
        .export_on("x.py setup", "PRUSTI_HOME=/opt/prusti")
        .export_on("x.py setup", "CONTRACTS=prusti-contracts-test");

    let result = run_pipeline_with_fake(&pipeline, executor).await;

    assert_pipeline_completed(&result);
    let check = result.invocation("echo");
    assert_eq!(
        check.command,
        format!("echo \"/opt/prusti/bin in {} |\"", WORKSPACE)
    );
    assert_eq!(
        check.working_dir,
        PathBuf::from(WORKSPACE).join("prusti-contracts/prusti-contracts-test")
    );
}

/// Steps without a working directory run at the workspace root
#[tokio::test]
async fn test_default_working_directory() {
    let result = run_pipeline_with_fake(&minimal_pipeline(), FakeExecutor::new()).await;
    assert_eq!(result.invocation("make").working_dir, PathBuf::from(WORKSPACE));
}
