//! Test: Fail Fast - the first failing step halts the pipeline

use crate::helpers::*;

const FOUR_STEPS: &str = r#"
name: "Test: Fail Fast"
steps:
  - id: setup
    run: python x.py setup
  - id: build
    run: python x.py build --all
  - id: test
    run: python x.py test --all
  - id: upload
    run: ./codecov -f lcov.info
"#;

/// [setup ok, build ok, test fails, upload ok] records three outcomes
#[tokio::test]
async fn test_failing_step_halts_remaining_steps() {
    let pipeline = pipeline_from_yaml(FOUR_STEPS);
    let executor = FakeExecutor::new().fail_on("x.py test", 101);

    let result = run_pipeline_with_fake(&pipeline, executor).await;

    assert_pipeline_failed(&result);
    assert_eq!(result.report.outcomes.len(), 3);
    assert_execution_order(&result, &["setup", "build", "test"]);
    assert_step_failed(&result, "test", Some(101));
    assert_step_not_run(&result, "upload");
    assert!(!result.commands().iter().any(|c| c.contains("codecov")));
    assert_eq!(result.report.failed_step().unwrap().step_id, "test");
}

/// Every enabled step succeeding yields exactly one outcome each
#[tokio::test]
async fn test_all_steps_succeed() {
    let pipeline = pipeline_from_yaml(FOUR_STEPS);

    let result = run_pipeline_with_fake(&pipeline, FakeExecutor::new()).await;

    assert_pipeline_completed(&result);
    assert_execution_order(&result, &["setup", "build", "test", "upload"]);
    for id in ["setup", "build", "test", "upload"] {
        assert_step_succeeded(&result, id);
        assert_eq!(result.recorded_steps().iter().filter(|s| *s == id).count(), 1);
    }
}

/// A failure in the first step runs nothing else
#[tokio::test]
async fn test_first_step_failure() {
    let pipeline = pipeline_from_yaml(FOUR_STEPS);
    let executor = FakeExecutor::new().fail_on("x.py setup", 2);

    let result = run_pipeline_with_fake(&pipeline, executor).await;

    assert_pipeline_failed(&result);
    assert_eq!(result.commands(), vec!["python x.py setup"]);
    assert_eq!(result.recorded_steps(), vec!["setup"]);
}

/// Commands inside a step short-circuit on the first failure
#[tokio::test]
async fn test_multi_command_step_short_circuits() {
    let pipeline = pipeline_from_yaml(
        r#"
name: "Test: Multi-command"
steps:
  - id: upload
    run:
      - curl -Os https://uploader.codecov.io/latest/linux/codecov
      - chmod +x codecov
      - ./codecov -f lcov.info
  - id: after
    run: echo done
"#,
    );
    let executor = FakeExecutor::new().fail_on("chmod", 1);

    let result = run_pipeline_with_fake(&pipeline, executor).await;

    assert_pipeline_failed(&result);
    assert_step_failed(&result, "upload", Some(1));
    assert_eq!(result.outcome("upload").unwrap().commands_run, 2);
    assert_eq!(
        result.commands_for("upload"),
        vec!["curl -Os https://uploader.codecov.io/latest/linux/codecov", "chmod +x codecov"]
    );
    assert_step_not_run(&result, "after");
}

/// The last command's status decides a multi-command step
#[tokio::test]
async fn test_multi_command_step_last_command_fails() {
    let pipeline = pipeline_from_yaml(
        r#"
name: "Test: Last command"
steps:
  - id: collect
    run: [fetch-grcov, ./grcov . -o lcov.info]
"#,
    );
    let executor = FakeExecutor::new().fail_on("./grcov", 3);

    let result = run_pipeline_with_fake(&pipeline, executor).await;

    assert_step_failed(&result, "collect", Some(3));
    assert_eq!(result.outcome("collect").unwrap().commands_run, 2);
}

/// Termination by a signal is a failure without an exit code
#[tokio::test]
async fn test_killed_command_fails_step() {
    let pipeline = pipeline_from_yaml(FOUR_STEPS);
    let executor = FakeExecutor::new().killed_on("x.py build");

    let result = run_pipeline_with_fake(&pipeline, executor).await;

    assert_pipeline_failed(&result);
    assert_step_failed(&result, "build", None);
    assert_step_not_run(&result, "test");
}

/// A command that cannot be spawned fails its step
#[tokio::test]
async fn test_spawn_failure_fails_step() {
    let pipeline = pipeline_from_yaml(FOUR_STEPS);
    let executor = FakeExecutor::new().spawn_error_on("x.py build");

    let result = run_pipeline_with_fake(&pipeline, executor).await;

    assert_step_failed(&result, "build", None);
    match &result.outcome("build").unwrap().status {
        ci_runner::core::StepStatus::Failed { message, command, .. } => {
            assert_eq!(command, "python x.py build --all");
            assert!(message.as_deref().unwrap_or_default().contains("failed to spawn"));
        }
        other => panic!("unexpected status {:?}", other),
    }
}

/// The failing step is announced before the pipeline finishes
#[tokio::test]
async fn test_failure_events() {
    let pipeline = pipeline_from_yaml(FOUR_STEPS);
    let executor = FakeExecutor::new().fail_on("x.py test", 1);

    let result = run_pipeline_with_fake(&pipeline, executor).await;

    let failed: Vec<_> = result
        .events
        .iter()
        .filter_map(|e| match e {
            ci_runner::RunEvent::StepFailed {
                step_id, exit_code, ..
            } => Some((step_id.clone(), *exit_code)),
            _ => None,
        })
        .collect();
    assert_eq!(failed, vec![("test".to_string(), Some(1))]);
    assert!(matches!(
        result.events.last(),
        Some(ci_runner::RunEvent::PipelineFinished {
            status: ci_runner::ExecutionStatus::Failed,
            ..
        })
    ));
}
