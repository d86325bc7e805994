//! Test: Secrets - values reach commands but never the log

use crate::helpers::*;
use ci_runner::core::{config::PipelineConfig, StepStatus, MASK};
use ci_runner::RunEvent;

const UPLOAD: &str = r#"
name: "Test: Secrets"
secrets: [CODECOV_TOKEN]
steps:
  - id: upload
    run: ./codecov -t ${{ secrets.CODECOV_TOKEN }} -f lcov.info
"#;

/// The command gets the real value; events show the mask
#[tokio::test]
async fn test_secret_masked_in_events() {
    let pipeline = pipeline_from_yaml(UPLOAD);
    let executor = FakeExecutor::new().output_on("codecov", "uploading with token tok-3f9a\n");

    let result = TestRun::new(executor)
        .with_secret("CODECOV_TOKEN", "tok-3f9a")
        .run(&pipeline)
        .await;

    assert_pipeline_completed(&result);
    assert_eq!(result.invocation("codecov").command, "./codecov -t tok-3f9a -f lcov.info");

    assert_eq!(
        result.commands_for("upload"),
        vec![format!("./codecov -t {} -f lcov.info", MASK)]
    );
    let output = result
        .events
        .iter()
        .find_map(|e| match e {
            RunEvent::StepOutput { output, .. } => Some(output.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(output, format!("uploading with token {}\n", MASK));
    assert!(!format!("{:?}", result.events).contains("tok-3f9a"));
}

/// A failing command is reported with the secret masked
#[tokio::test]
async fn test_secret_masked_in_failure() {
    let pipeline = pipeline_from_yaml(UPLOAD);
    let executor = FakeExecutor::new().fail_on("codecov", 1);

    let result = TestRun::new(executor)
        .with_secret("CODECOV_TOKEN", "tok-3f9a")
        .run(&pipeline)
        .await;

    match &result.outcome("upload").unwrap().status {
        StepStatus::Failed { command, .. } => {
            assert!(!command.contains("tok-3f9a"));
            assert!(command.contains(MASK));
        }
        other => panic!("unexpected status {:?}", other),
    }
    let report = serde_json::to_string(&result.report).unwrap();
    assert!(!report.contains("tok-3f9a"));
}

/// Referencing an undeclared secret is a configuration error
#[test]
fn test_undeclared_secret_rejected() {
    let yaml = r#"
name: "Test: Undeclared"
steps:
  - id: upload
    run: ./codecov -t ${{ secrets.CODECOV_TOKEN }}
"#;
    let err = PipelineConfig::from_yaml(yaml).unwrap_err();
    assert!(format!("{:#}", err).contains("undeclared secret 'CODECOV_TOKEN'"));
}
