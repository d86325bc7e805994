//! Test: Coverage Flow - the bundled coverage pipeline end to end

use crate::helpers::*;
use std::path::PathBuf;

const ALL_ENABLED: [&str; 10] = [
    "setup-java",
    "setup",
    "restore-cache",
    "enable-coverage",
    "build",
    "test",
    "check-contracts",
    "save-cache",
    "collect-coverage",
    "upload",
];

fn with_token(executor: FakeExecutor) -> TestRun {
    TestRun::new(executor).with_secret("CODECOV_TOKEN", "tok-3f9a")
}

/// Every enabled step runs in order and the quick tests stay inert
#[tokio::test]
async fn test_full_run_succeeds() {
    let pipeline = coverage_pipeline();

    let result = with_token(FakeExecutor::new()).run(&pipeline).await;

    assert_pipeline_completed(&result);
    assert_execution_order(&result, &ALL_ENABLED);
    assert_step_skipped(&result, "quick-tests");
    assert_eq!(result.report.outcomes.len(), 11);
    assert!(!result.commands().iter().any(|c| c.contains("quick")));
}

/// The build sees the instrumentation flag and profile path
#[tokio::test]
async fn test_instrumentation_set_before_build() {
    let pipeline = coverage_pipeline();

    let result = with_token(FakeExecutor::new()).run(&pipeline).await;

    let build = result.invocation("x.py build");
    assert_eq!(build.env.get("RUSTFLAGS").map(String::as_str), Some("-Cinstrument-coverage"));
    assert_eq!(
        build.env.get("LLVM_PROFILE_FILE").map(String::as_str),
        Some(format!("{}/target/coverage/gcov-%p-%m.profraw", WORKSPACE).as_str())
    );

    // Tests run the same instrumented artifacts
    let test = result.invocation("x.py test");
    assert_eq!(test.env.get("RUSTFLAGS"), build.env.get("RUSTFLAGS"));
    assert_eq!(test.env.get("LLVM_PROFILE_FILE"), build.env.get("LLVM_PROFILE_FILE"));
}

/// Coverage collection reads the binaries the build wrote
#[tokio::test]
async fn test_collection_uses_build_binary_path() {
    let pipeline = coverage_pipeline();

    let result = with_token(FakeExecutor::new()).run(&pipeline).await;

    let build = result.invocation("x.py build");
    let grcov = result.invocation("./grcov");
    assert_eq!(build.working_dir, grcov.working_dir);
    assert!(grcov.command.contains("--binary-path ./target/debug/"));
    assert!(grcov.command.contains("-o lcov.info"));

    let upload = result.invocation("./codecov");
    assert!(upload.command.contains("-f lcov.info"));
    assert_eq!(upload.working_dir, grcov.working_dir);
}

/// Baseline settings reach every command
#[tokio::test]
async fn test_baseline_environment() {
    let pipeline = coverage_pipeline();

    let result = with_token(FakeExecutor::new()).run(&pipeline).await;

    for call in &result.calls {
        assert_eq!(call.env.get("RUST_BACKTRACE").map(String::as_str), Some("1"));
        assert_eq!(call.env.get("PRUSTI_ASSERT_TIMEOUT").map(String::as_str), Some("60000"));
        assert!(!call.env.contains_key("PRUSTI_DUMP_VIPER_PROGRAM"));
    }
}

/// The contracts check runs in its nested project
#[tokio::test]
async fn test_contracts_check_working_directory() {
    let pipeline = coverage_pipeline();

    let result = with_token(FakeExecutor::new()).run(&pipeline).await;

    assert_eq!(
        result.invocation("cargo build").working_dir,
        PathBuf::from(WORKSPACE).join("prusti-contracts/prusti-contracts-test")
    );
}

/// A test failure stops before caching, coverage, and upload
#[tokio::test]
async fn test_test_failure_halts_before_upload() {
    let pipeline = coverage_pipeline();
    let executor = FakeExecutor::new().fail_on("x.py test", 101);

    let result = with_token(executor).run(&pipeline).await;

    assert_pipeline_failed(&result);
    assert_step_failed(&result, "test", Some(101));
    assert_execution_order(
        &result,
        &["setup-java", "setup", "restore-cache", "enable-coverage", "build", "test"],
    );
    for id in ["quick-tests", "check-contracts", "save-cache", "collect-coverage", "upload"] {
        assert_step_not_run(&result, id);
    }
    assert!(result.cache.saves().is_empty());
}

/// A failed upload fails the pipeline
#[tokio::test]
async fn test_upload_failure_fails_pipeline() {
    let pipeline = coverage_pipeline();
    let executor = FakeExecutor::new().fail_on("./codecov", 255);

    let result = with_token(executor).run(&pipeline).await;

    assert_pipeline_failed(&result);
    assert_step_failed(&result, "upload", Some(255));
    assert_eq!(result.outcome("upload").unwrap().commands_run, 3);
}

/// The upload receives the token; nothing else does
#[tokio::test]
async fn test_upload_receives_token() {
    let pipeline = coverage_pipeline();

    let result = with_token(FakeExecutor::new()).run(&pipeline).await;

    let upload = result.invocation("./codecov");
    assert_eq!(upload.env.get("CODECOV_TOKEN").map(String::as_str), Some("tok-3f9a"));
    let build = result.invocation("x.py build");
    assert!(!build.env.contains_key("CODECOV_TOKEN"));
}
