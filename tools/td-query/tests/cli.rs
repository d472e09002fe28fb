//! End-to-end runs of the command line against the scripted job service

use std::sync::Arc;

use job_lifecycle::scripted::{Script, ScriptStep, ScriptedConnector};
use job_lifecycle::{BackoffConfig, Engine, JobLifecycleController, JobState, WireFormat};
use td_query::{run_cli, EXIT_FAILURE, EXIT_SUCCESS};

struct Outcome {
    code: u8,
    stdout: String,
    stderr: String,
}

fn backoff() -> BackoffConfig {
    BackoffConfig { initial_wait_ms: 50, multiplier: 2.0, max_wait_ms: 1_000, jitter: 0.0 }
}

async fn run(args: &[&str], connector: &ScriptedConnector) -> Outcome {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    let connector = connector.clone();
    let code = run_cli(
        std::iter::once("td-query").chain(args.iter().copied()),
        move |_invocation| Ok(JobLifecycleController::new(Arc::new(connector), backoff())?),
        &mut stdout,
        &mut stderr,
    )
    .await;

    Outcome {
        code,
        stdout: String::from_utf8(stdout).unwrap(),
        stderr: String::from_utf8(stderr).unwrap(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_default_query_prints_rows() {
    let connector = ScriptedConnector::new(Script::new().with_result_body("1,alice\n2,bob\n"));

    let outcome = run(&["db1", "t1", "-m", "0", "-M", "100", "-f", "csv"], &connector).await;

    assert_eq!(outcome.code, EXIT_SUCCESS);
    assert_eq!(outcome.stdout, "SQL result:\n1,alice\n2,bob\nEND__\n");
    assert!(outcome.stderr.is_empty());

    let calls = connector.calls();
    assert_eq!(calls.submissions.len(), 1);
    assert_eq!(calls.submissions[0].engine, Engine::Presto);
    assert_eq!(calls.submissions[0].database, "db1");
    assert_eq!(calls.submissions[0].query, "SELECT * FROM t1 WHERE TD_TIME_RANGE(time, 0, 100)");
    assert_eq!(calls.fetches, vec![WireFormat::Csv]);
    assert_eq!(calls.closes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_tabular_is_the_default_format() {
    let connector = ScriptedConnector::new(Script::new().with_result_body("1\talice\n"));

    let outcome = run(&["db1", "t1", "-m", "0", "-M", "100"], &connector).await;

    assert_eq!(outcome.code, EXIT_SUCCESS);
    assert_eq!(connector.calls().fetches, vec![WireFormat::Tsv]);
}

#[tokio::test(start_paused = true)]
async fn test_missing_positionals_make_no_remote_call() {
    let connector = ScriptedConnector::new(Script::new());

    let outcome = run(&["-m", "0", "-M", "100"], &connector).await;

    assert_eq!(outcome.code, EXIT_FAILURE);
    assert_eq!(
        outcome.stderr,
        "FAILED: Missing one or both required database name and table name.\n"
    );
    assert!(outcome.stdout.contains("Usage:"));

    let calls = connector.calls();
    assert_eq!(calls.connects, 0);
    assert!(calls.submissions.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_diagnostic_after_polling_fails_run() {
    let connector = ScriptedConnector::new(
        Script::new()
            .with_pending_polls(3)
            .with_terminal_state(JobState::Success)
            .with_diagnostic("syntax error near FROM"),
    );

    let outcome = run(&["db1", "t1", "-m", "0", "-M", "100"], &connector).await;

    assert_eq!(outcome.code, EXIT_FAILURE);
    assert_eq!(outcome.stderr, "FAILED: syntax error near FROM\n");
    assert!(outcome.stdout.is_empty());

    let calls = connector.calls();
    assert_eq!(calls.status_calls, 4);
    assert!(calls.fetches.is_empty());
    assert_eq!(calls.closes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_drain_failure_prints_nothing_on_stdout() {
    let connector = ScriptedConnector::new(
        Script::new().with_result_body("1,alice\n2,bob\n").failing_at(ScriptStep::Drain),
    );

    let outcome = run(&["db1", "t1", "-m", "0", "-M", "100"], &connector).await;

    assert_eq!(outcome.code, EXIT_FAILURE);
    assert!(outcome.stdout.is_empty());
    assert!(outcome.stderr.starts_with("FAILED: Failed to read result of job 1"));
    assert_eq!(outcome.stderr.lines().count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_kills_job() {
    let connector = ScriptedConnector::new(Script::new().with_job_id("77").never_finishes());

    let outcome =
        run(&["db1", "t1", "-m", "0", "-M", "100", "--timeout", "10"], &connector).await;

    assert_eq!(outcome.code, EXIT_FAILURE);
    assert_eq!(outcome.stderr, "FAILED: Query did not finish within 10s\n");

    let calls = connector.calls();
    assert_eq!(calls.kills.len(), 1);
    assert_eq!(calls.closes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_hive_engine_and_limit() {
    let connector = ScriptedConnector::new(Script::new().with_result_body("x\n"));

    let outcome = run(
        &["db1", "t1", "-e", "hive", "-c", "a,b", "-l", "3", "-m", "NULL", "-M", "100"],
        &connector,
    )
    .await;

    assert_eq!(outcome.code, EXIT_SUCCESS);
    let calls = connector.calls();
    assert_eq!(calls.submissions[0].engine, Engine::Hive);
    assert_eq!(
        calls.submissions[0].query,
        "SELECT a,b FROM t1 WHERE TD_TIME_RANGE(time, NULL, 100) LIMIT 3"
    );
}

#[tokio::test]
async fn test_prepare_failure_is_reported() {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    let code = run_cli(
        ["td-query", "db1", "t1", "-m", "0", "-M", "100"],
        |_invocation| Err(anyhow::anyhow!("No API key configured")),
        &mut stdout,
        &mut stderr,
    )
    .await;

    assert_eq!(code, EXIT_FAILURE);
    assert_eq!(String::from_utf8(stderr).unwrap(), "FAILED: No API key configured\n");
    assert!(stdout.is_empty());
}

#[tokio::test]
async fn test_help_exits_cleanly() {
    let connector = ScriptedConnector::new(Script::new());

    let outcome = run(&["--help"], &connector).await;

    assert_eq!(outcome.code, EXIT_SUCCESS);
    assert!(outcome.stdout.contains("--engine"));
    assert!(outcome.stderr.is_empty());
}
