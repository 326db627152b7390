//! Integration tests running real shell commands through the poll loop.

mod common;

use antenna_core::{AckPolicy, CycleOutcome, PollConfig, ShellCommand};
use common::{immediate_config, listener};
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_cat_prints_body_and_deletes_message() {
    let l = listener(ShellCommand::new("cat"), immediate_config()).await;
    let id = l.send("hello");

    let outcome = l.poll_loop.run_once().await.unwrap();

    assert_eq!(outcome, CycleOutcome::Acknowledged { message_id: id });
    assert_eq!(l.stdout(), "hello");
    assert_eq!(l.stderr(), "");
    assert_eq!(l.deleted_count(), 1);
    assert_eq!(l.queue.message_count(&l.queue_name()).unwrap(), 0);
}

#[tokio::test]
async fn test_stderr_output_keeps_message() {
    let l = listener(ShellCommand::new("echo bad 1>&2"), immediate_config()).await;
    let id = l.send("x");

    let outcome = l.poll_loop.run_once().await.unwrap();

    assert_eq!(outcome, CycleOutcome::Retained { message_id: id });
    assert_eq!(l.stderr(), "bad\n");
    assert_eq!(l.deleted_count(), 0);
    assert_eq!(l.queue.message_count(&l.queue_name()).unwrap(), 1);
}

#[tokio::test]
async fn test_empty_queue_does_not_invoke_command() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("invoked");
    let command = ShellCommand::new(format!("touch '{}'", marker.display()));
    let l = listener(command, immediate_config()).await;

    let outcome = l.poll_loop.run_once().await.unwrap();

    assert_eq!(outcome, CycleOutcome::Idle);
    assert!(!marker.exists());
}

#[tokio::test]
async fn test_empty_body_is_zero_length_stdin() {
    let l = listener(ShellCommand::new("wc -c"), immediate_config()).await;
    l.send("");

    let outcome = l.poll_loop.run_once().await.unwrap();

    assert!(matches!(outcome, CycleOutcome::Acknowledged { .. }));
    assert_eq!(l.stdout().trim(), "0");
}

#[tokio::test]
async fn test_redelivery_gives_each_invocation_the_full_body() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("log");
    // Fails on the first delivery, succeeds on the second
    let command = ShellCommand::new(format!(
        "cat >> '{log}'; echo >> '{log}'; [ $(wc -l < '{log}') -ge 2 ] || echo retry 1>&2",
        log = log.display()
    ));
    let config = PollConfig {
        visibility_timeout: Some(Duration::ZERO),
        ..immediate_config()
    };
    let l = listener(command, config).await;
    l.send("payload line");

    let first = l.poll_loop.run_once().await.unwrap();
    let second = l.poll_loop.run_once().await.unwrap();

    assert!(matches!(first, CycleOutcome::Retained { .. }));
    assert!(matches!(second, CycleOutcome::Acknowledged { .. }));
    assert_eq!(
        std::fs::read_to_string(&log).unwrap(),
        "payload line\npayload line\n"
    );
    assert_eq!(l.deleted_count(), 1);
}

#[tokio::test]
async fn test_exit_status_policy_ignores_stderr() {
    let config = PollConfig {
        ack_policy: AckPolicy::ExitStatus,
        ..immediate_config()
    };
    let l = listener(ShellCommand::new("echo progress 1>&2; cat"), config).await;
    l.send("ok");

    let outcome = l.poll_loop.run_once().await.unwrap();

    assert!(matches!(outcome, CycleOutcome::Acknowledged { .. }));
    assert_eq!(l.stdout(), "ok");
    assert_eq!(l.stderr(), "progress\n");
}

#[tokio::test]
async fn test_exit_status_policy_keeps_failed_message() {
    let config = PollConfig {
        ack_policy: AckPolicy::ExitStatus,
        ..immediate_config()
    };
    let l = listener(ShellCommand::new("cat > /dev/null; exit 1"), config).await;
    l.send("work");

    let outcome = l.poll_loop.run_once().await.unwrap();

    assert!(matches!(outcome, CycleOutcome::Retained { .. }));
    assert_eq!(l.deleted_count(), 0);
}

#[tokio::test]
async fn test_command_timeout_keeps_message() {
    let command = ShellCommand::new("sleep 30").with_timeout(Duration::from_millis(300));
    let l = listener(command, immediate_config()).await;
    let id = l.send("slow");

    let outcome = l.poll_loop.run_once().await.unwrap();

    assert_eq!(outcome, CycleOutcome::CommandFailed { message_id: id });
    assert_eq!(l.deleted_count(), 0);
}

#[tokio::test]
async fn test_run_until_processes_queue_then_stops() {
    let config = PollConfig {
        wait_time: Duration::from_secs(1),
        ..PollConfig::default()
    };
    let l = listener(ShellCommand::new("cat; echo"), config).await;
    l.send("first");
    l.send("second");
    l.send("third");

    l.poll_loop
        .run_until(tokio::time::sleep(Duration::from_secs(3)))
        .await
        .unwrap();

    assert_eq!(l.stdout(), "first\nsecond\nthird\n");
    assert_eq!(l.deleted_count(), 3);
}
