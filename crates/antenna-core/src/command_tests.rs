//! Tests for shell command execution.

use super::*;

fn output(stdout: &'static str, stderr: &'static str, exit_code: Option<i32>) -> CommandOutput {
    CommandOutput {
        stdout: Bytes::from_static(stdout.as_bytes()),
        stderr: Bytes::from_static(stderr.as_bytes()),
        exit_code,
    }
}

// ============================================================================
// Acknowledgment Policy Tests
// ============================================================================

mod ack_policy {
    use super::*;

    #[test]
    fn test_default_policy_is_empty_stderr() {
        assert_eq!(AckPolicy::default(), AckPolicy::EmptyStderr);
    }

    #[test]
    fn test_empty_stderr_ignores_exit_status() {
        assert!(output("done", "", Some(1)).is_success(AckPolicy::EmptyStderr));
        assert!(!output("", "warning", Some(0)).is_success(AckPolicy::EmptyStderr));
    }

    #[test]
    fn test_exit_status_ignores_stderr() {
        assert!(output("", "warning", Some(0)).is_success(AckPolicy::ExitStatus));
        assert!(!output("", "", Some(2)).is_success(AckPolicy::ExitStatus));
        assert!(!output("", "", None).is_success(AckPolicy::ExitStatus));
    }
}

// ============================================================================
// Shell Command Tests
// ============================================================================

mod shell_command {
    use super::*;

    #[tokio::test]
    async fn test_body_is_passed_on_stdin() {
        let result = ShellCommand::new("cat")
            .run(Bytes::from_static(b"hello"))
            .await
            .unwrap();

        assert_eq!(result.stdout, Bytes::from_static(b"hello"));
        assert!(result.stderr.is_empty());
        assert_eq!(result.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_binary_body_is_passed_unmodified() {
        let body = Bytes::from_static(b"\x00\x01 two\nlines\r\n\xff");
        let result = ShellCommand::new("cat").run(body.clone()).await.unwrap();
        assert_eq!(result.stdout, body);
    }

    #[tokio::test]
    async fn test_empty_body_is_zero_length_stdin() {
        let result = ShellCommand::new("wc -c").run(Bytes::new()).await.unwrap();

        assert_eq!(String::from_utf8_lossy(&result.stdout).trim(), "0");
        assert!(result.is_success(AckPolicy::EmptyStderr));
    }

    #[tokio::test]
    async fn test_stderr_is_captured() {
        let result = ShellCommand::new("echo bad 1>&2")
            .run(Bytes::from_static(b"x"))
            .await
            .unwrap();

        assert_eq!(result.stderr, Bytes::from_static(b"bad\n"));
        assert!(result.stdout.is_empty());
        assert!(!result.is_success(AckPolicy::EmptyStderr));
    }

    #[tokio::test]
    async fn test_exit_code_is_reported() {
        let result = ShellCommand::new("exit 3").run(Bytes::new()).await.unwrap();
        assert_eq!(result.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_command_ignoring_stdin() {
        // Larger than a pipe buffer, so the write fails once the child exits
        let body = Bytes::from(vec![b'a'; 1024 * 1024]);
        let result = ShellCommand::new("echo ignored").run(body).await.unwrap();

        assert_eq!(result.stdout, Bytes::from_static(b"ignored\n"));
        assert_eq!(result.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_large_output_does_not_block() {
        let body = Bytes::from(vec![b'z'; 512 * 1024]);
        let result = ShellCommand::new("cat")
            .run(body.clone())
            .await
            .unwrap();

        assert_eq!(result.stdout.len(), body.len());
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let command = ShellCommand::new("sleep 30").with_timeout(Duration::from_millis(200));
        let started = std::time::Instant::now();

        let err = command.run(Bytes::new()).await.unwrap_err();

        assert!(matches!(err, CommandError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_fast_command_within_timeout() {
        let result = ShellCommand::new("cat")
            .with_timeout(Duration::from_secs(10))
            .run(Bytes::from_static(b"quick"))
            .await
            .unwrap();
        assert_eq!(result.stdout, Bytes::from_static(b"quick"));
    }

    #[test]
    fn test_command_accessors() {
        let command = ShellCommand::new("cat >> log.txt");
        assert_eq!(command.command(), "cat >> log.txt");
        assert_eq!(command.timeout(), None);
    }
}
