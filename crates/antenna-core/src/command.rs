//! # Command Execution
//!
//! Runs the configured shell command once per message. The message body is
//! written to the child's stdin, stdin is closed, and stdout and stderr are
//! captured in full once the child exits.

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;

/// Shell used to interpret the command string
const SHELL: &str = "sh";

// ============================================================================
// Acknowledgment Policy
// ============================================================================

/// Rule deciding whether an invocation counts as successful
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckPolicy {
    /// Successful when the command wrote nothing to stderr. The exit status
    /// is ignored.
    #[default]
    EmptyStderr,

    /// Successful when the command exited with status zero. Output on
    /// stderr is ignored.
    ExitStatus,
}

// ============================================================================
// Command Output
// ============================================================================

/// Captured result of one command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Bytes,
    pub stderr: Bytes,
    /// `None` when the child was terminated by a signal
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// Check whether the invocation succeeded under the given policy
    pub fn is_success(&self, policy: AckPolicy) -> bool {
        match policy {
            AckPolicy::EmptyStderr => self.stderr.is_empty(),
            AckPolicy::ExitStatus => self.exit_code == Some(0),
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that prevent an invocation from producing a [`CommandOutput`]
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Failed to spawn command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error while running command '{command}': {source}")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Command '{command}' timed out after {timeout:?} and was killed")]
    Timeout { command: String, timeout: Duration },
}

// ============================================================================
// Command Runner
// ============================================================================

/// Executes the configured command for one message
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command with `input` on stdin and wait for it to exit
    async fn run(&self, input: Bytes) -> Result<CommandOutput, CommandError>;

    /// Command string, for logging
    fn command(&self) -> &str;
}

/// Runs a command string through `sh -c`
#[derive(Debug, Clone)]
pub struct ShellCommand {
    command: String,
    timeout: Option<Duration>,
}

impl ShellCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: None,
        }
    }

    /// Kill the child and report [`CommandError::Timeout`] if it runs longer
    /// than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn io_error(&self, source: io::Error) -> CommandError {
        CommandError::Io {
            command: self.command.clone(),
            source,
        }
    }
}

#[async_trait]
impl CommandRunner for ShellCommand {
    async fn run(&self, input: Bytes) -> Result<CommandOutput, CommandError> {
        let mut child = Command::new(SHELL)
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        debug!(pid = ?child.id(), input_bytes = input.len(), "Spawned command");

        // stdin is fed from its own task while stdout and stderr drain
        let stdin = child.stdin.take();
        let writer = tokio::spawn(async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            let written = stdin.write_all(&input).await;
            drop(stdin);
            match written {
                // The child exited or closed stdin without reading everything
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                result => result,
            }
        });

        let waited = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, child.wait_with_output()).await {
                Ok(waited) => waited,
                Err(_) => {
                    // Dropping the wait future drops the child, which kills it
                    writer.abort();
                    warn!(timeout = ?timeout, "Command timed out, child killed");
                    return Err(CommandError::Timeout {
                        command: self.command.clone(),
                        timeout,
                    });
                }
            },
            None => child.wait_with_output().await,
        };
        let output = waited.map_err(|e| self.io_error(e))?;

        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(self.io_error(e)),
            Err(e) => return Err(self.io_error(io::Error::other(e))),
        }

        Ok(CommandOutput {
            stdout: Bytes::from(output.stdout),
            stderr: Bytes::from(output.stderr),
            exit_code: output.status.code(),
        })
    }

    fn command(&self) -> &str {
        &self.command
    }
}
