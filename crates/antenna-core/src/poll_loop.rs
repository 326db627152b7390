//! # Poll Loop
//!
//! The poll-execute-acknowledge cycle. Each cycle long-polls the queue for a
//! single message, runs the command with the message body on stdin, mirrors
//! the command's output and deletes the message only when the configured
//! [`AckPolicy`] judges the invocation successful.
//!
//! A message that is not deleted becomes visible again once its visibility
//! timeout elapses and is redelivered by the queue. Delivery is therefore
//! at-least-once and the command must tolerate duplicates.
//!
//! The loop is strictly sequential: one message is received, executed and
//! acknowledged before the next receive is issued.

use crate::command::{AckPolicy, CommandRunner};
use crate::output::OutputMirror;
use antenna_runtime::{
    MessageId, QueueClient, QueueError, QueueRef, ReceiveOptions, ReceivedMessage, MAX_WAIT_TIME,
};
use base64::Engine;
use bytes::Bytes;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[cfg(test)]
#[path = "poll_loop_tests.rs"]
mod tests;

// ============================================================================
// Configuration
// ============================================================================

/// How the message body is turned into the command's stdin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyEncoding {
    /// Pass the body through unmodified
    #[default]
    Raw,

    /// Decode a base64 body. Bodies that are not valid base64 are passed
    /// through unmodified.
    Base64,
}

impl BodyEncoding {
    pub fn decode(&self, body: &Bytes) -> Bytes {
        match self {
            Self::Raw => body.clone(),
            Self::Base64 => base64::engine::general_purpose::STANDARD
                .decode(body)
                .map(Bytes::from)
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Body is not valid base64, passing it through unmodified");
                    body.clone()
                }),
        }
    }
}

/// Settings for the poll loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Long-poll wait per receive, at most 20 seconds
    pub wait_time: Duration,

    /// Visibility timeout requested for received messages. `None` keeps the
    /// queue's own setting.
    pub visibility_timeout: Option<Duration>,

    /// Delay after a transient receive error that carries no retry hint
    pub receive_retry_delay: Duration,

    pub ack_policy: AckPolicy,

    pub body_encoding: BodyEncoding,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            wait_time: MAX_WAIT_TIME,
            visibility_timeout: None,
            receive_retry_delay: Duration::from_secs(5),
            ack_policy: AckPolicy::default(),
            body_encoding: BodyEncoding::default(),
        }
    }
}

impl PollConfig {
    fn receive_options(&self) -> ReceiveOptions {
        let options = ReceiveOptions::new().with_wait_time(self.wait_time);
        match self.visibility_timeout {
            Some(timeout) => options.with_visibility_timeout(timeout),
            None => options,
        }
    }
}

// ============================================================================
// Outcomes and Errors
// ============================================================================

/// Result of a single poll cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The wait elapsed without a message
    Idle,

    /// The command succeeded and the message was deleted
    Acknowledged { message_id: MessageId },

    /// The command reported failure; the message stays on the queue
    Retained { message_id: MessageId },

    /// The command succeeded but the delete was rejected, e.g. because the
    /// receipt handle went stale. The message may be redelivered.
    AcknowledgeFailed { message_id: MessageId },

    /// The command could not be run to completion (spawn failure or
    /// timeout); the message stays on the queue
    CommandFailed { message_id: MessageId },

    /// A transient receive error; the caller should wait before polling again
    ReceiveFailed { retry_after: Duration },
}

/// Errors that stop the poll loop
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("Receiving from queue '{queue}' failed permanently: {source}")]
    Receive {
        queue: String,
        #[source]
        source: QueueError,
    },
}

enum Received {
    Message(ReceivedMessage),
    Empty,
    Retry(Duration),
}

// ============================================================================
// Poll Loop
// ============================================================================

/// Receives messages one at a time and runs the command for each
pub struct PollLoop {
    client: Arc<dyn QueueClient>,
    queue: QueueRef,
    runner: Arc<dyn CommandRunner>,
    output: Arc<dyn OutputMirror>,
    config: PollConfig,
}

impl PollLoop {
    pub fn new(
        client: Arc<dyn QueueClient>,
        queue: QueueRef,
        runner: Arc<dyn CommandRunner>,
        output: Arc<dyn OutputMirror>,
        config: PollConfig,
    ) -> Self {
        Self {
            client,
            queue,
            runner,
            output,
            config,
        }
    }

    pub fn queue(&self) -> &QueueRef {
        &self.queue
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Run one receive-execute-acknowledge cycle
    ///
    /// Only a permanent receive error is returned as `Err`. Transient receive
    /// errors are reported as [`CycleOutcome::ReceiveFailed`] without
    /// sleeping.
    pub async fn run_once(&self) -> Result<CycleOutcome, PollError> {
        match self.receive().await? {
            Received::Message(message) => Ok(self.process(message).await),
            Received::Empty => Ok(CycleOutcome::Idle),
            Received::Retry(retry_after) => Ok(CycleOutcome::ReceiveFailed { retry_after }),
        }
    }

    /// Run until a permanent receive error occurs
    pub async fn run(&self) -> Result<(), PollError> {
        self.run_until(std::future::pending()).await
    }

    /// Run until `shutdown` completes or a permanent receive error occurs
    ///
    /// Shutdown is only observed while waiting for a message or backing off.
    /// A command that is already running is allowed to finish and its
    /// message is acknowledged as usual.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), PollError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(
            queue = %self.queue,
            command = %self.runner.command(),
            "Listening for messages"
        );

        loop {
            let received = tokio::select! {
                _ = &mut shutdown => {
                    info!(queue = %self.queue, "Shutdown requested, stopping");
                    return Ok(());
                }
                received = self.receive() => received?,
            };

            match received {
                Received::Message(message) => {
                    self.process(message).await;
                }
                Received::Empty => {}
                Received::Retry(delay) => {
                    tokio::select! {
                        _ = &mut shutdown => {
                            info!(queue = %self.queue, "Shutdown requested, stopping");
                            return Ok(());
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    async fn receive(&self) -> Result<Received, PollError> {
        let options = self.config.receive_options();

        match self.client.receive_message(&self.queue, &options).await {
            Ok(Some(message)) => Ok(Received::Message(message)),
            Ok(None) => {
                debug!(queue = %self.queue, "No message within wait time");
                Ok(Received::Empty)
            }
            Err(e) if e.is_transient() => {
                let delay = e.retry_after().unwrap_or(self.config.receive_retry_delay);
                warn!(
                    queue = %self.queue,
                    error = %e,
                    retry_after = ?delay,
                    "Transient error receiving message"
                );
                Ok(Received::Retry(delay))
            }
            Err(e) => {
                error!(queue = %self.queue, error = %e, "Permanent error receiving message");
                Err(PollError::Receive {
                    queue: self.queue.name().to_string(),
                    source: e,
                })
            }
        }
    }

    async fn process(&self, message: ReceivedMessage) -> CycleOutcome {
        let message_id = message.message_id.clone();
        info!(
            queue = %self.queue,
            message_id = %message_id,
            receive_count = message.receive_count,
            body_bytes = message.body.len(),
            received_at = %message.received_at,
            "Received message"
        );

        let input = self.config.body_encoding.decode(&message.body);
        let output = match self.runner.run(input).await {
            Ok(output) => output,
            Err(e) => {
                error!(
                    message_id = %message_id,
                    error = %e,
                    "Command did not complete, message left on queue"
                );
                return CycleOutcome::CommandFailed { message_id };
            }
        };

        if !output.stdout.is_empty() {
            if let Err(e) = self.output.write_stdout(&output.stdout) {
                warn!(message_id = %message_id, error = %e, "Failed to forward command stdout");
            }
        }
        if !output.stderr.is_empty() {
            if let Err(e) = self.output.write_stderr(&output.stderr) {
                warn!(message_id = %message_id, error = %e, "Failed to forward command stderr");
            }
        }

        if !output.is_success(self.config.ack_policy) {
            warn!(
                message_id = %message_id,
                exit_code = ?output.exit_code,
                stderr_bytes = output.stderr.len(),
                "Command reported failure, message left on queue"
            );
            return CycleOutcome::Retained { message_id };
        }

        match self
            .client
            .delete_message(&self.queue, &message.receipt_handle)
            .await
        {
            Ok(()) => {
                info!(message_id = %message_id, "Message processed and deleted");
                CycleOutcome::Acknowledged { message_id }
            }
            Err(e) if e.is_stale_receipt() => {
                warn!(
                    message_id = %message_id,
                    error = %e,
                    "Receipt handle no longer valid, message may be redelivered"
                );
                CycleOutcome::AcknowledgeFailed { message_id }
            }
            Err(e) => {
                error!(
                    message_id = %message_id,
                    error = %e,
                    transient = e.is_transient(),
                    "Failed to delete message, it may be redelivered"
                );
                CycleOutcome::AcknowledgeFailed { message_id }
            }
        }
    }
}
