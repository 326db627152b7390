//! Message types for queue operations including core domain identifiers.

use crate::error::ValidationError;
use crate::provider::ProviderType;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Core Domain Identifiers
// ============================================================================

/// Maximum length of an SQS queue name, including any `.fifo` suffix
const MAX_QUEUE_NAME_LENGTH: usize = 80;

/// Suffix that marks a FIFO queue
const FIFO_SUFFIX: &str = ".fifo";

/// Validated queue name following SQS naming rules
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueName(String);

impl QueueName {
    /// Create new queue name with validation
    pub fn new(name: String) -> Result<Self, ValidationError> {
        if name.is_empty() || name.len() > MAX_QUEUE_NAME_LENGTH {
            return Err(ValidationError::OutOfRange {
                field: "queue_name".to_string(),
                message: format!("must be 1-{} characters", MAX_QUEUE_NAME_LENGTH),
            });
        }

        let base = name.strip_suffix(FIFO_SUFFIX).unwrap_or(&name);
        if base.is_empty() {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "name cannot consist of the .fifo suffix alone".to_string(),
            });
        }

        if !base
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "only ASCII alphanumeric, hyphens, and underscores allowed".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Check whether this names a FIFO queue
    pub fn is_fifo(&self) -> bool {
        self.0.ends_with(FIFO_SUFFIX)
    }

    /// Get queue name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

/// Backend-assigned identifier of a message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    /// Generate new random message ID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::Required {
                field: "message_id".to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

/// Resolved reference to a queue on a specific backend
///
/// Produced by [`crate::QueueClient::resolve_queue`] and passed back into
/// every receive and delete call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueRef {
    name: QueueName,
    url: String,
}

impl QueueRef {
    /// Create queue reference from a name and the backend address
    pub fn new(name: QueueName, url: String) -> Self {
        Self { name, url }
    }

    /// Logical queue name
    pub fn name(&self) -> &QueueName {
        &self.name
    }

    /// Backend-specific queue address (the SQS queue URL)
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Display for QueueRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Timestamp wrapper for consistent time handling
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current time
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S UTC"))
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// A message received from the queue with processing metadata
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message_id: MessageId,
    pub body: Bytes,
    pub receipt_handle: ReceiptHandle,
    /// Approximate number of times the backend has delivered this message
    pub receive_count: u32,
    pub received_at: Timestamp,
}

/// Opaque token identifying one delivery of a message
///
/// Required to delete the message. A handle becomes stale once the message
/// has been deleted or redelivered.
#[derive(Clone, PartialEq, Eq)]
pub struct ReceiptHandle {
    handle: String,
    provider_type: ProviderType,
}

impl ReceiptHandle {
    /// Create new receipt handle
    pub fn new(handle: String, provider_type: ProviderType) -> Self {
        Self {
            handle,
            provider_type,
        }
    }

    /// Get handle string
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Get provider type
    pub fn provider_type(&self) -> ProviderType {
        self.provider_type
    }
}

// SQS receipt handles run to several hundred characters
impl std::fmt::Debug for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix: String = self.handle.chars().take(16).collect();
        f.debug_struct("ReceiptHandle")
            .field("handle", &format!("{}...", prefix))
            .field("provider_type", &self.provider_type)
            .finish()
    }
}

// ============================================================================
// Receive Options
// ============================================================================

/// Longest long-poll wait SQS accepts
pub const MAX_WAIT_TIME: Duration = Duration::from_secs(20);

/// Configuration options for receiving messages from queues
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveOptions {
    /// Maximum number of messages to receive in one request
    pub max_messages: u32,
    /// Server-side long-poll wait
    pub wait_time: Duration,
    /// Visibility timeout override for the received message
    pub visibility_timeout: Option<Duration>,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            max_messages: 1,
            wait_time: MAX_WAIT_TIME,
            visibility_timeout: None,
        }
    }
}

impl ReceiveOptions {
    /// Create new receive options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set long-poll wait, clamped to the SQS maximum of 20 seconds
    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time.min(MAX_WAIT_TIME);
        self
    }

    /// Set visibility timeout for received messages
    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
