//! In-memory queue provider implementation for testing and development.
//!
//! Behaves like an SQS standard queue as seen by a single consumer:
//! - Received messages stay hidden until their visibility timeout elapses
//!   or they are deleted
//! - Every delivery gets a fresh receipt handle, so a handle from an earlier
//!   delivery is rejected as stale
//! - Receives long-poll until a message is sent, a hidden message becomes
//!   visible again, or the wait time runs out
//!
//! Timing uses `tokio::time`, so tests can pause and advance the clock.

use crate::client::QueueClient;
use crate::error::{QueueError, ValidationError};
use crate::message::{
    MessageId, QueueName, QueueRef, ReceiptHandle, ReceivedMessage, ReceiveOptions, Timestamp,
};
use crate::provider::{InMemoryConfig, ProviderType};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// Internal queue state for a single queue
#[derive(Default)]
struct InMemoryQueue {
    /// Visible messages in delivery order
    messages: VecDeque<StoredMessage>,
    /// Received but not yet deleted, keyed by receipt handle
    in_flight: HashMap<String, InFlightMessage>,
    /// IDs of deleted messages in deletion order
    deleted: Vec<MessageId>,
}

impl InMemoryQueue {
    /// Return messages whose visibility timeout has elapsed to the queue
    fn release_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, entry)| entry.visible_at <= now)
            .map(|(handle, _)| handle.clone())
            .collect();

        for handle in expired {
            if let Some(entry) = self.in_flight.remove(&handle) {
                self.messages.push_back(entry.message);
            }
        }
    }

    /// Earliest point at which a hidden message becomes visible again
    fn next_visible_at(&self) -> Option<Instant> {
        self.in_flight.values().map(|entry| entry.visible_at).min()
    }
}

#[derive(Clone)]
struct StoredMessage {
    message_id: MessageId,
    body: Bytes,
    receive_count: u32,
}

struct InFlightMessage {
    message: StoredMessage,
    visible_at: Instant,
}

// ============================================================================
// InMemoryQueueClient
// ============================================================================

/// In-memory queue client
///
/// Queues must be created with [`InMemoryQueueClient::create_queue`] before
/// they can be resolved.
pub struct InMemoryQueueClient {
    queues: Mutex<HashMap<QueueName, InMemoryQueue>>,
    notify: Notify,
    config: InMemoryConfig,
}

impl InMemoryQueueClient {
    /// Create new in-memory client with configuration
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            config,
        }
    }

    /// Create an empty queue. Creating an existing queue is a no-op.
    pub fn create_queue(&self, name: &QueueName) -> Result<(), QueueError> {
        self.lock()?.entry(name.clone()).or_default();
        Ok(())
    }

    /// Append a message to a queue and wake any waiting receive
    pub fn send(&self, queue: &QueueName, body: impl Into<Bytes>) -> Result<MessageId, QueueError> {
        let body = body.into();
        let max_size = ProviderType::InMemory.max_message_size();
        if body.len() > max_size {
            return Err(ValidationError::OutOfRange {
                field: "body".to_string(),
                message: format!("{} bytes exceeds the {} byte limit", body.len(), max_size),
            }
            .into());
        }

        let message_id = MessageId::new();
        {
            let mut queues = self.lock()?;
            let entry = queues.get_mut(queue).ok_or_else(|| not_found(queue))?;
            entry.messages.push_back(StoredMessage {
                message_id: message_id.clone(),
                body,
                receive_count: 0,
            });
        }

        self.notify.notify_waiters();
        Ok(message_id)
    }

    /// Number of messages not yet deleted, visible or in flight
    pub fn message_count(&self, queue: &QueueName) -> Result<usize, QueueError> {
        self.with_queue(queue, |q| q.messages.len() + q.in_flight.len())
    }

    /// Number of received messages currently hidden by their visibility timeout
    pub fn in_flight_count(&self, queue: &QueueName) -> Result<usize, QueueError> {
        let now = Instant::now();
        self.with_queue(queue, |q| {
            q.in_flight
                .values()
                .filter(|entry| entry.visible_at > now)
                .count()
        })
    }

    /// IDs of all messages deleted from a queue, in deletion order
    pub fn deleted_messages(&self, queue: &QueueName) -> Result<Vec<MessageId>, QueueError> {
        self.with_queue(queue, |q| q.deleted.clone())
    }

    fn with_queue<T>(
        &self,
        queue: &QueueName,
        f: impl FnOnce(&InMemoryQueue) -> T,
    ) -> Result<T, QueueError> {
        let queues = self.lock()?;
        queues.get(queue).map(f).ok_or_else(|| not_found(queue))
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<QueueName, InMemoryQueue>>, QueueError> {
        self.queues.lock().map_err(|_| QueueError::ProviderError {
            provider: ProviderType::InMemory.to_string(),
            code: "LockPoisoned".to_string(),
            message: "queue storage lock poisoned".to_string(),
        })
    }

    /// Take the next visible message, or report when to look again
    fn try_receive(
        &self,
        queue: &QueueName,
        visibility_timeout: std::time::Duration,
    ) -> Result<Result<ReceivedMessage, Option<Instant>>, QueueError> {
        let now = Instant::now();
        let mut queues = self.lock()?;
        let entry = queues.get_mut(queue).ok_or_else(|| not_found(queue))?;
        entry.release_expired(now);

        let Some(mut message) = entry.messages.pop_front() else {
            return Ok(Err(entry.next_visible_at()));
        };

        message.receive_count += 1;
        let handle = uuid::Uuid::new_v4().to_string();
        let received = ReceivedMessage {
            message_id: message.message_id.clone(),
            body: message.body.clone(),
            receipt_handle: ReceiptHandle::new(handle.clone(), ProviderType::InMemory),
            receive_count: message.receive_count,
            received_at: Timestamp::now(),
        };

        entry.in_flight.insert(
            handle,
            InFlightMessage {
                message,
                visible_at: now + visibility_timeout,
            },
        );

        Ok(Ok(received))
    }
}

impl Default for InMemoryQueueClient {
    fn default() -> Self {
        Self::new(InMemoryConfig::default())
    }
}

fn not_found(queue: &QueueName) -> QueueError {
    QueueError::QueueNotFound {
        queue_name: queue.to_string(),
    }
}

#[async_trait]
impl QueueClient for InMemoryQueueClient {
    async fn resolve_queue(&self, name: &QueueName) -> Result<QueueRef, QueueError> {
        if !self.lock()?.contains_key(name) {
            return Err(not_found(name));
        }

        Ok(QueueRef::new(name.clone(), format!("memory://{}", name)))
    }

    async fn receive_message(
        &self,
        queue: &QueueRef,
        options: &ReceiveOptions,
    ) -> Result<Option<ReceivedMessage>, QueueError> {
        let visibility_timeout = options
            .visibility_timeout
            .unwrap_or(self.config.default_visibility_timeout);
        let deadline = Instant::now() + options.wait_time;

        loop {
            // Registered before the check so a send in between is not missed
            let notified = self.notify.notified();

            let next_visible_at = match self.try_receive(queue.name(), visibility_timeout)? {
                Ok(message) => {
                    debug!(
                        queue = %queue,
                        message_id = %message.message_id,
                        receive_count = message.receive_count,
                        "Delivered message"
                    );
                    return Ok(Some(message));
                }
                Err(next_visible_at) => next_visible_at,
            };

            if Instant::now() >= deadline {
                return Ok(None);
            }

            let wake_at = next_visible_at.map_or(deadline, |at| at.min(deadline));
            // Either outcome means the queue is worth checking again
            let _ = tokio::time::timeout_at(wake_at, notified).await;
        }
    }

    async fn delete_message(
        &self,
        queue: &QueueRef,
        receipt: &ReceiptHandle,
    ) -> Result<(), QueueError> {
        let mut queues = self.lock()?;
        let entry = queues
            .get_mut(queue.name())
            .ok_or_else(|| not_found(queue.name()))?;

        match entry.in_flight.remove(receipt.handle()) {
            Some(in_flight) => {
                entry.deleted.push(in_flight.message.message_id);
                Ok(())
            }
            None => Err(QueueError::MessageNotFound {
                receipt: receipt.handle().to_string(),
            }),
        }
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }
}
