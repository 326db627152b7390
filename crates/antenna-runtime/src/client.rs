//! Client trait for queue operations.

use crate::error::QueueError;
use crate::message::{QueueName, QueueRef, ReceiptHandle, ReceivedMessage, ReceiveOptions};
use crate::provider::ProviderType;
use async_trait::async_trait;

/// Main interface for queue operations across all providers
///
/// Implementations hold an established, authenticated connection. They are
/// constructed once at startup and shared by reference for the lifetime of
/// the process.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Map a logical queue name to a backend queue reference
    ///
    /// Fails with [`QueueError::QueueNotFound`] when the queue does not
    /// exist for the authenticated account and region.
    async fn resolve_queue(&self, name: &QueueName) -> Result<QueueRef, QueueError>;

    /// Long-poll for at most one message
    ///
    /// Blocks server-side up to `options.wait_time` and returns `Ok(None)`
    /// when the wait elapses without a message becoming available.
    async fn receive_message(
        &self,
        queue: &QueueRef,
        options: &ReceiveOptions,
    ) -> Result<Option<ReceivedMessage>, QueueError>;

    /// Remove a message using the receipt handle of its current delivery
    ///
    /// Fails with [`QueueError::MessageNotFound`] when the handle is stale.
    async fn delete_message(
        &self,
        queue: &QueueRef,
        receipt: &ReceiptHandle,
    ) -> Result<(), QueueError>;

    /// Get provider type
    fn provider_type(&self) -> ProviderType;
}
