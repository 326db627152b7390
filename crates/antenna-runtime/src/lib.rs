//! # Antenna Runtime
//!
//! Queue client runtime for the Antenna listener, with an AWS SQS backend
//! and an in-memory backend for tests.
//!
//! This library provides:
//! - A provider-agnostic [`QueueClient`] trait (resolve, receive, delete)
//! - Long-poll receive of at most one message at a time
//! - Error classification into transient and permanent failures
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all queue operations
//! - [`message`] - Queue names, received messages and receipt handles
//! - [`provider`] - Provider types and configuration
//! - [`client`] - The `QueueClient` trait
//! - [`providers`] - SQS and in-memory implementations

pub mod client;
pub mod error;
pub mod message;
pub mod provider;
pub mod providers;

// Re-export commonly used types at crate root for convenience
pub use client::QueueClient;
pub use error::{ConfigurationError, QueueError, ValidationError};
pub use message::{
    MessageId, QueueName, QueueRef, ReceiptHandle, ReceiveOptions, ReceivedMessage, Timestamp,
    MAX_WAIT_TIME,
};
pub use provider::{AwsSqsConfig, InMemoryConfig, ProviderType};
pub use providers::{AwsError, InMemoryQueueClient, SqsQueueClient};
