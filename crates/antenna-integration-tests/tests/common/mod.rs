//! Common test utilities for antenna integration tests
//!
//! Builds a poll loop that runs real shell commands against the in-memory
//! queue and captures the mirrored output.

use antenna_core::{BufferedOutput, PollConfig, PollLoop, ShellCommand};
use antenna_runtime::{InMemoryQueueClient, QueueClient, QueueName};
use std::sync::Arc;
use std::time::Duration;

pub const QUEUE: &str = "integration-jobs";

/// A poll loop wired to an in-memory queue
pub struct Listener {
    pub queue: Arc<InMemoryQueueClient>,
    pub output: Arc<BufferedOutput>,
    pub poll_loop: PollLoop,
}

impl Listener {
    pub fn queue_name(&self) -> QueueName {
        queue_name()
    }

    #[allow(dead_code)]
    pub fn send(&self, body: &'static str) -> antenna_runtime::MessageId {
        self.queue.send(&queue_name(), body).unwrap()
    }

    #[allow(dead_code)]
    pub fn deleted_count(&self) -> usize {
        self.queue.deleted_messages(&queue_name()).unwrap().len()
    }

    #[allow(dead_code)]
    pub fn stdout(&self) -> String {
        String::from_utf8(self.output.stdout_contents()).unwrap()
    }

    #[allow(dead_code)]
    pub fn stderr(&self) -> String {
        String::from_utf8(self.output.stderr_contents()).unwrap()
    }
}

pub fn queue_name() -> QueueName {
    QueueName::new(QUEUE.to_string()).unwrap()
}

/// Loop settings that never block on an empty queue
#[allow(dead_code)]
pub fn immediate_config() -> PollConfig {
    PollConfig {
        wait_time: Duration::ZERO,
        ..PollConfig::default()
    }
}

pub async fn listener(command: ShellCommand, config: PollConfig) -> Listener {
    let queue = Arc::new(InMemoryQueueClient::default());
    queue.create_queue(&queue_name()).unwrap();
    let queue_ref = queue.resolve_queue(&queue_name()).await.unwrap();

    let output = Arc::new(BufferedOutput::new());
    let poll_loop = PollLoop::new(
        queue.clone(),
        queue_ref,
        Arc::new(command),
        output.clone(),
        config,
    );

    Listener {
        queue,
        output,
        poll_loop,
    }
}
