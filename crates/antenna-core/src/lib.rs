//! # Antenna Core
//!
//! Core logic of the Antenna queue listener: grab a message from a queue,
//! run a command with the message body on stdin and, if it worked, remove
//! the message.
//!
//! ## Architecture
//!
//! - [`poll_loop`] drives the receive-execute-acknowledge cycle
//! - [`command`] runs the shell command and decides success
//! - [`output`] forwards command output to the agent's streams
//! - [`credentials`] resolves profile credentials from ini files
//!
//! The loop depends only on the [`antenna_runtime::QueueClient`],
//! [`CommandRunner`] and [`OutputMirror`] traits, so the queue backend,
//! the command execution and the output destination are injected at
//! startup.
//!
//! ## Usage
//!
//! ```no_run
//! use antenna_core::{PollConfig, PollLoop, ShellCommand, StdStreams};
//! use antenna_runtime::{InMemoryQueueClient, QueueClient, QueueName};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(InMemoryQueueClient::default());
//! let name = QueueName::new("jobs".to_string())?;
//! client.create_queue(&name)?;
//! let queue = client.resolve_queue(&name).await?;
//!
//! let poll_loop = PollLoop::new(
//!     client,
//!     queue,
//!     Arc::new(ShellCommand::new("cat >> log.txt")),
//!     Arc::new(StdStreams),
//!     PollConfig::default(),
//! );
//! poll_loop.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod credentials;
pub mod output;
pub mod poll_loop;

pub use command::{AckPolicy, CommandError, CommandOutput, CommandRunner, ShellCommand};
pub use credentials::{CredentialSources, CredentialsError, ProfileCredentials};
pub use output::{BufferedOutput, OutputMirror, StdStreams};
pub use poll_loop::{BodyEncoding, CycleOutcome, PollConfig, PollError, PollLoop};
