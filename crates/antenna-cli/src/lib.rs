//! # Antenna CLI
//!
//! Command-line interface for the Antenna queue listener.
//!
//! Grab a message from a queue, run a command and if it worked, remove the
//! message:
//!
//! ```text
//! antenna listen <profile> <queue> "<command>" 1> antenna.log 2> antenna.err.log
//! ```
//!
//! Credentials are read from `~/.aws/config` or `~/.boto`. Agent diagnostics
//! are logged to stderr; stdout carries only the commands' own output.

use antenna_core::{
    AckPolicy, BodyEncoding, CredentialSources, CredentialsError, PollConfig, PollError, PollLoop,
    ShellCommand, StdStreams,
};
use antenna_runtime::{QueueClient, QueueError, QueueName, SqsQueueClient, MAX_WAIT_TIME};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

// ============================================================================
// CLI Structure
// ============================================================================

/// Antenna - run a command for every message on an SQS queue
#[derive(Debug, Parser)]
#[command(name = "antenna")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run a command for every message on an SQS queue")]
#[command(
    long_about = "Antenna long-polls an SQS queue for one message at a time, runs a shell command \
                  with the message body on stdin and deletes the message only if the command \
                  wrote nothing to stderr"
)]
pub struct Cli {
    /// Logging level or filter directive (overridden by RUST_LOG)
    #[arg(
        short,
        long,
        default_value = "info",
        env = "ANTENNA_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "ANTENNA_JSON_LOGS", global = true)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Listen on a queue and run the command for each message
    Listen(ListenArgs),

    /// Generate a service definition for running the listener as a daemon
    Configure(ConfigureArgs),
}

/// Profile, queue and command shared by all subcommands
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// Profile name in ~/.aws/config or ~/.boto
    pub profile: String,

    /// Name of the SQS queue
    pub queue: String,

    /// Shell command to run for each message, with the body on stdin
    pub command: String,
}

#[derive(Debug, Clone, Args)]
pub struct ListenArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Long-poll wait per receive, in seconds (0-20)
    #[arg(
        long,
        env = "ANTENNA_WAIT_TIME",
        default_value_t = MAX_WAIT_TIME.as_secs(),
        value_parser = clap::value_parser!(u64).range(0..=20)
    )]
    pub wait_time: u64,

    /// Visibility timeout requested for received messages, in seconds
    #[arg(long, env = "ANTENNA_VISIBILITY_TIMEOUT")]
    pub visibility_timeout: Option<u64>,

    /// Kill the command and keep the message if it runs longer than this
    /// many seconds
    #[arg(long, env = "ANTENNA_COMMAND_TIMEOUT")]
    pub command_timeout: Option<u64>,

    /// Delete the message when the command exits with status 0, regardless
    /// of stderr output
    #[arg(long, env = "ANTENNA_ACK_ON_EXIT_STATUS")]
    pub ack_on_exit_status: bool,

    /// Base64-decode message bodies before passing them to the command
    #[arg(long, env = "ANTENNA_BASE64_BODY")]
    pub base64_body: bool,

    /// Credential file to search instead of ~/.aws/config and ~/.boto
    /// (repeatable, searched in order)
    #[arg(long = "credentials-file", value_name = "PATH")]
    pub credentials_files: Vec<PathBuf>,

    /// SQS endpoint URL override, e.g. a local SQS emulator
    #[arg(long, env = "ANTENNA_ENDPOINT")]
    pub endpoint: Option<String>,
}

impl ListenArgs {
    /// Loop settings selected by the flags
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            wait_time: Duration::from_secs(self.wait_time),
            visibility_timeout: self.visibility_timeout.map(Duration::from_secs),
            ack_policy: if self.ack_on_exit_status {
                AckPolicy::ExitStatus
            } else {
                AckPolicy::EmptyStderr
            },
            body_encoding: if self.base64_body {
                BodyEncoding::Base64
            } else {
                BodyEncoding::Raw
            },
            ..PollConfig::default()
        }
    }

    /// Shell command with the configured timeout
    pub fn shell_command(&self) -> ShellCommand {
        let command = ShellCommand::new(self.target.command.clone());
        match self.command_timeout {
            Some(seconds) => command.with_timeout(Duration::from_secs(seconds)),
            None => command,
        }
    }

    /// Credential files to search
    pub fn credential_sources(&self) -> Result<CredentialSources, CliError> {
        if self.credentials_files.is_empty() {
            Ok(CredentialSources::default_locations()?)
        } else {
            Ok(CredentialSources::from_files(self.credentials_files.clone()))
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ConfigureArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Credentials error: {0}")]
    Credentials(#[from] CredentialsError),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Logging setup failed: {message}")]
    Logging { message: String },

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("{command} is not implemented")]
    NotImplemented { command: String },

    #[error("Listener stopped: {0}")]
    Poll(#[from] PollError),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Credentials(_) => 1,
            Self::Configuration { .. } => 1,
            Self::Logging { .. } => 1,
            Self::InvalidArgument { .. } => 1,
            Self::Queue(_) => 2,
            Self::NotImplemented { .. } => 3,
            Self::Poll(_) => 4,
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    match cli.command {
        Commands::Listen(args) => execute_listen_command(args).await,
        Commands::Configure(args) => execute_configure_command(args),
    }
}

/// Initialize logging to stderr based on CLI arguments
fn initialize_logging(cli: &Cli) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .map_err(|e| CliError::Logging {
            message: format!("invalid log level '{}': {}", cli.log_level, e),
        })?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if cli.json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| CliError::Logging {
        message: e.to_string(),
    })
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn execute_listen_command(args: ListenArgs) -> Result<(), CliError> {
    let queue_name =
        QueueName::new(args.target.queue.clone()).map_err(|e| CliError::InvalidArgument {
            arg: "queue".to_string(),
            message: e.to_string(),
        })?;

    let credentials = args.credential_sources()?.resolve(&args.target.profile)?;
    info!(
        profile = %credentials.profile(),
        region = %credentials.region(),
        source = %credentials.source().display(),
        "Loaded credentials"
    );

    let client = SqsQueueClient::connect(credentials.to_sqs_config(args.endpoint.clone()))
        .map_err(|e| CliError::Configuration {
            message: e.to_string(),
        })?;
    let queue = client.resolve_queue(&queue_name).await?;
    info!(queue = %queue, url = %queue.url(), "Resolved queue");

    let poll_loop = PollLoop::new(
        Arc::new(client),
        queue,
        Arc::new(args.shell_command()),
        Arc::new(StdStreams),
        args.poll_config(),
    );

    poll_loop.run_until(shutdown_signal()).await?;
    Ok(())
}

fn execute_configure_command(args: ConfigureArgs) -> Result<(), CliError> {
    warn!(
        profile = %args.target.profile,
        queue = %args.target.queue,
        "Service definition generation requested"
    );
    Err(CliError::NotImplemented {
        command: "configure".to_string(),
    })
}

/// Completes on Ctrl-C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl-C, stop the process with a signal instead");
        std::future::pending::<()>().await;
    }
}
