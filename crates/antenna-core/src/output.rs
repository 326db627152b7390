//! Forwarding of captured command output to the agent's own streams.

use std::io::{self, Write};
use std::sync::Mutex;

/// Destination for a command's captured stdout and stderr
pub trait OutputMirror: Send + Sync {
    fn write_stdout(&self, bytes: &[u8]) -> io::Result<()>;

    fn write_stderr(&self, bytes: &[u8]) -> io::Result<()>;
}

/// Writes to the process's stdout and stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct StdStreams;

impl OutputMirror for StdStreams {
    fn write_stdout(&self, bytes: &[u8]) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(bytes)?;
        stdout.flush()
    }

    fn write_stderr(&self, bytes: &[u8]) -> io::Result<()> {
        let mut stderr = io::stderr().lock();
        stderr.write_all(bytes)?;
        stderr.flush()
    }
}

/// Collects mirrored output in memory
#[derive(Debug, Default)]
pub struct BufferedOutput {
    stdout: Mutex<Vec<u8>>,
    stderr: Mutex<Vec<u8>>,
}

impl BufferedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written to stdout so far
    pub fn stdout_contents(&self) -> Vec<u8> {
        self.stdout.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Everything written to stderr so far
    pub fn stderr_contents(&self) -> Vec<u8> {
        self.stderr.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

impl OutputMirror for BufferedOutput {
    fn write_stdout(&self, bytes: &[u8]) -> io::Result<()> {
        append(&self.stdout, bytes)
    }

    fn write_stderr(&self, bytes: &[u8]) -> io::Result<()> {
        append(&self.stderr, bytes)
    }
}

fn append(buffer: &Mutex<Vec<u8>>, bytes: &[u8]) -> io::Result<()> {
    buffer
        .lock()
        .map_err(|_| io::Error::other("output buffer lock poisoned"))?
        .extend_from_slice(bytes);
    Ok(())
}
