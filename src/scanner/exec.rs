use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use wait_timeout::ChildExt;

/// Capture cap per stream. Scanner JSON for a large tree runs to a few
/// hundred KiB; anything past this is diagnostic noise.
pub const MAX_CAPTURE_BYTES: usize = 1024 * 1024;

const TRUNCATION_MARKER: &str = "... [truncated]";

#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// None when the child was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("binary not found")]
    NotFound,

    #[error("timed out")]
    TimedOut,

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Run a command with a wall-clock deadline, capturing both streams.
/// On expiry the child is killed and reaped; no orphan survives the call.
pub fn run_command(
    binary: &str,
    args: &[String],
    timeout: Duration,
) -> Result<CommandOutput, ExecError> {
    capture_command(binary, args, timeout, MAX_CAPTURE_BYTES)
}

pub(crate) fn capture_command(
    binary: &str,
    args: &[String],
    timeout: Duration,
    capture_limit: usize,
) -> Result<CommandOutput, ExecError> {
    let mut child = match Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ExecError::NotFound),
        Err(e) => return Err(ExecError::Io(e)),
    };

    // Drain both pipes while waiting. A child that fills the pipe buffer
    // would otherwise block and turn every large report into a timeout.
    let stdout_reader = spawn_reader(child.stdout.take(), capture_limit);
    let stderr_reader = spawn_reader(child.stderr.take(), capture_limit);

    let status = match child.wait_timeout(timeout)? {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            // the readers hit EOF once the child is reaped
            let _ = join_reader(stdout_reader);
            let _ = join_reader(stderr_reader);
            return Err(ExecError::TimedOut);
        }
    };

    let (stdout, stdout_truncated) = join_reader(stdout_reader);
    let (stderr, stderr_truncated) = join_reader(stderr_reader);

    Ok(CommandOutput {
        exit_code: status.code(),
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
    })
}

type ReaderHandle = thread::JoinHandle<(String, bool)>;

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>, limit: usize) -> Option<ReaderHandle> {
    pipe.map(|mut stream| {
        thread::spawn(move || {
            let mut buf: Vec<u8> = Vec::new();
            let mut chunk = [0u8; 8192];
            let mut truncated = false;
            loop {
                match stream.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => {
                        if buf.len() < limit {
                            let take = n.min(limit - buf.len());
                            buf.extend_from_slice(&chunk[..take]);
                            if take < n {
                                truncated = true;
                            }
                        } else {
                            truncated = true;
                        }
                    }
                    Err(_) => break,
                }
            }
            let mut text = String::from_utf8_lossy(&buf).into_owned();
            if truncated {
                text.push_str(TRUNCATION_MARKER);
            }
            (text, truncated)
        })
    })
}

fn join_reader(handle: Option<ReaderHandle>) -> (String, bool) {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_else(|| (String::new(), false))
}
