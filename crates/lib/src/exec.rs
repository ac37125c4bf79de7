//! Execution layer: run a whitelisted command line through `sh -c`.
//!
//! Stdout and stderr share one pipe so the captured output keeps the order the
//! shell produced it in. The command runs in its own process group; the whole group
//! is killed when the timeout elapses or when the future is dropped (e.g. the HTTP
//! client disconnects), so backgrounded children cannot outlive the request.

use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::unix::pipe;
use tokio::process::Command;

/// Extra variable set in every executed command's environment.
pub const EXTRA_ENV: (&str, &str) = ("TESTAAA", "your_value");

/// How long to keep reading after a timeout kill before giving up on the pipe.
const DRAIN_AFTER_KILL: Duration = Duration::from_millis(200);

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("spawn failed: {0}")]
    Spawn(std::io::Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Exit(ExitStatus),

    #[error("timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
}

/// A failed execution: what went wrong plus whatever output was captured.
#[derive(Debug)]
pub struct ExecFailure {
    pub error: ExecError,
    pub output: Vec<u8>,
}

impl ExecFailure {
    fn new(error: ExecError, output: Vec<u8>) -> Self {
        Self { error, output }
    }
}

/// Combined output on success, [`ExecFailure`] on spawn failure, non-zero exit or timeout.
pub type ExecutionResult = Result<Vec<u8>, ExecFailure>;

/// Runs a command line. Implemented by [`ShellExecutor`]; tests substitute fakes.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: &str) -> ExecutionResult;
}

/// Executes through a POSIX shell (`sh -c <command>`).
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
    timeout: Option<Duration>,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            timeout: None,
        }
    }
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the command if it runs longer than `timeout`. `None` means no limit.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// SIGKILLs a process group when dropped, unless disarmed.
struct GroupKill {
    pgid: Option<libc::pid_t>,
}

impl GroupKill {
    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            // Negative pid addresses the whole group.
            let _ = unsafe { libc::kill(-pgid, libc::SIGKILL) };
        }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupKill {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Append everything read from `reader` to `buf` until EOF. Each read is cancel-safe, so
/// `buf` keeps what arrived before the future is dropped.
async fn read_into(reader: &mut pipe::Receiver, buf: &mut Vec<u8>) -> std::io::Result<()> {
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(&self, command: &str) -> ExecutionResult {
        let spawn_err = |e| ExecFailure::new(ExecError::Spawn(e), Vec::new());
        let (reader, writer) = std::io::pipe().map_err(spawn_err)?;
        let mut reader = pipe::Receiver::from_owned_fd(std::os::fd::OwnedFd::from(reader))
            .map_err(spawn_err)?;
        let mut child = {
            let stderr_writer = writer.try_clone().map_err(spawn_err)?;
            let mut cmd = Command::new(&self.shell);
            cmd.arg("-c")
                .arg(command)
                .env(EXTRA_ENV.0, EXTRA_ENV.1)
                .stdin(Stdio::null())
                .stdout(writer)
                .stderr(stderr_writer)
                .process_group(0)
                .kill_on_drop(true);
            // `cmd` owns the write ends; it must be dropped before reading to EOF.
            cmd.spawn().map_err(spawn_err)?
        };
        let mut group = GroupKill {
            pgid: child.id().map(|pid| pid as libc::pid_t),
        };

        let mut output = Vec::new();
        let finished = {
            // Exit and pipe EOF share one deadline; a background job holding the pipe
            // counts as still running.
            let run = async {
                let (status, read) =
                    tokio::join!(child.wait(), read_into(&mut reader, &mut output));
                read.and(status)
            };
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, run).await.ok(),
                None => Some(run.await),
            }
        };

        let status = match finished {
            Some(Ok(status)) => status,
            Some(Err(e)) => return Err(ExecFailure::new(ExecError::Io(e), output)),
            None => {
                let limit = self.timeout.unwrap_or_default();
                group.kill();
                let drain = read_into(&mut reader, &mut output);
                let _ = tokio::time::timeout(DRAIN_AFTER_KILL, drain).await;
                let _ = child.wait().await;
                log::warn!("command timed out after {}s: {}", limit.as_secs(), command);
                return Err(ExecFailure::new(ExecError::TimedOut(limit), output));
            }
        };
        group.disarm();

        if status.success() {
            Ok(output)
        } else {
            Err(ExecFailure::new(ExecError::Exit(status), output))
        }
    }
}
