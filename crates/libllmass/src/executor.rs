use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::net::unix::pipe;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

pub const DEFAULT_SHELL: &str = "/bin/bash";

/// Hard wall-clock limit for one command.
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(300);

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// What a finished (or killed) command left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Interleaved stdout and stderr.
    pub output: String,
    pub duration: Duration,
    pub failed: bool,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl ExecOutcome {
    pub fn duration_text(&self) -> String {
        format!("{:?}", self.duration)
    }
}

/// Runs command text through `<shell> -c`.
#[derive(Debug, Clone)]
pub struct Executor {
    shell: PathBuf,
}

impl Executor {
    pub fn new(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    pub fn shell(&self) -> &Path {
        &self.shell
    }

    /// Run `command` to completion or until `timeout`.
    ///
    /// Never returns an error: spawn failures, non-zero exits and timeouts are
    /// all reported as a failed outcome with whatever output was captured.
    pub async fn run(&self, command: &str, timeout: Duration) -> ExecOutcome {
        let start = Instant::now();
        match self.run_captured(command, timeout).await {
            Ok((output, status)) => {
                let bytes = String::from_utf8_lossy(&output).into_owned();
                match status {
                    Some(status) => ExecOutcome {
                        output: bytes,
                        duration: start.elapsed(),
                        failed: !status.success(),
                        exit_code: status.code(),
                        timed_out: false,
                    },
                    None => ExecOutcome {
                        output: bytes,
                        duration: start.elapsed(),
                        failed: true,
                        exit_code: None,
                        timed_out: true,
                    },
                }
            }
            Err(e) => {
                warn!(shell = %self.shell.display(), "failed to start command: {e}");
                ExecOutcome {
                    output: format!("failed to start command: {e}"),
                    duration: start.elapsed(),
                    failed: true,
                    exit_code: None,
                    timed_out: false,
                }
            }
        }
    }

    /// Returns the captured bytes and the exit status, or `None` for the
    /// status when the timeout fired.
    async fn run_captured(
        &self,
        command: &str,
        timeout: Duration,
    ) -> std::io::Result<(Vec<u8>, Option<std::process::ExitStatus>)> {
        // stdout and stderr share one pipe so their ordering survives.
        let (reader, writer) = std::io::pipe()?;
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(writer.try_clone()?)
            .stderr(writer)
            .process_group(0)
            .kill_on_drop(true);
        let mut child = cmd.spawn()?;
        // Release our copies of the write end so EOF arrives when the child exits.
        drop(cmd);
        let mut rx = pipe::Receiver::from_owned_fd(OwnedFd::from(reader))?;

        let mut output = Vec::new();
        let finished = tokio::time::timeout(timeout, async {
            let mut chunk = [0u8; READ_CHUNK_BYTES];
            loop {
                let n = rx.read(&mut chunk).await?;
                if n == 0 {
                    break;
                }
                output.extend_from_slice(&chunk[..n]);
            }
            child.wait().await
        })
        .await;

        match finished {
            Ok(status) => {
                let status = status?;
                debug!(code = ?status.code(), bytes = output.len(), "command finished");
                Ok((output, Some(status)))
            }
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "command timed out, killing");
                kill_process_group(&mut child).await;
                Ok((output, None))
            }
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(DEFAULT_SHELL)
    }
}

async fn kill_process_group(child: &mut Child) {
    if let Some(pid) = child.id() {
        // SAFETY: killpg has no memory-safety preconditions. The child was
        // spawned as the leader of its own process group.
        unsafe {
            libc::killpg(pid as libc::pid_t, libc::SIGKILL);
        }
    }
    let _ = child.start_kill();
    let _ = child.wait().await;
}
