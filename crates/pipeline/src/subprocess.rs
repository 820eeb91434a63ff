//! Bounded execution of external tools.
//!
//! [`run_tool`] is the one place that spawns processes. Every invocation is
//! wall-clock bounded: when the deadline passes the child is killed and
//! reaped before the error is returned, and `kill_on_drop` covers the case
//! where the awaiting task itself is dropped.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::error::ToolError;

/// Maximum stdout size captured (64 MiB). A single PNG frame piped from
/// ffmpeg is the largest expected payload.
const MAX_STDOUT_BYTES: usize = 64 * 1024 * 1024;

/// Maximum stderr size captured (1 MiB).
const MAX_STDERR_BYTES: usize = 1024 * 1024;

/// Characters of stderr kept in error diagnostics.
const DIAGNOSTIC_CHARS: usize = 2000;

/// Output of a successful tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
    pub duration_ms: u64,
}

/// Spawn `cmd`, capture its output, and enforce `timeout`.
///
/// The caller sets program and arguments; stdio and kill-on-drop are
/// configured here. `tool` names the binary in errors and logs.
pub async fn run_tool(
    tool: &str,
    cmd: &mut Command,
    timeout: Duration,
) -> Result<ToolOutput, ToolError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let start = Instant::now();

    let mut child = cmd.spawn().map_err(|e| match e.kind() {
        ErrorKind::NotFound | ErrorKind::PermissionDenied => ToolError::NotFound {
            tool: tool.to_string(),
            source: e,
        },
        _ => ToolError::Io(e),
    })?;

    // Drain both pipes concurrently so a chatty child never blocks on a
    // full pipe while we wait for it.
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_task = tokio::spawn(read_stream(stdout_handle, MAX_STDOUT_BYTES));
    let stderr_task = tokio::spawn(read_stream(stderr_handle, MAX_STDERR_BYTES));

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            let duration_ms = start.elapsed().as_millis() as u64;
            let stdout = stdout_task.await.unwrap_or_default();
            let stderr_bytes = stderr_task.await.unwrap_or_default();
            let stderr = String::from_utf8_lossy(&stderr_bytes).into_owned();

            if !status.success() {
                tracing::debug!(tool, exit_code = ?status.code(), duration_ms, "Tool exited with failure");
                return Err(ToolError::ExecutionFailed {
                    tool: tool.to_string(),
                    exit_code: status.code(),
                    stderr: diagnostic_tail(&stderr),
                });
            }

            tracing::debug!(tool, duration_ms, stdout_bytes = stdout.len(), "Tool finished");
            Ok(ToolOutput {
                stdout,
                stderr,
                duration_ms,
            })
        }
        Ok(Err(e)) => Err(ToolError::Io(e)),
        Err(_elapsed) => {
            if let Err(e) = child.kill().await {
                tracing::warn!(tool, error = %e, "Failed to kill timed-out tool");
            }
            stdout_task.abort();
            stderr_task.abort();
            let elapsed_ms = start.elapsed().as_millis() as u64;
            tracing::warn!(tool, elapsed_ms, "Tool timed out and was killed");
            Err(ToolError::Timeout {
                tool: tool.to_string(),
                elapsed_ms,
            })
        }
    }
}

/// Read an entire output stream into a byte buffer, capped at `limit`.
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>, limit: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h).take(limit as u64).read_to_end(&mut buf).await;
    }
    buf
}

/// The last [`DIAGNOSTIC_CHARS`] characters of `stderr`, trimmed.
fn diagnostic_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    let count = trimmed.chars().count();
    if count <= DIAGNOSTIC_CHARS {
        return trimmed.to_string();
    }
    trimmed.chars().skip(count - DIAGNOSTIC_CHARS).collect()
}
