//! Bounded execution of external tools
//!
//! Every child is spawned with `kill_on_drop`, so abandoning the future (for
//! example when a run is cancelled) terminates the process as well.

use crate::error::{PressError, PressResult};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Lines of stderr kept in error messages
const STDERR_TAIL_LINES: usize = 20;

/// Captured result of a finished process
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Run `command` to completion, killing it if it exceeds `limit`.
///
/// Non-zero exit becomes `ToolFailed` with the tail of stderr; a missing
/// binary becomes `ToolSpawnFailed`.
pub async fn run_bounded(
    tool: &str,
    mut command: Command,
    limit: Duration,
) -> PressResult<ToolOutput> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(target: "mediapress", "[{}] spawning {:?}", tool, command.as_std());

    let mut child = command.spawn().map_err(|e| PressError::ToolSpawnFailed {
        tool: tool.to_string(),
        message: e.to_string(),
    })?;

    let stdout_task = tokio::spawn(read_all(child.stdout.take()));
    let stderr_task = tokio::spawn(read_all(child.stderr.take()));

    let status = match tokio::time::timeout(limit, child.wait()).await {
        Ok(status) => status?,
        Err(_) => {
            // Force termination and reap before reporting
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            return Err(PressError::Timeout {
                operation: tool.to_string(),
                limit,
            });
        }
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();
    let exit_code = status.code().unwrap_or(-1);

    if !status.success() {
        return Err(PressError::ToolFailed {
            tool: tool.to_string(),
            exit_code,
            stderr: error_tail(&stderr, STDERR_TAIL_LINES),
        });
    }

    Ok(ToolOutput {
        exit_code,
        stdout,
        stderr,
    })
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let mut buffer = Vec::new();
    if let Some(mut reader) = reader {
        let _ = reader.read_to_end(&mut buffer).await;
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Last `lines` non-empty lines of `output`
pub fn error_tail(output: &str, lines: usize) -> String {
    let kept: Vec<&str> = output
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    let skip = kept.len().saturating_sub(lines);
    kept[skip..].join("\n")
}
