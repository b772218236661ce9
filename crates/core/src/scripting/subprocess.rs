//! Streaming subprocess execution.
//!
//! Provides [`run_streaming`], which spawns a [`LaunchPlan`], forwards every
//! complete stdout/stderr line to a channel as soon as it is read, and
//! enforces the timeout and cancellation token.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::executor::{OutputLine, OutputStream, RunExit, ScriptError};
use super::launcher::LaunchPlan;
use crate::progress::LineAssembler;

/// Bytes requested per read from a child pipe.
const READ_CHUNK_BYTES: usize = 8 * 1024;

/// How long to wait for the pipes to drain after the child exits.
///
/// Grandchildren that inherited the pipes can keep them open past the
/// child's exit; after this the readers are abandoned.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound for a plan's stop command (e.g. `docker kill`).
const STOP_TIMEOUT: Duration = Duration::from_secs(10);

enum Outcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Spawn `plan`, stream its output into `sink`, and wait for it to exit.
///
/// Lines are sent in the order they are read from each pipe. The send side
/// ignores a closed receiver so a vanished consumer never stalls the child.
/// On timeout or cancellation the child is killed, and the plan's stop
/// command run, before returning.
pub async fn run_streaming(
    plan: &LaunchPlan,
    timeout: Duration,
    sink: mpsc::UnboundedSender<OutputLine>,
    cancel: CancellationToken,
) -> Result<RunExit, ScriptError> {
    let mut cmd = plan.command();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let start = Instant::now();

    let mut child = cmd.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ScriptError::NotFound(plan.program.clone()),
        _ => ScriptError::IoError(e),
    })?;

    tracing::debug!(pid = ?child.id(), command = %plan.display(), "Spawned script process");

    let stdout_task = spawn_pump(child.stdout.take(), OutputStream::Stdout, sink.clone());
    let stderr_task = spawn_pump(child.stderr.take(), OutputStream::Stderr, sink);

    let outcome = tokio::select! {
        status = child.wait() => Outcome::Exited(status),
        _ = tokio::time::sleep(timeout) => Outcome::TimedOut,
        _ = cancel.cancelled() => Outcome::Cancelled,
    };

    match outcome {
        Outcome::Exited(Ok(status)) => {
            drain(stdout_task).await;
            drain(stderr_task).await;
            Ok(RunExit {
                exit_code: status.code(),
                duration_ms: start.elapsed().as_millis() as u64,
            })
        }
        Outcome::Exited(Err(e)) => {
            stdout_task.abort();
            stderr_task.abort();
            Err(ScriptError::IoError(e))
        }
        Outcome::TimedOut => {
            kill(plan, &mut child, stdout_task, stderr_task).await;
            Err(ScriptError::Timeout {
                elapsed_ms: start.elapsed().as_millis() as u64,
            })
        }
        Outcome::Cancelled => {
            kill(plan, &mut child, stdout_task, stderr_task).await;
            Err(ScriptError::Cancelled {
                elapsed_ms: start.elapsed().as_millis() as u64,
            })
        }
    }
}

async fn kill(
    plan: &LaunchPlan,
    child: &mut Child,
    stdout_task: JoinHandle<()>,
    stderr_task: JoinHandle<()>,
) {
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "Failed to kill script process");
    }
    stdout_task.abort();
    stderr_task.abort();

    let Some(mut stop) = plan.stop_command() else {
        return;
    };
    stop.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    match tokio::time::timeout(STOP_TIMEOUT, stop.status()).await {
        Ok(Ok(status)) if status.success() => {
            tracing::debug!(command = %plan.program, "Stopped script resources");
        }
        Ok(Ok(status)) => {
            tracing::warn!(code = ?status.code(), "Stop command for script failed");
        }
        Ok(Err(e)) => tracing::warn!(error = %e, "Failed to run stop command for script"),
        Err(_) => tracing::warn!("Stop command for script timed out"),
    }
}

fn spawn_pump<R>(
    handle: Option<R>,
    stream: OutputStream,
    sink: mpsc::UnboundedSender<OutputLine>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Some(reader) = handle {
            pump_lines(reader, stream, &sink).await;
        }
    })
}

/// Read `reader` to EOF, emitting each complete line.
async fn pump_lines<R: AsyncRead + Unpin>(
    mut reader: R,
    stream: OutputStream,
    sink: &mpsc::UnboundedSender<OutputLine>,
) {
    let mut assembler = LineAssembler::new();
    let mut buf = vec![0u8; READ_CHUNK_BYTES];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for text in assembler.push(&buf[..n]) {
                    let _ = sink.send(OutputLine { stream, text });
                }
            }
            Err(e) => {
                tracing::warn!(?stream, error = %e, "Error reading script output");
                break;
            }
        }
    }

    if let Some(text) = assembler.finish() {
        let _ = sink.send(OutputLine { stream, text });
    }
}

async fn drain(task: JoinHandle<()>) {
    let abort = task.abort_handle();
    if tokio::time::timeout(DRAIN_TIMEOUT, task).await.is_err() {
        tracing::warn!("Script output still open after exit, abandoning reader");
        abort.abort();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
