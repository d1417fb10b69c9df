//! Child-process plumbing shared by the ffmpeg and ffprobe wrappers.
//!
//! Every child is spawned with `kill_on_drop(true)`: when a job is
//! cancelled or times out, dropping the pending future terminates the
//! process instead of leaving it running against a deleted directory.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};

use crate::ffmpeg::FfmpegError;

/// Maximum bytes of stderr kept for error reports.
const MAX_STDERR_BYTES: usize = 64 * 1024;

/// Maximum bytes of stdout captured (ffprobe JSON is small).
const MAX_STDOUT_BYTES: usize = 4 * 1024 * 1024;

fn spawn(cmd: &mut Command) -> Result<Child, FfmpegError> {
    cmd.kill_on_drop(true).spawn().map_err(|e| match e.kind() {
        ErrorKind::NotFound => FfmpegError::NotFound(e),
        _ => FfmpegError::IoError(e),
    })
}

fn failure(status: std::process::ExitStatus, stderr: &[u8]) -> FfmpegError {
    FfmpegError::ExecutionFailed {
        exit_code: status.code(),
        stderr: String::from_utf8_lossy(stderr).trim().to_string(),
    }
}

/// Run `cmd` to completion and return its stdout.
pub(crate) async fn run(cmd: &mut Command) -> Result<Vec<u8>, FfmpegError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = spawn(cmd)?;
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (stdout, stderr, status) = tokio::join!(
        read_stream(stdout, MAX_STDOUT_BYTES),
        read_stream(stderr, MAX_STDERR_BYTES),
        child.wait(),
    );
    let status = status?;

    if !status.success() {
        return Err(failure(status, &stderr));
    }
    Ok(stdout)
}

/// Run `cmd`, writing the contents of each file in `inputs` to its stdin
/// in order, then close stdin and wait for exit.
pub(crate) async fn run_with_file_stdin(
    cmd: &mut Command,
    inputs: &[PathBuf],
) -> Result<(), FfmpegError> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let mut child = spawn(cmd)?;
    let stderr = child.stderr.take();
    // Drain stderr concurrently so a chatty encoder cannot block on a full pipe.
    let stderr_task = tokio::spawn(read_stream(stderr, MAX_STDERR_BYTES));

    let mut write_error = None;
    if let Some(mut stdin) = child.stdin.take() {
        for path in inputs {
            let bytes = tokio::fs::read(path).await?;
            if let Err(e) = stdin.write_all(&bytes).await {
                // The encoder exited early; its exit status explains why.
                write_error = Some(e);
                break;
            }
        }
        drop(stdin);
    }

    let status = child.wait().await?;
    let stderr = stderr_task.await.unwrap_or_default();

    if !status.success() {
        return Err(failure(status, &stderr));
    }
    match write_error {
        Some(e) => Err(FfmpegError::IoError(e)),
        None => Ok(()),
    }
}

/// Read an entire stream into memory, capped at `limit` bytes.
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>, limit: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h).take(limit as u64).read_to_end(&mut buf).await;
    }
    buf
}
