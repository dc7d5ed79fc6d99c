//! Single-stage process execution.
//!
//! Spawns one external command, feeds it the stage input and collects stdout and
//! stderr into one combined buffer in arrival order. Bytes pass through untouched.

use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const READ_CHUNK: usize = 8 * 1024;

/// Why a stage did not complete successfully. The `Display` text is what ends up
/// in the pipeline output after the captured bytes.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error while running `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Exit(ExitStatus),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Exit status 0; carries the combined output.
    Completed(Vec<u8>),
    /// Captured output, a newline, then the error description.
    Failed(Vec<u8>),
    /// The run was cancelled and the child killed.
    Cancelled,
}

fn failed(mut captured: Vec<u8>, err: StageError) -> StageOutcome {
    captured.push(b'\n');
    captured.extend_from_slice(err.to_string().as_bytes());
    StageOutcome::Failed(captured)
}

/// Run `command args…` with `input` on stdin.
///
/// Cancellation force-kills the child and reaps it before returning.
pub async fn execute_stage(
    command: &str,
    args: &[String],
    input: &[u8],
    cancel: &CancellationToken,
) -> StageOutcome {
    if cancel.is_cancelled() {
        return StageOutcome::Cancelled;
    }

    let mut child = match Command::new(command)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(source) => {
            debug!(command, error = %source, "stage failed to spawn");
            return failed(
                Vec::new(),
                StageError::Spawn {
                    command: command.to_string(),
                    source,
                },
            );
        }
    };
    debug!(command, ?args, pid = child.id(), "stage spawned");

    // The child future is dropped when cancellation wins, which releases the borrow below.
    let finished = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        res = drive_child(&mut child, input) => Some(res),
    };

    let Some((captured, result)) = finished else {
        let _ = child.start_kill();
        let _ = child.wait().await;
        debug!(command, "stage killed by cancellation");
        return StageOutcome::Cancelled;
    };

    match result {
        Ok(status) if status.success() => StageOutcome::Completed(captured),
        Ok(status) => {
            debug!(command, %status, "stage exited unsuccessfully");
            failed(captured, StageError::Exit(status))
        }
        Err(source) => failed(
            captured,
            StageError::Io {
                command: command.to_string(),
                source,
            },
        ),
    }
}

/// Feed stdin, drain both output pipes and wait for exit. Output captured before
/// an I/O error is returned alongside it.
async fn drive_child(
    child: &mut Child,
    input: &[u8],
) -> (Vec<u8>, std::io::Result<ExitStatus>) {
    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // Writing and reading concurrently keeps a child that fills its stdout pipe
    // before consuming all of stdin from deadlocking against us.
    let (written, (captured, read)) = tokio::join!(
        write_input(stdin, input),
        read_combined(stdout, stderr)
    );

    let status = child.wait().await;
    let result = match (status, read, written) {
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => Err(e),
        (Ok(status), Ok(()), Ok(())) => Ok(status),
    };
    (captured, result)
}

async fn write_input(stdin: Option<ChildStdin>, input: &[u8]) -> std::io::Result<()> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };
    match stdin.write_all(input).await {
        // The child closed its stdin early (e.g. `head`); not an error.
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
    // stdin dropped here so the child sees EOF
}

async fn read_combined<O, E>(
    mut stdout: Option<O>,
    mut stderr: Option<E>,
) -> (Vec<u8>, std::io::Result<()>)
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut combined = Vec::new();
    let mut out_buf = [0u8; READ_CHUNK];
    let mut err_buf = [0u8; READ_CHUNK];

    while stdout.is_some() || stderr.is_some() {
        tokio::select! {
            res = read_chunk(&mut stdout, &mut out_buf) => match res {
                Ok(0) => stdout = None,
                Ok(n) => combined.extend_from_slice(&out_buf[..n]),
                Err(e) => return (combined, Err(e)),
            },
            res = read_chunk(&mut stderr, &mut err_buf) => match res {
                Ok(0) => stderr = None,
                Ok(n) => combined.extend_from_slice(&err_buf[..n]),
                Err(e) => return (combined, Err(e)),
            },
        }
    }

    (combined, Ok(()))
}

/// Read from the pipe if it is still open; a closed pipe never resolves.
async fn read_chunk<R: AsyncRead + Unpin>(
    reader: &mut Option<R>,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    match reader {
        Some(r) => r.read(buf).await,
        None => std::future::pending().await,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn captures_stdout_from_input() {
        let out = execute_stage("cat", &[], b"abc\n", &CancellationToken::new()).await;
        assert_eq!(out, StageOutcome::Completed(b"abc\n".to_vec()));
    }

    #[tokio::test]
    async fn stderr_is_part_of_combined_output() {
        let out = execute_stage("sh", &sh("echo oops >&2"), b"", &CancellationToken::new()).await;
        assert_eq!(out, StageOutcome::Completed(b"oops\n".to_vec()));
    }

    #[tokio::test]
    async fn non_zero_exit_keeps_partial_output() {
        let out = execute_stage(
            "sh",
            &sh("echo partial; exit 3"),
            b"",
            &CancellationToken::new(),
        )
        .await;
        let StageOutcome::Failed(raw) = out else {
            panic!("expected failure, got {out:?}");
        };
        let text = String::from_utf8(raw).unwrap();
        assert!(text.starts_with("partial\n\n"), "{text:?}");
        assert!(text.contains('3'), "{text:?}");
    }

    #[tokio::test]
    async fn missing_binary_reports_spawn_error() {
        let out = execute_stage(
            "ptrap-definitely-not-a-binary",
            &[],
            b"input",
            &CancellationToken::new(),
        )
        .await;
        let StageOutcome::Failed(raw) = out else {
            panic!("expected failure, got {out:?}");
        };
        let text = String::from_utf8(raw).unwrap();
        assert!(text.starts_with('\n'));
        assert!(text.contains("failed to start `ptrap-definitely-not-a-binary`"));
    }

    #[tokio::test]
    async fn non_utf8_bytes_pass_through() {
        let input: Vec<u8> = (0..=255u8).collect();
        let out = execute_stage("cat", &[], &input, &CancellationToken::new()).await;
        assert_eq!(out, StageOutcome::Completed(input));
    }

    #[tokio::test]
    async fn large_input_does_not_deadlock() {
        let input = "0123456789abcdef\n".repeat(64 * 1024).into_bytes();
        let out = tokio::time::timeout(
            Duration::from_secs(10),
            execute_stage("cat", &[], &input, &CancellationToken::new()),
        )
        .await
        .expect("stage should finish");
        assert_eq!(out, StageOutcome::Completed(input));
    }

    #[tokio::test]
    async fn child_that_ignores_stdin_is_not_an_error() {
        let input = vec![b'x'; 1024 * 1024];
        let out = execute_stage("true", &[], &input, &CancellationToken::new()).await;
        assert_eq!(out, StageOutcome::Completed(Vec::new()));
    }

    #[tokio::test]
    async fn cancellation_kills_the_child() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let script = format!("echo $$ > {}; exec sleep 30", pid_file.display());
        let cancel = CancellationToken::new();

        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move { execute_stage("sh", &sh(&script), b"", &cancel).await })
        };

        let mut pid = None;
        for _ in 0..200 {
            if let Ok(s) = std::fs::read_to_string(&pid_file) {
                if !s.trim().is_empty() {
                    pid = Some(s.trim().to_string());
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let pid = pid.expect("child wrote its pid");

        cancel.cancel();
        let out = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("cancelled stage returns promptly")
            .unwrap();
        assert_eq!(out, StageOutcome::Cancelled);

        let alive = std::process::Command::new("kill")
            .args(["-0", &pid])
            .stderr(Stdio::null())
            .status()
            .unwrap()
            .success();
        assert!(!alive, "process {pid} still running");
    }

    #[tokio::test]
    async fn already_cancelled_token_skips_spawn() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let out = execute_stage("ptrap-definitely-not-a-binary", &[], b"", &cancel).await;
        assert_eq!(out, StageOutcome::Cancelled);
    }
}
