//! Child-process invocation with captured output and an optional timeout.
//!
//! Generators are spawned argv-style; nothing is ever routed through a
//! shell, so operand names with metacharacters need no quoting.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::KernelGenError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs `program` with `args`, feeding `stdin_payload` if given, and
/// returns the captured stdout. Fails on spawn errors, non-zero exit or a
/// blown timeout (the child is killed).
pub fn run_captured(
    program: &Path,
    args: &[String],
    stdin_payload: Option<&str>,
    timeout: Option<Duration>,
) -> Result<Vec<u8>, KernelGenError> {
    debug!(program = %program.display(), ?args, "spawning kernel generator");

    let mut child = Command::new(program)
        .args(args)
        .stdin(if stdin_payload.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(KernelGenError::Spawn)?;

    // Drain the pipes off-thread so a chatty child never blocks on a full
    // pipe while this thread feeds it or waits for it to exit.
    let mut stdout_pipe = child.stdout.take().expect("stdout was piped");
    let stdout_reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout_pipe.read_to_end(&mut buf);
        buf
    });
    let mut stderr_pipe = child.stderr.take().expect("stderr was piped");
    let stderr_reader = std::thread::spawn(move || {
        let mut buf = String::new();
        let _ = stderr_pipe.read_to_string(&mut buf);
        buf
    });

    if let Some(payload) = stdin_payload {
        let mut stdin = child.stdin.take().expect("stdin was piped");
        stdin
            .write_all(payload.as_bytes())
            .map_err(KernelGenError::Spawn)?;
        // Dropping the handle closes the pipe so the child sees EOF.
    }

    let started = Instant::now();
    let status = loop {
        match child.try_wait().map_err(KernelGenError::Spawn)? {
            Some(status) => break status,
            None => {
                if let Some(limit) = timeout {
                    if started.elapsed() > limit {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(KernelGenError::Timeout(limit));
                    }
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();

    if !status.success() {
        return Err(KernelGenError::NonZeroExit {
            status: status.to_string(),
            stderr,
        });
    }
    Ok(stdout)
}
