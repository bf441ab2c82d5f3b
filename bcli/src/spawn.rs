// bcli/src/spawn.rs

//! Spawning `bitcoin-cli` and capturing its output.
//!
//! `std`/`tokio`'s process APIs can only pipe stdout and stderr
//! separately; the underlying node process wants them interleaved the
//! way a terminal would see them, so both are duped into the two ends
//! of a single OS pipe via `os_pipe` before the child is spawned.

use std::io::Read;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::error::BcliError;

/// The result of running a `bitcoin-cli` invocation to completion.
#[derive(Debug, Clone)]
pub struct ChildOutput {
    pub exit_code: i32,
    pub output: String,
}

fn command_line(binary: &Path, args: &[String]) -> String {
    let mut line = binary.display().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Read `reader` to EOF into a buffer that starts at `initial_capacity`
/// bytes and doubles whenever it fills up.
fn read_growable<R: Read>(mut reader: R, initial_capacity: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0u8; initial_capacity.max(1)];
    let mut filled = 0usize;
    loop {
        if filled == buf.len() {
            buf.resize(buf.len() * 2, 0);
        }
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}

#[cfg(unix)]
fn signal_of(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

/// Spawn `binary args...` with stdin closed and stdout/stderr merged
/// into a single stream, and run it to completion.
pub(crate) async fn run(
    binary: &Path,
    args: &[String],
    initial_capacity: usize,
) -> Result<ChildOutput, BcliError> {
    let command = command_line(binary, args);

    let (reader, writer) = os_pipe::pipe().map_err(|e| BcliError::Exec {
        command: command.clone(),
        reason: format!("failed to create output pipe: {e}"),
    })?;
    let writer_clone = writer.try_clone().map_err(|e| BcliError::Exec {
        command: command.clone(),
        reason: format!("failed to duplicate output pipe: {e}"),
    })?;

    let mut cmd = Command::new(binary);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(writer))
        .stderr(Stdio::from(writer_clone));

    let mut child = cmd.spawn().map_err(|e| BcliError::Exec {
        command: command.clone(),
        reason: e.to_string(),
    })?;

    // Our copies of the write end were moved into the child's stdio;
    // the reader only sees EOF once every writer is closed, which
    // happens when the child (and any of its own dup'd fds) exits.
    let read_task =
        tokio::task::spawn_blocking(move || read_growable(reader, initial_capacity));

    let status = child.wait().await.map_err(|e| BcliError::Exec {
        command: command.clone(),
        reason: e.to_string(),
    })?;

    bcli_metrics::record_child_reaped();

    let bytes = read_task.await.map_err(|e| BcliError::Exec {
        command: command.clone(),
        reason: format!("output reader task panicked: {e}"),
    })?.map_err(|e| BcliError::Exec {
        command: command.clone(),
        reason: format!("failed to read output: {e}"),
    })?;
    let output = String::from_utf8_lossy(&bytes).into_owned();

    if let Some(signal) = signal_of(&status) {
        return Err(BcliError::Signaled { command, signal });
    }

    Ok(ChildOutput {
        exit_code: status.code().unwrap_or(-1),
        output,
    })
}
