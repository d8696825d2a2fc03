// src/environment/command.rs

//! Subprocess execution with captured output and a deadline
//!
//! Both pipes are drained on helper threads while the parent waits, so a
//! chatty `pip` cannot fill a pipe buffer and stall before the timeout
//! fires.

use crate::error::{CommandError, Error, Result};
use std::ffi::OsStr;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace};
use wait_timeout::ChildExt;

/// Default deadline for a single command (10 minutes)
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

/// Output of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    })
}

fn collect(handle: JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

fn render<S: AsRef<OsStr>>(program: &OsStr, args: &[S]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(|a| a.as_ref()))
        .map(|part| part.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn spawn(command: &mut Command, rendered: &str) -> Result<Child> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                Error::EnvironmentError(format!("Failed to spawn '{}': {}", rendered, e))
            }
            _ => Error::IoError(format!("Failed to spawn '{}': {}", rendered, e)),
        })
}

/// Run `program` with `args`, failing on a non-zero exit or timeout
///
/// A program that cannot be started at all is an environment error; every
/// other failure carries the captured output as a [`CommandError`].
pub fn run_command<P, S>(program: P, args: &[S], timeout: Duration) -> Result<CommandOutput>
where
    P: AsRef<OsStr>,
    S: AsRef<OsStr>,
{
    let program = program.as_ref();
    let rendered = render(program, args);
    debug!("Running {}", rendered);

    let mut command = Command::new(program);
    command.args(args);
    let mut child = spawn(&mut command, &rendered)?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match child.wait_timeout(timeout)? {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CommandError {
                command: rendered,
                stdout: collect(stdout),
                stderr: collect(stderr),
                return_code: None,
                timeout: true,
            }
            .into());
        }
    };

    let output = CommandOutput {
        stdout: collect(stdout),
        stderr: collect(stderr),
    };
    for line in output.stderr.lines() {
        trace!("[stderr] {}", line);
    }

    if status.success() {
        Ok(output)
    } else {
        Err(CommandError {
            command: rendered,
            stdout: output.stdout,
            stderr: output.stderr,
            return_code: status.code(),
            timeout: false,
        }
        .into())
    }
}
