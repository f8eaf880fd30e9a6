//! Child process startup.
//!
//! The child gets a piped stdin and a single pipe shared by stdout and
//! stderr, so the parent reads one merged, ordered stream. The parent's ends
//! of both pipes are non-blocking and close-on-exec.

use std::fs::File;
use std::os::fd::{AsFd, OwnedFd};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};

use nix::fcntl::{FcntlArg, FdFlag, OFlag, fcntl};
use nix::unistd::pipe;
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::io::config::SessionConfig;

/// The child could not be started. Fatal for the session.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("create output pipe: {0}")]
    Pipe(#[source] nix::errno::Errno),
    #[error("configure output pipe: {0}")]
    PipeFlags(#[source] nix::errno::Errno),
    #[error("duplicate output pipe: {0}")]
    PipeClone(#[source] std::io::Error),
    #[error("spawn {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("stdin of {} was not piped", program.display())]
    MissingStdin { program: PathBuf },
}

/// A running child with its pipe endpoints, owned by one session.
#[derive(Debug)]
pub struct LaunchedChild {
    pub child: Child,
    /// Non-blocking; writes may be partial.
    pub stdin: ChildStdin,
    /// Merged stdout/stderr, non-blocking.
    pub output: File,
}

#[instrument(skip_all, fields(program = %config.program.display()))]
pub fn launch(config: &SessionConfig) -> Result<LaunchedChild, LaunchError> {
    let (read_end, write_end) = pipe().map_err(LaunchError::Pipe)?;
    set_cloexec(&read_end)?;
    set_cloexec(&write_end)?;
    set_nonblocking(&read_end)?;

    let mut child = spawn(config, write_end).map_err(|source| {
        error!(err = %source, "failed to spawn child");
        source
    })?;
    debug!(pid = child.id(), "child spawned");

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| LaunchError::MissingStdin {
            program: config.program.clone(),
        })?;
    if let Err(err) = set_nonblocking(&stdin) {
        let _ = child.kill();
        let _ = child.wait();
        return Err(err);
    }

    Ok(LaunchedChild {
        child,
        stdin,
        output: File::from(read_end),
    })
}

/// Spawn with both output streams on `write_end`.
///
/// The `Command` (and with it the parent's copies of the write end) is
/// dropped on return, so end-of-stream is seen once the child exits.
fn spawn(config: &SessionConfig, write_end: OwnedFd) -> Result<Child, LaunchError> {
    let stderr_end = write_end.try_clone().map_err(LaunchError::PipeClone)?;

    let mut command = Command::new(&config.program);
    command
        .args(&config.args)
        .envs(&config.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::from(write_end))
        .stderr(Stdio::from(stderr_end))
        // Own process group: terminal job-control signals stay with the harness.
        .process_group(0);

    command.spawn().map_err(|source| LaunchError::Spawn {
        program: config.program.clone(),
        source,
    })
}

fn set_cloexec<Fd: AsFd>(fd: &Fd) -> Result<(), LaunchError> {
    fcntl(fd.as_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).map_err(LaunchError::PipeFlags)?;
    Ok(())
}

fn set_nonblocking<Fd: AsFd>(fd: &Fd) -> Result<(), LaunchError> {
    let flags = fcntl(fd.as_fd(), FcntlArg::F_GETFL).map_err(LaunchError::PipeFlags)?;
    let flags = OFlag::from_bits_truncate(flags);
    fcntl(fd.as_fd(), FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))
        .map_err(LaunchError::PipeFlags)?;
    Ok(())
}
