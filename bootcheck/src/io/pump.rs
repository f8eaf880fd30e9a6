//! Deadline-bounded console session.
//!
//! A single-threaded loop waits (bounded by the poll interval and the time
//! left) for the merged output pipe to become readable, appends each chunk to
//! the transcript, and starts writing the scripted input once the readiness
//! marker appears. The script goes out through a non-blocking pipe as the
//! child drains it, so a console that echoes a long script never stalls the
//! loop. Exceeding the deadline kills the child's process group; whatever was
//! captured is still returned for verification.

use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::os::fd::AsFd;
use std::process::{Child, ChildStdin, ExitStatus};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tracing::{debug, info, instrument, trace, warn};

use crate::core::session_state::{Injection, SessionState};
use crate::core::transcript::Transcript;
use crate::core::watcher::PromptWatcher;
use crate::io::config::SessionConfig;
use crate::io::launcher::{LaunchedChild, launch};

const READ_CHUNK_BYTES: usize = 4096;
/// Cap on the post-loop drain, in case a stray grandchild keeps writing.
const MAX_DRAIN_BYTES: usize = 4 * 1024 * 1024;

/// Everything a finished session hands to verification and reporting.
#[derive(Debug)]
pub struct SessionOutcome {
    pub transcript: Transcript,
    pub timed_out: bool,
    /// The child exited on its own before the deadline.
    pub process_exited: bool,
    pub prompt_seen: bool,
    pub script_sent: bool,
    pub injection: Option<Injection>,
    /// `None` only if the child could not be reaped.
    pub exit_status: Option<ExitStatus>,
    pub elapsed: Duration,
}

/// Launch the configured child and drive it until exit or deadline.
///
/// Fails only on launch or unexpected I/O errors; a timeout is reported
/// through [`SessionOutcome::timed_out`].
#[instrument(
    skip_all,
    fields(program = %config.program.display(), timeout_secs = config.timeout.as_secs())
)]
pub fn run_session(config: &SessionConfig) -> Result<SessionOutcome> {
    let mut state = SessionState::start(Instant::now(), config.timeout);
    let launched = launch(config)?;
    state.launched();

    let mut session = Session::new(config, launched, state);
    session.pump()?;
    session.finish()
}

enum ReadOutcome {
    Data(usize),
    Closed,
    Pending,
}

#[derive(Debug, Clone, Copy, Default)]
struct Ready {
    readable: bool,
    writable: bool,
}

/// Script bytes not yet accepted by the child's stdin.
struct PendingScript {
    after_chunk: usize,
    offset: usize,
}

struct Session<'a> {
    config: &'a SessionConfig,
    child: Child,
    stdin: Option<ChildStdin>,
    output: File,
    transcript: Transcript,
    watcher: PromptWatcher,
    state: SessionState,
    pending: Option<PendingScript>,
    exit_status: Option<ExitStatus>,
}

impl<'a> Session<'a> {
    fn new(config: &'a SessionConfig, launched: LaunchedChild, state: SessionState) -> Self {
        Self {
            config,
            child: launched.child,
            stdin: Some(launched.stdin),
            output: launched.output,
            transcript: Transcript::new(),
            watcher: PromptWatcher::new(config.readiness.clone(), config.window_chunks),
            state,
            pending: None,
            exit_status: None,
        }
    }

    fn pump(&mut self) -> Result<()> {
        let mut buf = [0u8; READ_CHUNK_BYTES];
        loop {
            let now = Instant::now();
            if self.state.deadline_passed(now) {
                warn!(
                    timeout_secs = self.config.timeout.as_secs(),
                    chunks = self.transcript.chunk_count(),
                    "session deadline reached, killing child"
                );
                self.state.mark_timed_out();
                self.kill()?;
                break;
            }

            let wait = self.config.poll_interval.min(self.state.remaining(now));
            let ready = self.wait_ready(wait)?;
            if ready.writable {
                self.write_pending();
            }
            if ready.readable {
                match self.read_chunk(&mut buf)? {
                    ReadOutcome::Data(n) => self.on_chunk(buf[..n].to_vec()),
                    ReadOutcome::Closed => {
                        debug!("console output closed");
                        break;
                    }
                    ReadOutcome::Pending => {}
                }
            }

            if let Some(status) = self.child.try_wait().context("poll child status")? {
                debug!(exit_code = ?status.code(), "child exited");
                self.exit_status = Some(status);
                self.state.mark_process_exited();
                break;
            }
        }
        Ok(())
    }

    /// Wait for console output, and for stdin space while script bytes remain.
    fn wait_ready(&self, wait: Duration) -> Result<Ready> {
        let millis = u16::try_from(wait.as_millis()).unwrap_or(u16::MAX);
        let mut fds = vec![PollFd::new(self.output.as_fd(), PollFlags::POLLIN)];
        if let (Some(_), Some(stdin)) = (&self.pending, &self.stdin) {
            fds.push(PollFd::new(stdin.as_fd(), PollFlags::POLLOUT));
        }
        let fired = |fd: &PollFd<'_>, wanted: PollFlags| {
            fd.revents().is_some_and(|revents| {
                revents.intersects(wanted | PollFlags::POLLHUP | PollFlags::POLLERR)
            })
        };
        match poll(&mut fds, PollTimeout::from(millis)) {
            Ok(0) | Err(Errno::EINTR) => Ok(Ready::default()),
            Ok(_) => Ok(Ready {
                readable: fired(&fds[0], PollFlags::POLLIN),
                writable: fds.get(1).is_some_and(|fd| fired(fd, PollFlags::POLLOUT)),
            }),
            Err(err) => Err(err).context("poll console pipes"),
        }
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        match self.output.read(buf) {
            Ok(0) => Ok(ReadOutcome::Closed),
            Ok(n) => Ok(ReadOutcome::Data(n)),
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                Ok(ReadOutcome::Pending)
            }
            Err(err) => Err(err).context("read console output"),
        }
    }

    fn on_chunk(&mut self, bytes: Vec<u8>) {
        let len = bytes.len();
        let Some(seq) = self.transcript.append(bytes) else {
            return;
        };
        trace!(seq, len, "chunk received");

        if self.watcher.observe(&self.transcript) && self.state.begin_injection() {
            info!(after_chunk = seq, bytes = self.config.script.len(), "readiness marker seen");
            self.pending = Some(PendingScript {
                after_chunk: seq,
                offset: 0,
            });
            self.write_pending();
        }
    }

    /// Write as much of the remaining script as the pipe accepts right now.
    fn write_pending(&mut self) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        let script = self.config.script.as_bytes();
        let after_chunk = pending.after_chunk;
        let result = loop {
            if pending.offset >= script.len() {
                break Ok(true);
            }
            let Some(stdin) = self.stdin.as_mut() else {
                break Err(std::io::Error::new(
                    ErrorKind::BrokenPipe,
                    "stdin already closed",
                ));
            };
            match stdin.write(&script[pending.offset..]) {
                Ok(0) => break Err(ErrorKind::WriteZero.into()),
                Ok(n) => pending.offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) if err.kind() == ErrorKind::WouldBlock => break Ok(false),
                Err(err) => break Err(err),
            }
        };
        match result {
            Ok(false) => trace!(written = pending.offset, "stdin full, script write paused"),
            Ok(true) => {
                info!(after_chunk, bytes = script.len(), "script sent");
                self.pending = None;
                self.state.record_injection(Injection::Sent { after_chunk });
            }
            Err(err) => {
                warn!(after_chunk, err = %err, "script write failed");
                self.pending = None;
                self.state.record_injection(Injection::Failed {
                    after_chunk,
                    reason: err.to_string(),
                });
            }
        }
    }

    /// SIGKILL the child's whole process group, then reap the leader.
    fn kill(&mut self) -> Result<()> {
        if self.exit_status.is_some() {
            return Ok(());
        }
        let leader = i32::try_from(self.child.id()).context("child pid out of range")?;
        match killpg(Pid::from_raw(leader), Signal::SIGKILL) {
            Ok(()) => {}
            Err(err) => {
                debug!(err = %err, "killpg failed, killing leader only");
                self.child.kill().context("kill child")?;
            }
        }
        let status = self.child.wait().context("wait child after kill")?;
        debug!(exit_code = ?status.code(), "child killed");
        self.exit_status = Some(status);
        Ok(())
    }

    /// Stop the child if needed, drain leftover output, release stdin.
    fn finish(&mut self) -> Result<SessionOutcome> {
        self.state.begin_drain();
        if self.exit_status.is_none() {
            match self.child.try_wait().context("poll child status")? {
                Some(status) => {
                    self.exit_status = Some(status);
                    self.state.mark_process_exited();
                }
                None => self.kill()?,
            }
        }

        self.drain()?;

        if let Some(pending) = self.pending.take() {
            let unsent = self.config.script.len() - pending.offset;
            warn!(unsent, "session ended before the whole script was written");
            self.state.record_injection(Injection::Failed {
                after_chunk: pending.after_chunk,
                reason: format!("session ended with {unsent} script bytes unsent"),
            });
        }
        if !self.state.script_sent() && self.stdin.take().is_some() {
            debug!("script not fully sent, closed child stdin");
        }
        self.state.finalize();

        let outcome = SessionOutcome {
            transcript: std::mem::take(&mut self.transcript),
            timed_out: self.state.timed_out(),
            process_exited: self.state.process_exited(),
            prompt_seen: self.state.prompt_seen(),
            script_sent: self.state.script_sent(),
            injection: self.state.injection().cloned(),
            exit_status: self.exit_status,
            elapsed: self.state.started_at().elapsed(),
        };
        info!(
            chunks = outcome.transcript.chunk_count(),
            bytes = outcome.transcript.total_bytes(),
            timed_out = outcome.timed_out,
            script_sent = outcome.script_sent,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "session finished"
        );
        Ok(outcome)
    }

    /// One non-blocking pass over whatever is still buffered in the pipe.
    fn drain(&mut self) -> Result<()> {
        let mut tail = Vec::new();
        let mut buf = [0u8; READ_CHUNK_BYTES];
        while tail.len() < MAX_DRAIN_BYTES {
            match self.read_chunk(&mut buf)? {
                ReadOutcome::Data(n) => tail.extend_from_slice(&buf[..n]),
                ReadOutcome::Closed | ReadOutcome::Pending => break,
            }
        }
        if !tail.is_empty() {
            debug!(bytes = tail.len(), "drained trailing output");
            self.transcript.append(tail);
        }
        Ok(())
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if self.exit_status.is_none()
            && let Ok(None) = self.child.try_wait()
        {
            if let Ok(leader) = i32::try_from(self.child.id()) {
                let _ = killpg(Pid::from_raw(leader), Signal::SIGKILL);
            }
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
