// src/process/handle.rs

//! [`ProcessHandle`]: one external executable driven over its stdin/stdout.

use std::ffi::{OsStr, OsString};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Once};

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::{ProcessError, ProcessResult};
use crate::process::channel::{Channels, ControllerEnds};
use crate::process::mirror::LineMirror;
use crate::process::reader::{
    LineBuffer, LineMatcher, ReadOutcome, ReadTimeout, ReaderOptions, read_lines,
};
use crate::process::reap::{ExitStatus, Liveness, kill_and_reap, try_reap};
use crate::process::spawn::spawn_child;

/// Lifecycle of the child behind a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// No child has been spawned yet.
    Unstarted,
    /// A child was spawned and has not been observed dead.
    Running,
    /// The last child was observed dead (and reaped).
    Exited,
}

/// Drives a single child process over a command channel (its stdin) and an
/// output channel (its stdout).
///
/// The handle owns both channels and is the only party that reaps its child.
/// Liveness is observed lazily: `state()` can still say `Running` for a
/// child that died since the last [`is_alive`](Self::is_alive),
/// [`send_command`](Self::send_command) or [`kill`](Self::kill).
///
/// Dropping the handle kills and reaps the child.
#[derive(Debug)]
pub struct ProcessHandle {
    command: PathBuf,
    options: ReaderOptions,
    /// Channels allocated ahead of the next spawn.
    fresh: Option<Channels>,
    /// Ends kept from the most recent spawn.
    controller: Option<ControllerEnds>,
    pid: Option<Pid>,
    /// The unreaped child, shared with [`KillSwitch`]es. Every reap happens
    /// with this locked and clears it, so a switch never signals a pid that
    /// could already belong to another process.
    live: Arc<Mutex<Option<Pid>>>,
    state: ProcessState,
    exit_status: Option<ExitStatus>,
    buffer: LineBuffer,
    mirror: LineMirror,
}

impl ProcessHandle {
    /// Create a handle for `command` and allocate its channels.
    pub fn new(command: impl Into<PathBuf>) -> ProcessResult<Self> {
        Self::with_options(command, ReaderOptions::default())
    }

    pub fn with_options(command: impl Into<PathBuf>, options: ReaderOptions) -> ProcessResult<Self> {
        let command = command.into();
        let channels = Channels::allocate()?;
        debug!(command = %command.display(), "allocated process channels");

        Ok(Self {
            command,
            options,
            fresh: Some(channels),
            controller: None,
            pid: None,
            live: Arc::new(Mutex::new(None)),
            state: ProcessState::Unstarted,
            exit_status: None,
            buffer: LineBuffer::new(),
            mirror: LineMirror::new(),
        })
    }

    pub fn command(&self) -> &Path {
        &self.command
    }

    /// Pid of the tracked child, if one is running as of the last observation.
    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// How the last child ended, once that has been observed.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    pub fn options(&self) -> ReaderOptions {
        self.options
    }

    /// A handle on the current (and any later) child that can SIGKILL it
    /// from another thread, e.g. to end a read that waits forever.
    pub fn kill_switch(&self) -> KillSwitch {
        KillSwitch {
            live: Arc::clone(&self.live),
        }
    }

    /// Receive a copy of every output line this handle reads from now on.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<String> {
        self.mirror.subscribe()
    }

    /// Spawn the child. `argv[0]` must be the handle's command.
    ///
    /// Works from `Unstarted` and from `Exited` (restart). Refuses to start
    /// while the previous child is still alive, so a live child is never
    /// detached from the handle.
    pub fn start<S: AsRef<OsStr>>(&mut self, argv: &[S]) -> ProcessResult<Pid> {
        match argv.first() {
            None => {
                return Err(ProcessError::InvalidArgument(
                    "argv must contain at least the command".to_string(),
                ));
            }
            Some(first) if first.as_ref() != self.command.as_os_str() => {
                return Err(ProcessError::InvalidArgument(format!(
                    "argv[0] {:?} does not match command {:?}",
                    first.as_ref(),
                    self.command
                )));
            }
            Some(_) => {}
        }

        if self.is_alive()? {
            let pid = self.pid.map(Pid::as_raw).unwrap_or_default();
            return Err(ProcessError::AlreadyRunning { pid });
        }

        // A previous spawn consumed the child-side ends; restarts get new pipes.
        let channels = match self.fresh.take() {
            Some(channels) => channels,
            None => Channels::allocate()?,
        };
        let (controller, child) = channels.split();
        let pid = spawn_child(&self.command, argv, child)?;
        *lock(&self.live) = Some(pid);

        self.controller = Some(controller);
        self.buffer.clear();
        self.pid = Some(pid);
        self.state = ProcessState::Running;
        self.exit_status = None;
        Ok(pid)
    }

    /// [`start`](Self::start) with `argv = [command, args...]`.
    pub fn start_with_args<S: AsRef<OsStr>>(&mut self, args: &[S]) -> ProcessResult<Pid> {
        let mut argv: Vec<OsString> = Vec::with_capacity(args.len() + 1);
        argv.push(self.command.clone().into_os_string());
        argv.extend(args.iter().map(|a| a.as_ref().to_os_string()));
        self.start(&argv)
    }

    /// Whether the child is still running. Reaps it if it has terminated.
    pub fn is_alive(&mut self) -> ProcessResult<bool> {
        let Some(pid) = self.pid else {
            return Ok(false);
        };
        let mut live = lock(&self.live);
        match try_reap(pid)? {
            Liveness::Alive => Ok(true),
            Liveness::Exited(exit) => {
                *live = None;
                drop(live);
                self.mark_exited(pid, exit);
                Ok(false)
            }
        }
    }

    /// Write one command line to the child. A trailing `\n` is added if
    /// missing.
    ///
    /// Fails with [`ProcessError::NotRunning`] (and writes nothing) when no
    /// child is alive. A failed or short write is [`ProcessError::Write`].
    pub fn send_command(&mut self, line: &str) -> ProcessResult<()> {
        if !self.is_alive()? {
            return Err(ProcessError::NotRunning);
        }
        let controller = self.controller.as_mut().ok_or(ProcessError::NotRunning)?;
        ignore_sigpipe();

        let mut payload = String::with_capacity(line.len() + 1);
        payload.push_str(line);
        if !payload.ends_with('\n') {
            payload.push('\n');
        }
        let bytes = payload.as_bytes();

        loop {
            match controller.commands.write(bytes) {
                Ok(n) if n == bytes.len() => break,
                Ok(n) => {
                    return Err(ProcessError::Write(io::Error::new(
                        io::ErrorKind::WriteZero,
                        format!("short write: {n} of {} bytes", bytes.len()),
                    )));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ProcessError::Write(e)),
            }
        }

        debug!(pid = ?self.pid, command = %line.trim_end(), "sent command");
        Ok(())
    }

    /// Collect output lines until `timeout` elapses or the child closes its
    /// stdout.
    pub fn read(&mut self, timeout: ReadTimeout) -> ProcessResult<ReadOutcome> {
        self.read_inner(timeout, None)
    }

    /// Like [`read`](Self::read), but stops as soon as a completed line
    /// matches `matcher`. Check [`ReadOutcome::found`].
    pub fn read_until(
        &mut self,
        timeout: ReadTimeout,
        matcher: &LineMatcher,
    ) -> ProcessResult<ReadOutcome> {
        self.read_inner(timeout, Some(matcher))
    }

    fn read_inner(
        &mut self,
        timeout: ReadTimeout,
        matcher: Option<&LineMatcher>,
    ) -> ProcessResult<ReadOutcome> {
        let controller = self.controller.as_mut().ok_or(ProcessError::NotRunning)?;
        let outcome = read_lines(
            &mut controller.output,
            &mut self.buffer,
            timeout,
            matcher,
            self.options,
        )?;
        self.mirror.publish_all(&outcome.lines);
        Ok(outcome)
    }

    /// Kill and reap the child. Safe to call at any time, any number of
    /// times; failures are logged, never returned.
    pub fn kill(&mut self) {
        if let Some(pid) = self.pid.take() {
            let mut live = lock(&self.live);
            match kill_and_reap(pid) {
                Ok(exit) => self.exit_status = Some(exit),
                Err(e) => warn!(%pid, error = %e, "failed to kill process"),
            }
            *live = None;
            drop(live);
            self.state = ProcessState::Exited;
        }
        self.mirror.close();
    }

    fn mark_exited(&mut self, pid: Pid, exit: ExitStatus) {
        info!(%pid, %exit, "process exited");
        self.pid = None;
        self.state = ProcessState::Exited;
        self.exit_status = Some(exit);
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Kills a [`ProcessHandle`]'s child from outside the thread driving it.
///
/// Only signals; the handle still reaps the child and records its exit
/// status the next time it looks. Once the child has been reaped this is a
/// no-op until the handle starts a new one.
#[derive(Debug, Clone)]
pub struct KillSwitch {
    live: Arc<Mutex<Option<Pid>>>,
}

impl KillSwitch {
    /// SIGKILL the running child. Returns whether a signal was sent.
    pub fn kill(&self) -> bool {
        let live = lock(&self.live);
        let Some(pid) = *live else {
            return false;
        };
        match kill(pid, Signal::SIGKILL) {
            Ok(()) => {
                info!(%pid, "kill switch fired");
                true
            }
            // already dead, waiting to be reaped
            Err(Errno::ESRCH) => false,
            Err(e) => {
                warn!(%pid, error = %e, "kill switch could not signal process");
                false
            }
        }
    }
}

fn lock(live: &Mutex<Option<Pid>>) -> MutexGuard<'_, Option<Pid>> {
    live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Writing to a child that went away must surface as `EPIPE`, not kill us.
fn ignore_sigpipe() {
    static IGNORE: Once = Once::new();
    IGNORE.call_once(|| {
        use nix::sys::signal::{SigHandler, Signal, signal};
        // SAFETY: installs SIG_IGN, no handler code runs.
        if let Err(e) = unsafe { signal(Signal::SIGPIPE, SigHandler::SigIgn) } {
            warn!(error = %e, "could not ignore SIGPIPE");
        }
    });
}
