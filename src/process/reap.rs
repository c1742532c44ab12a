// src/process/reap.rs

//! Liveness tracking and forced termination of a single child.
//!
//! Both paths go through `waitpid` on the specific pid, never `wait(-1)`, so
//! reaping one handle's child can't steal another handle's exit status.

use std::fmt;

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use tracing::{debug, info};

use crate::errors::{ProcessError, ProcessResult};

/// How a reaped child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Exited normally with this code.
    Code(i32),
    /// Terminated by a signal.
    Signaled(Signal),
    /// There was no child to reap (`ECHILD`), so the status is lost.
    Unknown,
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Code(0))
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Code(code) => write!(f, "exit code {code}"),
            ExitStatus::Signaled(sig) => write!(f, "signal {sig}"),
            ExitStatus::Unknown => f.write_str("unknown status"),
        }
    }
}

/// Result of a non-blocking reap attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    Exited(ExitStatus),
}

/// Reap `pid` if it has terminated, without blocking.
///
/// `ECHILD` counts as terminated: either someone else reaped it or it was
/// never ours. EINTR is retried; every other failure is a
/// [`ProcessError::Reap`].
pub fn try_reap(pid: Pid) -> ProcessResult<Liveness> {
    loop {
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => return Ok(Liveness::Alive),
            Ok(status) => match exit_status(status) {
                Some(exit) => {
                    debug!(%pid, %exit, "reaped child");
                    return Ok(Liveness::Exited(exit));
                }
                // stopped / continued / ptrace events: still a live process
                None => return Ok(Liveness::Alive),
            },
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => {
                debug!(%pid, "no such child; treating as exited");
                return Ok(Liveness::Exited(ExitStatus::Unknown));
            }
            Err(source) => {
                return Err(ProcessError::Reap {
                    pid: pid.as_raw(),
                    source,
                });
            }
        }
    }
}

/// Block until `pid` has been reaped.
pub fn reap_blocking(pid: Pid) -> ProcessResult<ExitStatus> {
    loop {
        match waitpid(pid, None) {
            Ok(status) => match exit_status(status) {
                Some(exit) => return Ok(exit),
                None => continue,
            },
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => return Ok(ExitStatus::Unknown),
            Err(source) => {
                return Err(ProcessError::Reap {
                    pid: pid.as_raw(),
                    source,
                });
            }
        }
    }
}

/// Reap `pid` if it already died, otherwise SIGKILL it and wait for it.
///
/// Returns once the child is gone from the process table.
pub fn kill_and_reap(pid: Pid) -> ProcessResult<ExitStatus> {
    if let Liveness::Exited(exit) = try_reap(pid)? {
        return Ok(exit);
    }

    match kill(pid, Signal::SIGKILL) {
        // ESRCH: it died between the reap attempt and the signal; the
        // zombie still needs reaping below.
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(source) => {
            return Err(ProcessError::Reap {
                pid: pid.as_raw(),
                source,
            });
        }
    }

    let exit = reap_blocking(pid)?;
    info!(%pid, %exit, "killed process");
    Ok(exit)
}

fn exit_status(status: WaitStatus) -> Option<ExitStatus> {
    match status {
        WaitStatus::Exited(_, code) => Some(ExitStatus::Code(code)),
        WaitStatus::Signaled(_, sig, _) => Some(ExitStatus::Signaled(sig)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::process::channel::Channels;
    use crate::process::spawn::spawn_child;

    fn spawn_sh(script: &str) -> Pid {
        let (_controller, child) = Channels::allocate().unwrap().split();
        spawn_child(Path::new("/bin/sh"), &["/bin/sh", "-c", script], child).expect("spawn sh")
    }

    fn wait_until_exited(pid: Pid) -> ExitStatus {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Liveness::Exited(exit) = try_reap(pid).unwrap() {
                return exit;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("child {pid} did not exit in time");
    }

    #[test]
    fn running_child_is_alive() {
        let pid = spawn_sh("sleep 5");
        assert_eq!(try_reap(pid).unwrap(), Liveness::Alive);
        assert_eq!(
            kill_and_reap(pid).unwrap(),
            ExitStatus::Signaled(Signal::SIGKILL)
        );
    }

    #[test]
    fn exited_child_reports_its_code_once() {
        let pid = spawn_sh("exit 3");
        assert_eq!(wait_until_exited(pid), ExitStatus::Code(3));
        // The slot is reclaimed; a second query finds no child.
        assert_eq!(try_reap(pid).unwrap(), Liveness::Exited(ExitStatus::Unknown));
    }

    #[test]
    fn kill_and_reap_collects_a_zombie_without_signalling() {
        let pid = spawn_sh("exit 0");
        // Leave it unreaped long enough to become a zombie.
        std::thread::sleep(Duration::from_millis(500));
        assert_eq!(kill_and_reap(pid).unwrap(), ExitStatus::Code(0));
    }

    #[test]
    fn exit_status_display() {
        assert_eq!(ExitStatus::Code(1).to_string(), "exit code 1");
        assert_eq!(
            ExitStatus::Signaled(Signal::SIGKILL).to_string(),
            "signal SIGKILL"
        );
        assert!(ExitStatus::Code(0).success());
        assert!(!ExitStatus::Unknown.success());
    }
}
