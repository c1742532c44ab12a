// src/process/spawn.rs

//! Fork/exec with descriptor role wiring.
//!
//! [`spawn_child`] is the only place that forks. Everything the child needs
//! (C strings, the NULL-terminated argv table) is built before `fork`, so the
//! child runs nothing but async-signal-safe calls until `execv` replaces it.
//!
//! Exec failures are reported back over a close-on-exec status pipe: a
//! successful `execv` closes the write end and the parent reads
//! end-of-stream; a failed one writes the errno first. The child never
//! returns into controller code.

#![allow(unsafe_code)]

use std::ffi::{CStr, CString, OsStr};
use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use nix::errno::Errno;
use nix::libc;
use nix::sys::signal::{SigHandler, Signal, signal};
use nix::sys::wait::waitpid;
use nix::unistd::{ForkResult, Pid, fork};
use tracing::{debug, info};

use crate::errors::{ProcessError, ProcessResult};
use crate::process::channel::{ChildEnds, cloexec_pipe};

/// Exit code of a child whose setup or `execv` failed.
pub const EXEC_FAILURE_EXIT_CODE: i32 = 127;

/// Spawn `executable` with `argv`, wiring `ends.stdin` to the child's
/// standard input and `ends.stdout` to its standard output.
///
/// `ends` is consumed: the parent's copies are closed before this returns,
/// so the controller never holds a stray child-side end.
pub fn spawn_child<S: AsRef<OsStr>>(
    executable: &Path,
    argv: &[S],
    ends: ChildEnds,
) -> ProcessResult<Pid> {
    let path = to_cstring(executable.as_os_str())?;
    let args = argv
        .iter()
        .map(|a| to_cstring(a.as_ref()))
        .collect::<ProcessResult<Vec<_>>>()?;
    let mut argv_ptrs: Vec<*const libc::c_char> = args.iter().map(|a| a.as_ptr()).collect();
    argv_ptrs.push(std::ptr::null());

    let spawn_err = |source: io::Error| ProcessError::Spawn {
        command: executable.to_path_buf(),
        source,
    };

    let (status_read, status_write) = cloexec_pipe().map_err(|e| spawn_err(e.into()))?;

    debug!(command = %executable.display(), argc = args.len(), "forking child");

    // SAFETY: the child branch only calls async-signal-safe functions and
    // ends in `execv` or `_exit`.
    match unsafe { fork() }.map_err(|e| spawn_err(e.into()))? {
        ForkResult::Child => unsafe { exec_child(&path, &argv_ptrs, &ends, &status_write) },
        ForkResult::Parent { child } => {
            drop(ends);
            drop(status_write);

            match read_exec_status(status_read) {
                Ok(None) => {
                    info!(pid = %child, command = %executable.display(), "started process");
                    Ok(child)
                }
                Ok(Some(errno)) => {
                    reap_failed_child(child);
                    Err(spawn_err(io::Error::from_raw_os_error(errno)))
                }
                Err(e) => {
                    reap_failed_child(child);
                    Err(spawn_err(e))
                }
            }
        }
    }
}

fn to_cstring(s: &OsStr) -> ProcessResult<CString> {
    CString::new(s.as_bytes()).map_err(|_| {
        ProcessError::InvalidArgument(format!("{:?} contains an interior NUL byte", s))
    })
}

/// `Ok(None)` when the child exec'd, `Ok(Some(errno))` when it reported a
/// failure before exiting.
fn read_exec_status(status_read: OwnedFd) -> io::Result<Option<i32>> {
    let mut file = File::from(status_read);
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    match filled {
        0 => Ok(None),
        4 => Ok(Some(i32::from_be_bytes(buf))),
        n => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("truncated exec status from child ({n} bytes)"),
        )),
    }
}

fn reap_failed_child(pid: Pid) {
    loop {
        match waitpid(pid, None) {
            Err(Errno::EINTR) => continue,
            Ok(status) => {
                debug!(%pid, ?status, "reaped child after exec failure");
                break;
            }
            Err(e) => {
                debug!(%pid, error = %e, "could not reap child after exec failure");
                break;
            }
        }
    }
}

/// Child side of the fork. Never returns.
///
/// The controller's ends are close-on-exec, so they are gone by the time
/// the new image runs; only fd 0 and 1 carry the child's ends through.
unsafe fn exec_child(
    path: &CStr,
    argv: &[*const libc::c_char],
    ends: &ChildEnds,
    status: &OwnedFd,
) -> ! {
    let status = status.as_raw_fd();

    unsafe {
        // The controller owns interactive interrupts.
        let _ = signal(Signal::SIGINT, SigHandler::SigIgn);
        // The controller ignores SIGPIPE and that disposition survives exec.
        let _ = signal(Signal::SIGPIPE, SigHandler::SigDfl);

        let mut stdin_fd = ends.stdin.as_raw_fd();
        let stdout_fd = ends.stdout.as_raw_fd();

        // Installing stdin first would clobber a stdout end that sits on fd 0.
        if stdout_fd == libc::STDIN_FILENO {
            fail(status, b"dup");
        }
        if stdin_fd == libc::STDOUT_FILENO {
            stdin_fd = libc::fcntl(stdin_fd, libc::F_DUPFD_CLOEXEC, 3);
            if stdin_fd < 0 {
                fail(status, b"dup");
            }
        }

        install(stdin_fd, libc::STDIN_FILENO, status);
        install(stdout_fd, libc::STDOUT_FILENO, status);

        libc::execv(path.as_ptr(), argv.as_ptr());
        fail(status, b"execv");
    }
}

/// Make `target` refer to `fd`'s pipe and drop the redundant original.
unsafe fn install(fd: RawFd, target: RawFd, status: RawFd) {
    unsafe {
        if fd == target {
            if libc::fcntl(fd, libc::F_SETFD, 0) < 0 {
                fail(status, b"fcntl");
            }
            return;
        }
        if libc::dup2(fd, target) < 0 {
            fail(status, b"dup2");
        }
        libc::close(fd);
    }
}

/// Report `errno` to the parent and stderr, then `_exit`.
unsafe fn fail(status: RawFd, stage: &[u8]) -> ! {
    let errno = Errno::last() as i32;
    unsafe {
        let code = errno.to_be_bytes();
        libc::write(status, code.as_ptr().cast(), code.len());

        let mut msg = [0u8; 96];
        let mut len = 0;
        for part in [b"procline child: ".as_slice(), stage, b" failed with error code ".as_slice()] {
            let n = part.len().min(msg.len() - len);
            msg[len..len + n].copy_from_slice(&part[..n]);
            len += n;
        }
        len += write_decimal(errno, &mut msg[len..]);
        if len < msg.len() {
            msg[len] = b'\n';
            len += 1;
        }
        libc::write(libc::STDERR_FILENO, msg.as_ptr().cast(), len);

        libc::_exit(EXEC_FAILURE_EXIT_CODE);
    }
}

/// Format a non-negative integer without allocating. Returns bytes written.
fn write_decimal(mut value: i32, out: &mut [u8]) -> usize {
    let mut digits = [0u8; 10];
    let mut n = 0;
    value = value.max(0);
    loop {
        digits[n] = b'0' + (value % 10) as u8;
        n += 1;
        value /= 10;
        if value == 0 {
            break;
        }
    }
    let n = n.min(out.len());
    for i in 0..n {
        out[i] = digits[n - 1 - i];
    }
    n
}
