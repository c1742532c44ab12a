// src/process/channel.rs

//! Pipe pair allocation.
//!
//! A handle talks to its child over two pipes:
//!
//! ```text
//!   controller                          child
//!   commands (write) ---- command ----> stdin  (read)
//!   output   (read)  <--- output  ----- stdout (write)
//! ```
//!
//! Every end is an [`OwnedFd`], so each descriptor is closed exactly once:
//! either when the role is handed off (the child ends are moved into the
//! spawner and dropped in the parent after `fork`) or when its owner goes
//! away. All ends are close-on-exec; the child's `dup2` onto fd 0/1 is what
//! makes its two ends survive `execv`.

use std::fs::File;
use std::os::fd::OwnedFd;

use nix::errno::Errno;

use crate::errors::{ProcessError, ProcessResult};

/// The two ends the child turns into its standard streams.
#[derive(Debug)]
pub struct ChildEnds {
    /// Read end of the command channel; becomes the child's stdin.
    pub stdin: OwnedFd,
    /// Write end of the output channel; becomes the child's stdout.
    pub stdout: OwnedFd,
}

/// The two ends the controller keeps after spawning.
#[derive(Debug)]
pub struct ControllerEnds {
    /// Write end of the command channel.
    pub commands: File,
    /// Read end of the output channel.
    pub output: File,
}

/// Both channels of one handle, before they are split between the two sides.
#[derive(Debug)]
pub struct Channels {
    pub controller: ControllerEnds,
    pub child: ChildEnds,
}

impl Channels {
    /// Allocate the command and output channels.
    pub fn allocate() -> ProcessResult<Self> {
        let (output_read, output_write) =
            cloexec_pipe().map_err(|source| ProcessError::ChannelCreation {
                channel: "output",
                source,
            })?;
        let (command_read, command_write) =
            cloexec_pipe().map_err(|source| ProcessError::ChannelCreation {
                channel: "command",
                source,
            })?;

        Ok(Self {
            controller: ControllerEnds {
                commands: File::from(command_write),
                output: File::from(output_read),
            },
            child: ChildEnds {
                stdin: command_read,
                stdout: output_write,
            },
        })
    }

    pub fn split(self) -> (ControllerEnds, ChildEnds) {
        (self.controller, self.child)
    }
}

/// Create a pipe whose two ends are both close-on-exec. Returns `(read, write)`.
#[cfg(not(target_vendor = "apple"))]
pub(crate) fn cloexec_pipe() -> Result<(OwnedFd, OwnedFd), Errno> {
    use nix::fcntl::OFlag;

    nix::unistd::pipe2(OFlag::O_CLOEXEC)
}

/// Create a pipe whose two ends are both close-on-exec. Returns `(read, write)`.
///
/// No `pipe2` here, so the flag is set after the fact; a fork on another
/// thread in between can still inherit the ends.
#[cfg(target_vendor = "apple")]
pub(crate) fn cloexec_pipe() -> Result<(OwnedFd, OwnedFd), Errno> {
    use std::os::fd::AsRawFd;

    use nix::fcntl::{FcntlArg, FdFlag, fcntl};

    let (read, write) = nix::unistd::pipe()?;
    for fd in [&read, &write] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    }
    Ok((read, write))
}
