#![allow(dead_code)]

use std::error::Error;
use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, waitpid};
use nix::unistd::Pid;
use procline::process::ProcessHandle;

pub use procline_test_utils::init_tracing;

pub type TestResult = Result<(), Box<dyn Error>>;

/// `true` once `pid` is no longer our child, i.e. it was reaped.
pub fn is_reaped(pid: Pid) -> bool {
    matches!(waitpid(pid, Some(WaitPidFlag::WNOHANG)), Err(Errno::ECHILD))
}

/// Poll `is_alive` until it reports `false`, for at most `limit`.
pub fn wait_until_dead(handle: &mut ProcessHandle, limit: Duration) -> Result<bool, Box<dyn Error>> {
    let started = Instant::now();
    while started.elapsed() < limit {
        if !handle.is_alive()? {
            return Ok(true);
        }
        thread::sleep(Duration::from_millis(20));
    }
    Ok(false)
}
