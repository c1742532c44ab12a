// src/process/mod.rs

//! Line-oriented IPC with a single child process.
//!
//! - [`channel`] allocates the command and output pipes.
//! - [`spawn`] forks, wires the child's stdin/stdout and execs.
//! - [`reap`] tracks liveness and kills/reaps the child.
//! - [`reader`] turns output bytes into lines with a bounded wait.
//! - [`mirror`] fans output lines out to in-process observers.
//! - [`handle`] ties these together as [`ProcessHandle`].

pub mod channel;
pub mod handle;
pub mod mirror;
pub mod reader;
pub mod reap;
pub mod spawn;

pub use handle::{KillSwitch, ProcessHandle, ProcessState};
pub use mirror::LineMirror;
pub use reader::{LineBuffer, LineMatcher, ReadEnd, ReadOutcome, ReadTimeout, ReaderOptions};
pub use reap::{ExitStatus, Liveness};
