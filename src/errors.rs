// src/errors.rs

//! Crate-wide error types.
//!
//! [`ProcessError`] covers the process-handle core; [`ProclineError`] is what
//! the config loader, the session runner and the binary deal in.

use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

use crate::process::ReadEnd;

/// Failures of a [`ProcessHandle`](crate::process::ProcessHandle) operation.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to create {channel} channel: {source}")]
    ChannelCreation {
        channel: &'static str,
        #[source]
        source: Errno,
    },

    #[error("failed to spawn {command:?}: {source}")]
    Spawn {
        command: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("process {pid} is still running; kill it before starting again")]
    AlreadyRunning { pid: i32 },

    #[error("waitpid() failed for process {pid}: {source}")]
    Reap {
        pid: i32,
        #[source]
        source: Errno,
    },

    #[error("the process is not running")]
    NotRunning,

    #[error("could not send command to the process: {0}")]
    Write(#[source] io::Error),

    #[error("poll() failed: {0}")]
    Wait(#[source] Errno),

    #[error("failed to read process output: {0}")]
    Read(#[source] io::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type ProcessResult<T> = std::result::Result<T, ProcessError>;

#[derive(Error, Debug)]
pub enum ProclineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("step {step}: expected a line matching {pattern:?} but the read ended with {end:?}")]
    ExpectNotMet {
        step: usize,
        pattern: String,
        end: ReadEnd,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ProclineError>;
