// src/session.rs

//! Scripted driving of one process from a [`SessionConfig`].
//!
//! A session starts the configured executable, walks its steps in order
//! (send a line, read for a while, or wait for an expected line) and kills
//! the child at the end. Steps are blocking calls, so cancelling goes through
//! a [`Canceller`]: it raises a flag checked between steps and kills the
//! child, which ends a step that is still waiting for output.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{SessionConfig, Step, StepAction};
use crate::errors::{ProclineError, Result};
use crate::process::{ExitStatus, KillSwitch, ProcessHandle, ReadEnd};

/// What a single step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// 1-based position in the session file.
    pub step: usize,
    /// Lines read by this step (empty for `send`).
    pub lines: Vec<String>,
    /// How the read ended; `None` for `send`.
    pub end: Option<ReadEnd>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub steps: Vec<StepReport>,
    /// The run stopped early because the cancel flag was raised.
    pub cancelled: bool,
    pub exit_status: Option<ExitStatus>,
}

/// Stops a running [`Session`] from another thread or task.
#[derive(Debug, Clone)]
pub struct Canceller {
    flag: Arc<AtomicBool>,
    switch: KillSwitch,
}

impl Canceller {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.switch.kill();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

pub struct Session {
    config: SessionConfig,
    handle: ProcessHandle,
    cancel: Arc<AtomicBool>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<Self> {
        let handle = ProcessHandle::with_options(&config.command, config.reader)?;
        Ok(Self {
            config,
            handle,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn canceller(&self) -> Canceller {
        Canceller {
            flag: Arc::clone(&self.cancel),
            switch: self.handle.kill_switch(),
        }
    }

    /// Mirror of every line the session reads.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<String> {
        self.handle.subscribe()
    }

    /// Run every step, then kill the child.
    ///
    /// An `expect` step that ends without a matching line fails the session
    /// with [`ProclineError::ExpectNotMet`]; the child is still killed.
    pub fn run(mut self) -> Result<SessionReport> {
        let pid = self.handle.start_with_args(&self.config.args)?;
        info!(%pid, command = %self.config.command.display(), steps = self.config.steps.len(), "session started");

        let mut reports = Vec::with_capacity(self.config.steps.len());
        let mut cancelled = false;

        for (idx, step) in self.config.steps.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                warn!(step = idx + 1, "session cancelled");
                cancelled = true;
                break;
            }
            match run_step(&mut self.handle, idx + 1, step) {
                Ok(report) => reports.push(report),
                // the child was killed under the step
                Err(e) if self.cancel.load(Ordering::SeqCst) => {
                    warn!(step = idx + 1, error = %e, "step interrupted by cancellation");
                    cancelled = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        self.handle.kill();
        let exit_status = self.handle.exit_status();
        info!(steps = reports.len(), cancelled, ?exit_status, "session finished");

        Ok(SessionReport {
            steps: reports,
            cancelled,
            exit_status,
        })
    }
}

fn run_step(handle: &mut ProcessHandle, number: usize, step: &Step) -> Result<StepReport> {
    match &step.action {
        StepAction::Send(line) => {
            debug!(step = number, line = %line, "send");
            handle.send_command(line)?;
            Ok(StepReport {
                step: number,
                lines: Vec::new(),
                end: None,
            })
        }
        StepAction::Read => {
            let outcome = handle.read(step.timeout)?;
            debug!(step = number, lines = outcome.lines.len(), end = ?outcome.end, "read");
            Ok(StepReport {
                step: number,
                lines: outcome.lines,
                end: Some(outcome.end),
            })
        }
        StepAction::Expect(matcher) => {
            let outcome = handle.read_until(step.timeout, matcher)?;
            debug!(step = number, %matcher, lines = outcome.lines.len(), end = ?outcome.end, "expect");
            if !outcome.found() {
                return Err(ProclineError::ExpectNotMet {
                    step: number,
                    pattern: matcher.to_string(),
                    end: outcome.end,
                });
            }
            Ok(StepReport {
                step: number,
                lines: outcome.lines,
                end: Some(outcome.end),
            })
        }
    }
}
