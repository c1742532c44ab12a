// src/config/validate.rs

use crate::config::model::{
    ProcessSection, RawSessionConfig, ReaderSection, SessionConfig, Step, StepAction,
    StepConfig,
};
use crate::errors::{ProclineError, Result};
use crate::process::{LineMatcher, ReadTimeout, ReaderOptions};

impl TryFrom<RawSessionConfig> for SessionConfig {
    type Error = ProclineError;

    fn try_from(raw: RawSessionConfig) -> std::result::Result<Self, Self::Error> {
        validate_process(&raw.process)?;
        let reader = validate_reader(&raw.reader)?;
        ensure_has_steps(&raw)?;

        let default_timeout = ReadTimeout::from_millis(raw.reader.timeout_ms);
        let steps = raw
            .steps
            .iter()
            .enumerate()
            .map(|(idx, step)| validate_step(idx + 1, step, default_timeout))
            .collect::<Result<Vec<_>>>()?;

        Ok(SessionConfig {
            command: raw.process.command,
            args: raw.process.args,
            reader,
            default_timeout,
            steps,
        })
    }
}

fn validate_process(process: &ProcessSection) -> Result<()> {
    if !process.command.is_absolute() {
        return Err(ProclineError::ConfigError(format!(
            "[process].command must be an absolute path (got {:?})",
            process.command
        )));
    }
    Ok(())
}

fn validate_reader(reader: &ReaderSection) -> Result<ReaderOptions> {
    ReaderOptions::new(reader.buffer_size)
        .map_err(|e| ProclineError::ConfigError(format!("[reader].buffer_size: {e}")))
}

fn ensure_has_steps(cfg: &RawSessionConfig) -> Result<()> {
    if cfg.steps.is_empty() {
        return Err(ProclineError::ConfigError(
            "session must contain at least one [[step]]".to_string(),
        ));
    }
    Ok(())
}

fn validate_step(number: usize, step: &StepConfig, default_timeout: ReadTimeout) -> Result<Step> {
    let actions = [
        step.send.is_some(),
        step.expect.is_some(),
        step.expect_regex.is_some(),
        step.read,
    ]
    .into_iter()
    .filter(|set| *set)
    .count();

    if actions != 1 {
        return Err(ProclineError::ConfigError(format!(
            "step {number} must set exactly one of `send`, `expect`, `expect_regex` or `read = true` (found {actions})"
        )));
    }

    let action = if let Some(ref line) = step.send {
        if line.trim_end_matches('\n').contains('\n') {
            return Err(ProclineError::ConfigError(format!(
                "step {number}: `send` must be a single line"
            )));
        }
        StepAction::Send(line.clone())
    } else if let Some(ref prefix) = step.expect {
        StepAction::Expect(LineMatcher::prefix(prefix.as_str()))
    } else if let Some(ref pattern) = step.expect_regex {
        let matcher = LineMatcher::regex(pattern).map_err(|e| {
            ProclineError::ConfigError(format!("step {number}: invalid `expect_regex`: {e}"))
        })?;
        StepAction::Expect(matcher)
    } else {
        StepAction::Read
    };

    let timeout = step
        .timeout_ms
        .map(ReadTimeout::from_millis)
        .unwrap_or(default_timeout);

    Ok(Step { action, timeout })
}
