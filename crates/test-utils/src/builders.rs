#![allow(dead_code)]

use std::path::PathBuf;

use procline::config::{ProcessSection, RawSessionConfig, ReaderSection, SessionConfig, StepConfig};

/// Builder for `SessionConfig` to simplify test setup.
pub struct SessionConfigBuilder {
    config: RawSessionConfig,
}

impl SessionConfigBuilder {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            config: RawSessionConfig {
                process: ProcessSection {
                    command: command.into(),
                    args: Vec::new(),
                },
                reader: ReaderSection::default(),
                steps: Vec::new(),
            },
        }
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.config.process.args.push(arg.to_string());
        self
    }

    pub fn timeout_ms(mut self, ms: i64) -> Self {
        self.config.reader.timeout_ms = ms;
        self
    }

    pub fn send(mut self, line: &str) -> Self {
        self.config.steps.push(StepConfig {
            send: Some(line.to_string()),
            ..Default::default()
        });
        self
    }

    pub fn expect(mut self, prefix: &str) -> Self {
        self.config.steps.push(StepConfig {
            expect: Some(prefix.to_string()),
            ..Default::default()
        });
        self
    }

    pub fn expect_regex(mut self, pattern: &str) -> Self {
        self.config.steps.push(StepConfig {
            expect_regex: Some(pattern.to_string()),
            ..Default::default()
        });
        self
    }

    pub fn read(mut self) -> Self {
        self.config.steps.push(StepConfig {
            read: true,
            ..Default::default()
        });
        self
    }

    /// Override the timeout of the step added last.
    pub fn within_ms(mut self, ms: i64) -> Self {
        if let Some(step) = self.config.steps.last_mut() {
            step.timeout_ms = Some(ms);
        }
        self
    }

    pub fn build(self) -> SessionConfig {
        SessionConfig::try_from(self.config).expect("Failed to build valid session from builder")
    }
}
