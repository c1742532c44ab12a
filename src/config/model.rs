// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::process::{LineMatcher, ReadTimeout, ReaderOptions};

/// Session file as read from TOML, before validation.
///
/// ```toml
/// [process]
/// command = "/usr/local/bin/stockfish"
/// args = []
///
/// [reader]
/// timeout_ms = 1000
///
/// [[step]]
/// send = "uci"
///
/// [[step]]
/// expect = "uciok"
/// timeout_ms = 5000
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawSessionConfig {
    pub process: ProcessSection,

    #[serde(default)]
    pub reader: ReaderSection,

    /// `[[step]]` tables, run in file order.
    #[serde(default, rename = "step")]
    pub steps: Vec<StepConfig>,
}

/// `[process]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessSection {
    /// Absolute path of the executable. It becomes `argv[0]` as well.
    pub command: PathBuf,

    #[serde(default)]
    pub args: Vec<String>,
}

/// `[reader]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ReaderSection {
    /// Default read timeout for `read`/`expect` steps. `0` waits forever.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: i64,

    /// Bytes requested per `read(2)` on the output pipe.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_timeout_ms() -> i64 {
    1000
}

fn default_buffer_size() -> usize {
    crate::process::reader::DEFAULT_BUFFER_SIZE
}

impl Default for ReaderSection {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            buffer_size: default_buffer_size(),
        }
    }
}

/// One `[[step]]` table. Exactly one of `send`, `expect`, `expect_regex`
/// or `read = true` must be set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    #[serde(default)]
    pub send: Option<String>,

    /// Wait for a line starting with this prefix.
    #[serde(default)]
    pub expect: Option<String>,

    /// Wait for a line matching this regex.
    #[serde(default)]
    pub expect_regex: Option<String>,

    /// Collect output until the timeout elapses or the child closes stdout.
    #[serde(default)]
    pub read: bool,

    /// Overrides `[reader].timeout_ms` for this step.
    #[serde(default)]
    pub timeout_ms: Option<i64>,
}

/// Validated session; build it with `SessionConfig::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub command: PathBuf,
    pub args: Vec<String>,
    pub reader: ReaderOptions,
    pub default_timeout: ReadTimeout,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone)]
pub struct Step {
    pub action: StepAction,
    /// Ignored by `Send`.
    pub timeout: ReadTimeout,
}

#[derive(Debug, Clone)]
pub enum StepAction {
    Send(String),
    Read,
    Expect(LineMatcher),
}
