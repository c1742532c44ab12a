// src/process/reader.rs

//! Timeout-bounded, line-buffered reading of the child's output.
//!
//! The output pipe delivers raw bytes with no framing, so reads go through a
//! [`LineBuffer`] that splits on `\n` and carries the trailing partial line
//! across chunks, polls and calls. Waiting is done with `poll(2)` so a child
//! that hangs can't hold the controller past its timeout.

use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::os::fd::AsFd;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use regex::Regex;
use tracing::{debug, trace};

use crate::errors::{ProcessError, ProcessResult};

/// Default size of a single `read` from the output pipe.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Smallest accepted read size.
pub const MIN_BUFFER_SIZE: usize = 64;

/// Largest accepted read size.
pub const MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Longest line kept whole. A longer unterminated run is cut into lines of
/// this many bytes.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// How long a read may wait for output.
///
/// A zero duration means "wait indefinitely", the same as
/// [`ReadTimeout::Infinite`]. There is no hidden upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTimeout {
    Infinite,
    After(Duration),
}

impl ReadTimeout {
    /// Zero or negative millisecond counts mean "wait indefinitely".
    pub fn from_millis(ms: i64) -> Self {
        if ms <= 0 {
            ReadTimeout::Infinite
        } else {
            ReadTimeout::After(Duration::from_millis(ms as u64))
        }
    }

    /// Absolute deadline for a read starting at `now`; `None` is unbounded.
    pub fn deadline(self, now: Instant) -> Option<Instant> {
        match self {
            ReadTimeout::After(d) if !d.is_zero() => now.checked_add(d),
            _ => None,
        }
    }
}

impl From<Duration> for ReadTimeout {
    fn from(d: Duration) -> Self {
        ReadTimeout::After(d)
    }
}

impl fmt::Display for ReadTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadTimeout::After(d) if !d.is_zero() => write!(f, "{d:?}"),
            _ => f.write_str("no timeout"),
        }
    }
}

/// Why a read returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEnd {
    /// The timeout elapsed.
    TimedOut,
    /// The child closed its end of the output channel.
    Closed,
    /// A line satisfied the matcher passed to `read_until`.
    Matched,
}

/// Lines collected by one read, in arrival order, without their `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutcome {
    pub lines: Vec<String>,
    pub end: ReadEnd,
}

impl ReadOutcome {
    pub fn found(&self) -> bool {
        self.end == ReadEnd::Matched
    }

    pub fn closed(&self) -> bool {
        self.end == ReadEnd::Closed
    }

    pub fn timed_out(&self) -> bool {
        self.end == ReadEnd::TimedOut
    }
}

/// What `read_until` looks for in each completed, non-empty line.
#[derive(Debug, Clone)]
pub enum LineMatcher {
    Prefix(String),
    Regex(Regex),
}

impl LineMatcher {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        LineMatcher::Prefix(prefix.into())
    }

    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(LineMatcher::Regex)
    }

    pub fn matches(&self, line: &str) -> bool {
        match self {
            LineMatcher::Prefix(p) => line.starts_with(p.as_str()),
            LineMatcher::Regex(re) => re.is_match(line),
        }
    }
}

impl fmt::Display for LineMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineMatcher::Prefix(p) => write!(f, "prefix {p:?}"),
            LineMatcher::Regex(re) => write!(f, "regex {:?}", re.as_str()),
        }
    }
}

/// Tunables for the output reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    buffer_size: usize,
}

impl ReaderOptions {
    pub fn new(buffer_size: usize) -> ProcessResult<Self> {
        if !(MIN_BUFFER_SIZE..=MAX_BUFFER_SIZE).contains(&buffer_size) {
            return Err(ProcessError::InvalidArgument(format!(
                "read buffer size must be between {MIN_BUFFER_SIZE} and {MAX_BUFFER_SIZE} bytes (got {buffer_size})"
            )));
        }
        Ok(Self { buffer_size })
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Accumulates raw output bytes into complete lines.
///
/// Lines are decoded (lossily) only once complete, so a UTF-8 sequence split
/// across two chunks is reassembled before decoding.
///
/// The unterminated tail never grows past `max_line` bytes: a child that
/// writes without newlines gets its output cut into `max_line`-sized lines
/// (a multi-byte character straddling a cut decodes as U+FFFD).
#[derive(Debug)]
pub struct LineBuffer {
    partial: Vec<u8>,
    complete: VecDeque<String>,
    max_line: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::with_max_line(MAX_LINE_LENGTH)
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            partial: Vec::new(),
            complete: VecDeque::new(),
            max_line: max_line.max(1),
        }
    }

    pub fn feed(&mut self, mut chunk: &[u8]) {
        while !chunk.is_empty() {
            let room = self.max_line - self.partial.len();
            match chunk.iter().position(|&b| b == b'\n') {
                Some(pos) if pos <= room => {
                    self.partial.extend_from_slice(&chunk[..pos]);
                    self.complete_partial();
                    chunk = &chunk[pos + 1..];
                }
                _ if chunk.len() <= room => {
                    self.partial.extend_from_slice(chunk);
                    return;
                }
                _ => {
                    self.partial.extend_from_slice(&chunk[..room]);
                    trace!(bytes = self.max_line, "cutting overlong line");
                    self.complete_partial();
                    chunk = &chunk[room..];
                }
            }
        }
    }

    fn complete_partial(&mut self) {
        self.complete
            .push_back(String::from_utf8_lossy(&self.partial).into_owned());
        self.partial.clear();
    }

    /// Next complete line, oldest first.
    pub fn pop_line(&mut self) -> Option<String> {
        self.complete.pop_front()
    }

    /// Take the unterminated tail, if it is non-empty.
    pub fn take_partial(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.partial).into_owned();
        self.partial.clear();
        Some(line)
    }

    pub fn partial_len(&self) -> usize {
        self.partial.len()
    }

    pub fn clear(&mut self) {
        self.partial.clear();
        self.complete.clear();
    }
}

/// Read lines from `source` until the timeout elapses, the pipe closes, or
/// (with a matcher) a completed non-empty line matches.
///
/// Complete lines left in `buffer` by an earlier call are handed out first.
/// Lines that arrive after a match stay in `buffer`. On timeout and on
/// end-of-stream a non-empty partial line is flushed as the final line.
pub fn read_lines(
    source: &mut File,
    buffer: &mut LineBuffer,
    timeout: ReadTimeout,
    matcher: Option<&LineMatcher>,
    options: ReaderOptions,
) -> ProcessResult<ReadOutcome> {
    let deadline = timeout.deadline(Instant::now());
    let mut chunk = vec![0u8; options.buffer_size()];
    let mut lines = Vec::new();

    loop {
        while let Some(line) = buffer.pop_line() {
            let matched = matcher.is_some_and(|m| !line.is_empty() && m.matches(&line));
            lines.push(line);
            if matched {
                debug!(lines = lines.len(), "matched expected line");
                return Ok(ReadOutcome {
                    lines,
                    end: ReadEnd::Matched,
                });
            }
        }

        if !wait_readable(source, deadline)? {
            lines.extend(buffer.take_partial());
            debug!(lines = lines.len(), %timeout, "read timed out");
            return Ok(ReadOutcome {
                lines,
                end: ReadEnd::TimedOut,
            });
        }

        let n = match source.read(&mut chunk) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ProcessError::Read(e)),
        };
        trace!(bytes = n, "read from output channel");

        if n == 0 {
            lines.extend(buffer.take_partial());
            debug!(lines = lines.len(), "output channel closed");
            return Ok(ReadOutcome {
                lines,
                end: ReadEnd::Closed,
            });
        }
        buffer.feed(&chunk[..n]);
    }
}

/// Wait until `source` is readable (or hung up). `false` once `deadline`
/// has passed. EINTR is retried with whatever budget is left.
fn wait_readable(source: &File, deadline: Option<Instant>) -> ProcessResult<bool> {
    loop {
        let timeout = match deadline {
            None => PollTimeout::NONE,
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Ok(false);
                }
                PollTimeout::try_from(poll_millis(remaining)).unwrap_or(PollTimeout::MAX)
            }
        };

        let mut fds = [PollFd::new(source.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, timeout) {
            // woke early or exactly at the deadline; the next pass decides
            Ok(0) => continue,
            // POLLIN, POLLHUP or POLLERR: the read that follows tells which
            Ok(_) => return Ok(true),
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(ProcessError::Wait(e)),
        }
    }
}

/// Round up to whole milliseconds so `poll` never returns before the deadline.
fn poll_millis(remaining: Duration) -> i32 {
    let mut ms = remaining.as_millis();
    if remaining.subsec_nanos() % 1_000_000 != 0 {
        ms += 1;
    }
    i32::try_from(ms).unwrap_or(i32::MAX)
}
