// src/process/mirror.rs

//! In-process fan-out of the child's output lines.
//!
//! There is exactly one reader of the output pipe (the handle). Every line it
//! hands out is also published here, to any number of subscribers, over
//! unbounded Tokio channels. `send` on an unbounded sender never blocks and
//! needs no runtime, so publishing is safe from the synchronous read path.

use tokio::sync::mpsc;
use tracing::trace;

#[derive(Debug, Default)]
pub struct LineMirror {
    subscribers: Vec<mpsc::UnboundedSender<String>>,
}

impl LineMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new observer. It sees lines published from now on.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Send `line` to every live subscriber, forgetting those that hung up.
    pub fn publish(&mut self, line: &str) {
        if self.subscribers.is_empty() {
            return;
        }
        self.subscribers
            .retain(|tx| tx.send(line.to_string()).is_ok());
        trace!(subscribers = self.subscribers.len(), "mirrored line");
    }

    pub fn publish_all<'a>(&mut self, lines: impl IntoIterator<Item = &'a String>) {
        for line in lines {
            self.publish(line);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Drop every sender; subscribers drain what is queued and then see `None`.
    pub fn close(&mut self) {
        self.subscribers.clear();
    }
}
