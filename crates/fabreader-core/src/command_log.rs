//! Bounded per-command log trail.

use crate::constants::COMMAND_LOG_CAPACITY;
use std::collections::VecDeque;

/// Ordered, bounded sequence of human-readable log lines.
///
/// Cleared at the start of every command, appended to while the handler
/// runs and flushed into the command result. Once full, the oldest entry is
/// dropped for every new one.
#[derive(Debug, Clone)]
pub struct CommandLog {
    entries: VecDeque<String>,
    capacity: usize,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::with_capacity(COMMAND_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry.into());
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Move every entry out, oldest first, leaving the log empty.
    pub fn drain(&mut self) -> Vec<String> {
        self.entries.drain(..).collect()
    }
}

impl Default for CommandLog {
    fn default() -> Self {
        Self::new()
    }
}
