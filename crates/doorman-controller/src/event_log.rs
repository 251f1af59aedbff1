//! Fixed-capacity ring log of human-readable events.
//!
//! Every classified event ends up here as `"[<secs since boot>s] <message>"`.
//! The log is never persisted; it is what the web UI shows. Each line is also
//! emitted through `tracing` at `info` level.

use doorman_core::constants::LOG_CAPACITY;
use std::collections::VecDeque;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<String>,
    capacity: usize,
    boot: Instant,
}

impl EventLog {
    /// Create a log with the standard capacity of 50 entries.
    pub fn new(boot: Instant) -> Self {
        Self::with_capacity(LOG_CAPACITY, boot)
    }

    /// Create a log holding at most `capacity` entries (at least one).
    pub fn with_capacity(capacity: usize, boot: Instant) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            boot,
        }
    }

    /// Append a message, evicting the oldest entry when full.
    ///
    /// # Examples
    ///
    /// ```
    /// use doorman_controller::EventLog;
    /// use std::time::{Duration, Instant};
    ///
    /// let boot = Instant::now();
    /// let mut log = EventLog::new(boot);
    /// log.append("Relay ON", boot + Duration::from_millis(12_400));
    /// assert_eq!(log.snapshot(), vec!["[12s] Relay ON".to_string()]);
    /// ```
    pub fn append(&mut self, message: impl AsRef<str>, now: Instant) {
        let message = message.as_ref();
        let uptime = now.saturating_duration_since(self.boot).as_secs();
        info!(target: "doorman::event", uptime_s = uptime, "{message}");

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(format!("[{uptime}s] {message}"));
    }

    /// Owned copy of the entries, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Most recent entry.
    pub fn last(&self) -> Option<&str> {
        self.entries.back().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
