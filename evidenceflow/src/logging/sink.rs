//! Log sink trait and implementations.

use super::LogLevel;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A single log message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the message was logged.
    pub time: DateTime<Utc>,
    /// The message level.
    pub level: LogLevel,
    /// The message text.
    pub message: String,
}

impl LogEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            time: Utc::now(),
            level,
            message: message.into(),
        }
    }
}

/// Receives log entries that passed the logger's level filter.
///
/// Implementations must not panic; storage and formatting are their concern.
pub trait LogSink: Send + Sync + Debug {
    /// Records one entry.
    fn log(&self, entry: &LogEntry);
}

/// A sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogSink;

impl LogSink for NoOpLogSink {
    fn log(&self, _entry: &LogEntry) {}
}

/// A sink that forwards entries to the `tracing` framework.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, entry: &LogEntry) {
        let message = entry.message.as_str();
        match entry.level {
            LogLevel::Trace => tracing::trace!(target: "evidenceflow", "{}", message),
            LogLevel::Debug => tracing::debug!(target: "evidenceflow", "{}", message),
            LogLevel::Information => tracing::info!(target: "evidenceflow", "{}", message),
            LogLevel::Warning => tracing::warn!(target: "evidenceflow", "{}", message),
            LogLevel::Error => tracing::error!(target: "evidenceflow", "{}", message),
            LogLevel::Critical => {
                tracing::error!(target: "evidenceflow", critical = true, "{}", message);
            }
        }
    }
}

/// A sink that keeps entries in memory, for tests and diagnostics.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    entries: RwLock<Vec<LogEntry>>,
}

impl MemoryLogSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected entries.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.read().clone()
    }

    /// Returns the collected messages.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.entries.read().iter().map(|e| e.message.clone()).collect()
    }

    /// Returns entries at a given level.
    #[must_use]
    pub fn entries_at(&self, level: LogLevel) -> Vec<LogEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.level == level)
            .cloned()
            .collect()
    }

    /// Returns the number of collected entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Clears all collected entries.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl LogSink for MemoryLogSink {
    fn log(&self, entry: &LogEntry) {
        self.entries.write().push(entry.clone());
    }
}
