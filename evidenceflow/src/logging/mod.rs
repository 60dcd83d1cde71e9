//! Leveled logging for pipelines.
//!
//! A [`Logger`] pairs a minimum [`LogLevel`] with a [`LogSink`]. Messages
//! below the minimum are dropped before they reach the sink. The default
//! sink forwards to `tracing`; [`init_tracing`] installs a formatting
//! subscriber for binaries and examples that do not set one up themselves.

mod level;
mod sink;

pub use level::{LogLevel, ParseLogLevelError};
pub use sink::{LogEntry, LogSink, MemoryLogSink, NoOpLogSink, TracingLogSink};

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// A sink plus a minimum level.
#[derive(Debug, Clone)]
pub struct Logger {
    min_level: LogLevel,
    sink: Arc<dyn LogSink>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(LogLevel::default(), Arc::new(TracingLogSink))
    }
}

impl Logger {
    /// Creates a logger.
    #[must_use]
    pub fn new(min_level: LogLevel, sink: Arc<dyn LogSink>) -> Self {
        Self { min_level, sink }
    }

    /// Creates a logger that forwards to `tracing`.
    #[must_use]
    pub fn tracing(min_level: LogLevel) -> Self {
        Self::new(min_level, Arc::new(TracingLogSink))
    }

    /// Creates a logger that discards everything.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(LogLevel::Critical, Arc::new(NoOpLogSink))
    }

    /// Returns the minimum level.
    #[must_use]
    pub const fn min_level(&self) -> LogLevel {
        self.min_level
    }

    /// Returns true if messages at `level` reach the sink.
    #[must_use]
    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    /// Logs a message if its level is at or above the minimum.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        if self.enabled(level) {
            self.sink.log(&LogEntry::new(level, message));
        }
    }
}

/// Installs a `tracing` fmt subscriber filtered by `RUST_LOG`, falling back
/// to `default_filter`.
///
/// Returns false if a global subscriber was already installed.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
