//! Log sinks: the fire-and-forget reporting interface used by request
//! pipelines.

use parking_lot::Mutex;
use std::error::Error as StdError;
use std::fmt::Write as _;

/// Destination for request failure diagnostics.
///
/// Implementations must never panic and never block for long; callers do
/// not inspect any result.
pub trait LogSink: Send + Sync {
    /// Report an error value, including its source chain.
    fn log_exception(&self, error: &(dyn StdError + 'static));

    /// Report a plain error message.
    fn log_error(&self, message: &str);
}

/// Render an error and every `source()` below it as `outer: inner: ...`.
pub fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(rendered, ": {cause}");
        source = cause.source();
    }
    rendered
}

/// Sink that forwards everything to `tracing` at error level, tagged with
/// the owning requester's label.
#[derive(Debug, Clone)]
pub struct TracingSink {
    label: String,
}

impl TracingSink {
    /// Create a sink bound to `label`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    /// The label every event is tagged with.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl LogSink for TracingSink {
    fn log_exception(&self, error: &(dyn StdError + 'static)) {
        tracing::error!(requester = %self.label, error = %error_chain(error), "request error");
    }

    fn log_error(&self, message: &str) {
        tracing::error!(requester = %self.label, "{message}");
    }
}

/// A single entry captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    /// Recorded through [`LogSink::log_exception`], rendered with its chain.
    Exception(String),
    /// Recorded through [`LogSink::log_error`].
    Error(String),
}

impl LogEntry {
    /// The rendered text of the entry.
    pub fn text(&self) -> &str {
        match self {
            LogEntry::Exception(text) | LogEntry::Error(text) => text,
        }
    }
}

/// Sink that keeps every entry in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Number of entries recorded through `log_exception`.
    pub fn exception_count(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| matches!(e, LogEntry::Exception(_)))
            .count()
    }

    /// Number of entries recorded through `log_error`.
    pub fn error_count(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| matches!(e, LogEntry::Error(_)))
            .count()
    }

    /// Drop all recorded entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn log_exception(&self, error: &(dyn StdError + 'static)) {
        self.entries
            .lock()
            .push(LogEntry::Exception(error_chain(error)));
    }

    fn log_error(&self, message: &str) {
        self.entries.lock().push(LogEntry::Error(message.to_string()));
    }
}
