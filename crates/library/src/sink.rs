//! Operator-facing log lines.
//!
//! Every decision the organizer executes is reported as one line naming the
//! action and the paths involved. Where those lines go is up to the caller:
//! [`TracingSink`] forwards them to `tracing`, [`MemorySink`] keeps them.

use std::sync::Mutex;

/// Tracing target used by [`TracingSink`].
pub const TARGET: &str = "datum::organize";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warn,
}

/// Receives log lines. Must tolerate concurrent calls.
pub trait LogSink: Send + Sync {
    fn emit(&self, severity: Severity, message: &str);
}

/// Forwards each line to `tracing`, errors at `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;
impl LogSink for TracingSink {
    fn emit(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => tracing::info!(target: TARGET, "{message}"),
            Severity::Warn => tracing::warn!(target: TARGET, "{message}"),
        }
    }
}

/// Collects lines in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(Severity, String)>>,
}
impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(Severity, String)> {
        self.lines.lock().map(|lines| lines.clone()).unwrap_or_default()
    }

    /// Only the message text, in emission order.
    pub fn messages(&self) -> Vec<String> {
        self.lines().into_iter().map(|(_, message)| message).collect()
    }
}
impl LogSink for MemorySink {
    fn emit(&self, severity: Severity, message: &str) {
        // A poisoned lock means another thread panicked mid-push; the
        // remaining lines are still worth keeping.
        let mut lines = self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        lines.push((severity, message.to_string()));
    }
}
