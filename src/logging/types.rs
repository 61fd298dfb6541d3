//! Core logging types: bundle entries, status, and the [`Log`] trait.

/// Per-bundle result for summary reporting.
#[derive(Debug, Clone)]
pub struct BundleEntry {
    /// Bundle name.
    pub name: String,
    /// Final status of the bundle.
    pub status: EntryStatus,
    /// Optional detail message (e.g., skip reason or error description).
    pub message: Option<String>,
}

/// Status of a processed bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Bundle completed (or, in a dry run, would complete).
    Ok,
    /// Bundle was not started (e.g., cancelled).
    Skipped,
    /// Bundle was aborted on conflicts or hit an error.
    Failed,
}

/// Abstraction over logging backends.
///
/// Command setup and the batch reporting helpers in [`crate::commands`] take
/// `&dyn Log`, so any backend can collect their output.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a dry-run action message.
    fn dry_run(&self, msg: &str);
    /// Record a bundle result for the summary.
    fn record(&self, name: &str, status: EntryStatus, message: Option<&str>);
}
