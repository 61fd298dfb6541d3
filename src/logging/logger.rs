//! Structured logger with dry-run awareness and summary collection.
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Mutex;

use super::subscriber::{DRY_RUN_TARGET, STAGE_TARGET};
use super::types::{BundleEntry, EntryStatus, Log};
use super::utils::{log_file_path, terminal_columns, truncate_to_width};

/// Implement the display methods of [`Log`] by delegating to inherent methods
/// of the same name on the implementing type.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Counts behind the end-of-run summary line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryCounts {
    /// Bundles that completed.
    pub ok: usize,
    /// Bundles that were not started.
    pub skipped: usize,
    /// Bundles that failed.
    pub failed: usize,
}

impl SummaryCounts {
    /// Total number of bundles.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.ok + self.skipped + self.failed
    }
}

impl std::fmt::Display for SummaryCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} bundles: {} ok, {} skipped, {} failed",
            self.total(),
            self.ok,
            self.skipped,
            self.failed
        )
    }
}

/// Structured logger with dry-run awareness and summary collection.
///
/// Messages go through [`tracing`]; the subscriber installed by
/// [`init_subscriber`](super::subscriber::init_subscriber) mirrors them into
/// `$XDG_CACHE_HOME/dotlink/<command>.log`.
#[derive(Debug)]
pub struct Logger {
    entries: Mutex<Vec<BundleEntry>>,
    log_file: Option<PathBuf>,
    /// Whether a progress line is currently displayed.
    progress_shown: Mutex<bool>,
}

impl Logger {
    /// Create a logger whose summary points at `log_file`.
    #[must_use]
    pub const fn new(log_file: Option<PathBuf>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            log_file,
            progress_shown: Mutex::new(false),
        }
    }

    /// Create a logger for `command`, using its default log file location.
    #[must_use]
    pub fn for_command(command: &str) -> Self {
        Self::new(log_file_path(command))
    }

    /// Return the log file path, if available.
    #[must_use]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        self.clear_progress();
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        self.clear_progress();
        tracing::warn!("{msg}");
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        self.clear_progress();
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        self.clear_progress();
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose; always
    /// written to the log file).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Log a dry-run action message.
    pub fn dry_run(&self, msg: &str) {
        self.clear_progress();
        tracing::info!(target: DRY_RUN_TARGET, "{msg}");
    }

    /// Record a bundle result for the summary.
    pub fn record(&self, name: &str, status: EntryStatus, message: Option<&str>) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.push(BundleEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }

    /// Return a clone of all recorded entries.
    #[must_use]
    pub fn entries(&self) -> Vec<BundleEntry> {
        self.entries.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Tally the recorded entries.
    #[must_use]
    pub fn counts(&self) -> SummaryCounts {
        let mut counts = SummaryCounts::default();
        for entry in self.entries() {
            match entry.status {
                EntryStatus::Ok => counts.ok += 1,
                EntryStatus::Skipped => counts.skipped += 1,
                EntryStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Count the number of failed bundles.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.counts().failed
    }

    /// Print the summary of all recorded bundles.
    pub fn print_summary(&self) {
        let entries = self.entries();
        if entries.is_empty() {
            return;
        }

        self.stage("Summary");
        for entry in &entries {
            let (icon, color) = match entry.status {
                EntryStatus::Ok => ("✓", "\x1b[32m"),
                EntryStatus::Skipped => ("○", "\x1b[33m"),
                EntryStatus::Failed => ("✗", "\x1b[31m"),
            };
            let suffix = entry
                .message
                .as_ref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));
            self.info(&format!("{color}{icon} {}{suffix}\x1b[0m", entry.name));
        }

        self.info(&self.counts().to_string());
        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }

    /// Render a single-line `current/total message` progress indicator,
    /// replacing any previous one.
    pub fn progress(&self, current: usize, total: usize, message: &str) {
        let line = render_progress(current, total, message, terminal_columns());
        let mut shown = self
            .progress_shown
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut stdout = std::io::stdout().lock();
        write!(stdout, "\r\x1b[K{line}").ok();
        stdout.flush().ok();
        *shown = true;
    }

    /// Erase the progress line, if one is shown.
    pub fn clear_progress(&self) {
        let mut shown = self
            .progress_shown
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if *shown {
            let mut stdout = std::io::stdout().lock();
            write!(stdout, "\r\x1b[K").ok();
            stdout.flush().ok();
            *shown = false;
        }
    }

    /// Whether a progress line is currently displayed.
    #[must_use]
    pub fn is_progress_shown(&self) -> bool {
        *self
            .progress_shown
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Format a progress line that fits in `columns` terminal columns.
fn render_progress(current: usize, total: usize, message: &str, columns: usize) -> String {
    let text = format!("[{current}/{total}] {message}");
    format!(
        "  \x1b[2m▹ {}\x1b[0m",
        truncate_to_width(&text, columns.saturating_sub(4))
    )
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error, dry_run);

    fn record(&self, name: &str, status: EntryStatus, message: Option<&str>) {
        self.record(name, status, message);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::isolated_logger;
    use crate::logging::utils::strip_ansi;
    use std::fs;

    #[test]
    fn logger_new() {
        let (log, _tmp, _guard) = isolated_logger();
        assert!(log.entries().is_empty(), "expected empty entry list");
        assert!(!log.is_progress_shown());
    }

    #[test]
    fn record_with_message() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record("vim", EntryStatus::Skipped, Some("cancelled"));
        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "vim");
        assert_eq!(entries[0].message, Some("cancelled".to_string()));
    }

    #[test]
    fn counts_format_summary_line() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record("a", EntryStatus::Ok, None);
        log.record("b", EntryStatus::Ok, None);
        log.record("c", EntryStatus::Skipped, None);
        log.record("d", EntryStatus::Failed, Some("conflict"));
        assert_eq!(
            log.counts().to_string(),
            "4 bundles: 2 ok, 1 skipped, 1 failed"
        );
        assert_eq!(log.failure_count(), 1);
    }

    #[test]
    fn summary_written_to_file() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record("vim", EntryStatus::Ok, None);
        log.print_summary();
        let contents = fs::read_to_string(log.log_path().unwrap()).unwrap();
        assert!(contents.contains("==> Summary"));
        assert!(contents.contains("1 bundles: 1 ok, 0 skipped, 0 failed"));
    }

    #[test]
    fn debug_always_written_to_file() {
        let (log, _tmp, _guard) = isolated_logger();
        let marker = format!("debug-marker-{}", std::process::id());
        log.debug(&marker);
        let contents = fs::read_to_string(log.log_path().unwrap()).unwrap();
        assert!(contents.contains(&marker));
        assert!(contents.contains("[debug]"));
    }

    #[test]
    fn warn_and_dry_run_tagged_in_file() {
        let (log, _tmp, _guard) = isolated_logger();
        log.warn("careful");
        log.dry_run("would link ~/.vimrc");
        let contents = fs::read_to_string(log.log_path().unwrap()).unwrap();
        assert!(contents.contains("[warn] careful"));
        assert!(contents.contains("[dry run] would link ~/.vimrc"));
    }

    #[test]
    fn log_trait_delegates_to_logger() {
        let (log, _tmp, _guard) = isolated_logger();
        let log_ref: &dyn Log = &log;
        log_ref.record("via-trait", EntryStatus::Ok, None);
        assert_eq!(log.entries().len(), 1);
    }

    #[test]
    fn progress_line_is_tracked_and_cleared() {
        let (log, _tmp, _guard) = isolated_logger();
        log.progress(1, 3, "linking vim");
        assert!(log.is_progress_shown());
        log.info("done");
        assert!(!log.is_progress_shown());
    }

    #[test]
    fn progress_line_fits_terminal() {
        let line = render_progress(2, 10, &"x".repeat(500), 40);
        assert!(strip_ansi(&line).chars().count() <= 40);
        assert!(strip_ansi(&line).contains("[2/10]"));
    }
}
