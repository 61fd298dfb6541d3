//! Utility functions for log paths, ANSI stripping, and time formatting.
use std::fs;
use std::path::{Path, PathBuf};

/// Strip ANSI escape sequences from a string.
///
/// Handles SGR sequences (ending in `m`) and other CSI sequences (ending
/// in any letter in the `@`..`~` range), so cursor movement, erase, etc.
/// are also stripped without consuming unrelated text.
pub(super) fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            if let Some(next) = chars.next()
                && next == '['
            {
                for inner in chars.by_ref() {
                    if ('@'..='~').contains(&inner) {
                        break;
                    }
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Return the terminal width in columns.
///
/// Reads the `COLUMNS` environment variable, falling back to 80 if unset
/// or unparseable.
pub(super) fn terminal_columns() -> usize {
    parse_columns(std::env::var("COLUMNS").ok().as_deref())
}

fn parse_columns(value: Option<&str>) -> usize {
    value
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(80)
}

/// Truncate `line` to at most `max` characters, marking the cut with `…`.
pub(super) fn truncate_to_width(line: &str, max: usize) -> String {
    if line.chars().count() <= max {
        return line.to_string();
    }
    let truncated: String = line.chars().take(max.saturating_sub(1)).collect();
    format!("{truncated}…")
}

/// Root of the per-user cache: `$XDG_CACHE_HOME`, else `~/.cache`.
fn cache_root() -> PathBuf {
    std::env::var("XDG_CACHE_HOME").map_or_else(
        |_| {
            std::env::var("HOME")
                .or_else(|_| std::env::var("USERPROFILE"))
                .map_or_else(|_| PathBuf::from("."), PathBuf::from)
                .join(".cache")
        },
        PathBuf::from,
    )
}

/// Return `<cache_root>/dotlink/<command>.log`, creating the directory.
pub(super) fn log_file_path_in(cache_root: &Path, command: &str) -> Option<PathBuf> {
    let dir = cache_root.join("dotlink");
    fs::create_dir_all(&dir).ok()?;
    Some(dir.join(format!("{command}.log")))
}

/// Return the log file path under `$XDG_CACHE_HOME/dotlink/` (or `~/.cache/dotlink/`).
pub(super) fn log_file_path(command: &str) -> Option<PathBuf> {
    log_file_path_in(&cache_root(), command)
}

/// Format the current UTC time as `YYYY-MM-DD HH:MM:SS`.
pub(super) fn format_utc_datetime() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Format the current UTC time as `HH:MM:SS`.
pub(super) fn format_utc_time() -> String {
    chrono::Utc::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn strip_ansi_removes_colors() {
        assert_eq!(strip_ansi("\x1b[31mERROR\x1b[0m hello"), "ERROR hello");
        assert_eq!(strip_ansi("no codes here"), "no codes here");
        assert_eq!(
            strip_ansi("\x1b[1;34m==>\x1b[0m \x1b[1mstage\x1b[0m"),
            "==> stage"
        );
    }

    #[test]
    fn strip_ansi_handles_csi_sequences() {
        assert_eq!(strip_ansi("\x1b[2Jhello"), "hello");
        assert_eq!(strip_ansi("\r\x1b[Kworld"), "\rworld");
        assert_eq!(strip_ansi("\x1bMtext"), "text");
    }

    #[test]
    fn columns_fall_back_to_80() {
        assert_eq!(parse_columns(Some("120")), 120);
        assert_eq!(parse_columns(Some("0")), 80);
        assert_eq!(parse_columns(Some("wide")), 80);
        assert_eq!(parse_columns(None), 80);
        assert!(terminal_columns() > 0);
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate_to_width("short", 10), "short");
        assert_eq!(truncate_to_width("abcdefghij", 5), "abcd…");
        assert_eq!(truncate_to_width("abcdefghij", 5).chars().count(), 5);
    }

    #[test]
    fn log_path_lives_under_tool_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let path = log_file_path_in(tmp.path(), "sync").unwrap();
        assert_eq!(path, tmp.path().join("dotlink").join("sync.log"));
        assert!(path.parent().unwrap().is_dir());
    }

    #[test]
    fn format_utc_time_has_correct_format() {
        let s = format_utc_time();
        assert_eq!(s.len(), 8, "HH:MM:SS should be 8 chars");
        assert_eq!(&s[2..3], ":", "colon at position 2");
        assert_eq!(&s[5..6], ":", "colon at position 5");
    }

    #[test]
    fn format_utc_datetime_has_correct_format() {
        let s = format_utc_datetime();
        assert_eq!(s.len(), 19, "YYYY-MM-DD HH:MM:SS should be 19 chars");
        assert_eq!(&s[10..11], " ", "space at position 10");
    }
}
