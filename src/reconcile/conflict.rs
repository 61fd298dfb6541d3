//! Conflict discovery and resolution policy.
//!
//! Conflicts are always listed before anything is mutated; a
//! [`ConflictStrategy`] then decides, per conflict, what the stow engine may do.
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use super::drift::BundleInspection;
use super::inspect::LinkState;
use crate::config::ResolvedBundle;

/// Why a destination blocks linking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// A real file or directory occupies the destination.
    ForeignFile,
    /// A symlink points somewhere other than the source.
    IncorrectLink,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ForeignFile => write!(f, "existing file"),
            Self::IncorrectLink => write!(f, "link to another location"),
        }
    }
}

/// A destination that blocks linking one file of a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Bundle-relative path.
    pub relative: PathBuf,
    /// Absolute destination path.
    pub target: PathBuf,
    /// What occupies the destination.
    pub kind: ConflictKind,
}

/// What to do about one conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Leave the destination alone and do not link this file.
    Skip,
    /// Move the destination aside, then link.
    BackupAndOverwrite,
    /// Do not touch the bundle at all.
    Abort,
}

/// List the conflicts of an inspected bundle, in inspection order.
#[must_use]
pub fn find_conflicts(bundle: &ResolvedBundle, inspection: &BundleInspection) -> Vec<Conflict> {
    inspection
        .files
        .iter()
        .filter_map(|(rel, state)| {
            let kind = match state {
                LinkState::Foreign => ConflictKind::ForeignFile,
                LinkState::IncorrectLink { .. } => ConflictKind::IncorrectLink,
                LinkState::Absent | LinkState::CorrectLink => return None,
            };
            Some(Conflict {
                relative: rel.clone(),
                target: bundle.target_of(rel),
                kind,
            })
        })
        .collect()
}

/// Policy deciding what happens to each conflict.
pub trait ConflictStrategy: Send + Sync {
    /// Decide what to do about `conflict`.
    fn resolve(&self, conflict: &Conflict) -> Decision;

    /// Whether decisions need a human; forces sequential batch execution.
    fn is_interactive(&self) -> bool {
        false
    }
}

/// Never overwrite anything: every conflict aborts its bundle.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailClosed;

impl ConflictStrategy for FailClosed {
    fn resolve(&self, _conflict: &Conflict) -> Decision {
        Decision::Abort
    }
}

/// Back up every conflicting destination and link over it.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoBackupAndOverwrite;

impl ConflictStrategy for AutoBackupAndOverwrite {
    fn resolve(&self, _conflict: &Conflict) -> Decision {
        Decision::BackupAndOverwrite
    }
}

/// Invalid answers tolerated before a conflict is treated as aborted.
const MAX_PROMPT_ATTEMPTS: usize = 3;

/// Ask the user about each conflict.
///
/// Prompts are written to `W`; answers are read line by line from `R`.
/// End of input, read errors, and repeated invalid answers all abort.
#[derive(Debug)]
pub struct InteractivePrompt<R, W> {
    io: Mutex<(R, W)>,
}

impl<R: BufRead, W: Write> InteractivePrompt<R, W> {
    /// Prompt on `output`, reading answers from `input`.
    pub const fn new(input: R, output: W) -> Self {
        Self {
            io: Mutex::new((input, output)),
        }
    }
}

impl InteractivePrompt<std::io::BufReader<std::io::Stdin>, std::io::Stderr> {
    /// Prompt on stderr, reading answers from stdin.
    #[must_use]
    pub fn terminal() -> Self {
        Self::new(std::io::BufReader::new(std::io::stdin()), std::io::stderr())
    }
}

impl<R, W> ConflictStrategy for InteractivePrompt<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn resolve(&self, conflict: &Conflict) -> Decision {
        let Ok(mut guard) = self.io.lock() else {
            return Decision::Abort;
        };
        let (input, output) = &mut *guard;

        for _ in 0..MAX_PROMPT_ATTEMPTS {
            let shown = write!(
                output,
                "{} ({}): [s]kip, [b]ackup and overwrite, [a]bort bundle? ",
                conflict.target.display(),
                conflict.kind
            )
            .and_then(|()| output.flush());
            if let Err(e) = shown {
                tracing::warn!("cannot show conflict prompt: {e}");
                return Decision::Abort;
            }

            let mut line = String::new();
            match input.read_line(&mut line) {
                Ok(0) | Err(_) => return Decision::Abort,
                Ok(_) => {}
            }
            match line.trim().to_ascii_lowercase().as_str() {
                "s" | "skip" => return Decision::Skip,
                "b" | "backup" => return Decision::BackupAndOverwrite,
                "a" | "abort" => return Decision::Abort,
                other => {
                    if writeln!(output, "unrecognised answer '{other}'").is_err() {
                        return Decision::Abort;
                    }
                }
            }
        }
        Decision::Abort
    }

    fn is_interactive(&self) -> bool {
        true
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn conflict() -> Conflict {
        Conflict {
            relative: PathBuf::from(".vimrc"),
            target: PathBuf::from("/home/u/.vimrc"),
            kind: ConflictKind::ForeignFile,
        }
    }

    fn prompt(answers: &str) -> InteractivePrompt<Cursor<Vec<u8>>, Vec<u8>> {
        InteractivePrompt::new(Cursor::new(answers.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn find_conflicts_maps_states_to_kinds() {
        let bundle = ResolvedBundle::new("sh", "/repo/sh", "/home/u");
        let inspection = BundleInspection {
            files: vec![
                (PathBuf::from(".a"), LinkState::Absent),
                (PathBuf::from(".b"), LinkState::CorrectLink),
                (PathBuf::from(".c"), LinkState::Foreign),
                (
                    PathBuf::from(".d"),
                    LinkState::IncorrectLink {
                        current: PathBuf::from("/x"),
                    },
                ),
            ],
            orphans: vec![PathBuf::from(".e")],
        };
        let conflicts = find_conflicts(&bundle, &inspection);
        assert_eq!(conflicts.len(), 2);
        assert_eq!(conflicts[0].kind, ConflictKind::ForeignFile);
        assert_eq!(conflicts[0].target, PathBuf::from("/home/u/.c"));
        assert_eq!(conflicts[1].kind, ConflictKind::IncorrectLink);
    }

    #[test]
    fn fail_closed_always_aborts() {
        assert_eq!(FailClosed.resolve(&conflict()), Decision::Abort);
        assert!(!FailClosed.is_interactive());
    }

    #[test]
    fn auto_backup_always_overwrites() {
        assert_eq!(
            AutoBackupAndOverwrite.resolve(&conflict()),
            Decision::BackupAndOverwrite
        );
    }

    #[test]
    fn prompt_accepts_short_and_long_answers() {
        assert_eq!(prompt("s\n").resolve(&conflict()), Decision::Skip);
        assert_eq!(
            prompt("Backup\n").resolve(&conflict()),
            Decision::BackupAndOverwrite
        );
        assert_eq!(prompt("a\n").resolve(&conflict()), Decision::Abort);
    }

    #[test]
    fn prompt_retries_invalid_answers() {
        let p = prompt("x\ny\nb\n");
        assert_eq!(p.resolve(&conflict()), Decision::BackupAndOverwrite);
        let (_, output) = p.io.into_inner().unwrap();
        let text = String::from_utf8(output).unwrap();
        assert_eq!(text.matches("unrecognised").count(), 2);
        assert!(text.contains("/home/u/.vimrc"));
    }

    #[test]
    fn prompt_gives_up_after_three_invalid_answers() {
        assert_eq!(prompt("x\nx\nx\ns\n").resolve(&conflict()), Decision::Abort);
    }

    struct ClosedTerminal;

    impl Write for ClosedTerminal {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }
    }

    #[test]
    fn prompt_aborts_when_question_cannot_be_shown() {
        let p = InteractivePrompt::new(Cursor::new(b"b\n".to_vec()), ClosedTerminal);
        assert_eq!(p.resolve(&conflict()), Decision::Abort);
        let (input, _) = p.io.into_inner().unwrap();
        assert_eq!(input.position(), 0);
    }

    #[test]
    fn prompt_aborts_on_end_of_input() {
        let p = prompt("");
        assert_eq!(p.resolve(&conflict()), Decision::Abort);
        assert!(p.is_interactive());
    }
}
