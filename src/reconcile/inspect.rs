//! Link inspection: how does a destination relate to its source?
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::EngineError;

/// Relationship between a destination path and the source it should link to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// Nothing exists at the destination.
    Absent,
    /// The destination is a symlink (or the same file) resolving to the source.
    CorrectLink,
    /// The destination is a symlink resolving somewhere else.
    IncorrectLink {
        /// Where the link currently points.
        current: PathBuf,
    },
    /// The destination is an unrelated file or directory.
    Foreign,
}

/// Classify `target` against `source`.
///
/// Never follows the final component of `target`.  A non-symlink destination
/// that is the same underlying file as `source` (hard link, or a parent
/// directory folded into the source tree) counts as [`LinkState::CorrectLink`].
///
/// # Errors
///
/// Returns [`EngineError::Io`] if `target` cannot be inspected for reasons
/// other than not existing.
pub fn classify(source: &Path, target: &Path) -> Result<LinkState, EngineError> {
    let meta = match std::fs::symlink_metadata(target) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LinkState::Absent),
        Err(e) if e.kind() == ErrorKind::NotADirectory => return Ok(LinkState::Foreign),
        Err(e) => return Err(EngineError::io(target, e)),
    };

    if !meta.file_type().is_symlink() {
        return Ok(if same_file(source, target) {
            LinkState::CorrectLink
        } else {
            LinkState::Foreign
        });
    }

    let resolved = resolve_link(target)?;
    match dunce::canonicalize(source) {
        Ok(canonical) if canonical == resolved => Ok(LinkState::CorrectLink),
        _ => Ok(LinkState::IncorrectLink { current: resolved }),
    }
}

/// Resolve the symlink at `link` to an absolute path.
///
/// Relative link contents are interpreted against the link's own directory.
/// The result is canonicalised when it exists; a dangling link yields the
/// lexically normalised path instead.
///
/// # Errors
///
/// Returns [`EngineError::Io`] if the link cannot be read.
pub fn resolve_link(link: &Path) -> Result<PathBuf, EngineError> {
    let raw = std::fs::read_link(link).map_err(|e| EngineError::io(link, e))?;
    let absolute = if raw.is_absolute() {
        raw
    } else {
        link.parent().map_or_else(|| raw.clone(), |dir| dir.join(&raw))
    };
    Ok(dunce::canonicalize(&absolute).unwrap_or_else(|_| lexical_normalize(&absolute)))
}

/// Whether `a` and `b` are the same underlying file.
#[cfg(unix)]
fn same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (std::fs::metadata(a), std::fs::metadata(b)) {
        (Ok(ma), Ok(mb)) => ma.dev() == mb.dev() && ma.ino() == mb.ino(),
        _ => false,
    }
}

/// Whether `a` and `b` are the same underlying file.
///
/// Without inode numbers, canonical paths are compared; hard links created by
/// the Windows fallback are recognised by identical size and modification
/// time in addition.
#[cfg(not(unix))]
fn same_file(a: &Path, b: &Path) -> bool {
    if let (Ok(ca), Ok(cb)) = (dunce::canonicalize(a), dunce::canonicalize(b))
        && ca == cb
    {
        return true;
    }
    match (std::fs::metadata(a), std::fs::metadata(b)) {
        (Ok(ma), Ok(mb)) => {
            ma.is_file()
                && mb.is_file()
                && ma.len() == mb.len()
                && ma.modified().ok() == mb.modified().ok()
        }
        _ => false,
    }
}

/// Fold `.` and `..` segments without touching the filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
#[cfg(unix)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    fn setup() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("repo/vim/.vimrc");
        std::fs::create_dir_all(source.parent().unwrap()).unwrap();
        std::fs::write(&source, "set nu").unwrap();
        let home = dir.path().join("home");
        std::fs::create_dir_all(&home).unwrap();
        (dir, source, home)
    }

    #[test]
    fn absent_when_target_missing() {
        let (_dir, source, home) = setup();
        assert_eq!(
            classify(&source, &home.join(".vimrc")).unwrap(),
            LinkState::Absent
        );
    }

    #[test]
    fn correct_for_absolute_link() {
        let (_dir, source, home) = setup();
        let target = home.join(".vimrc");
        symlink(&source, &target).unwrap();
        assert_eq!(classify(&source, &target).unwrap(), LinkState::CorrectLink);
    }

    #[test]
    fn correct_for_relative_link() {
        let (_dir, source, home) = setup();
        let target = home.join(".vimrc");
        symlink("../repo/vim/.vimrc", &target).unwrap();
        assert_eq!(classify(&source, &target).unwrap(), LinkState::CorrectLink);
    }

    #[test]
    fn incorrect_for_link_elsewhere() {
        let (dir, source, home) = setup();
        let other = dir.path().join("other");
        std::fs::write(&other, "").unwrap();
        let target = home.join(".vimrc");
        symlink(&other, &target).unwrap();
        assert!(matches!(
            classify(&source, &target).unwrap(),
            LinkState::IncorrectLink { .. }
        ));
    }

    #[test]
    fn incorrect_for_dangling_link() {
        let (_dir, source, home) = setup();
        let target = home.join(".vimrc");
        symlink("/nonexistent/.vimrc", &target).unwrap();
        assert_eq!(
            classify(&source, &target).unwrap(),
            LinkState::IncorrectLink {
                current: PathBuf::from("/nonexistent/.vimrc")
            }
        );
    }

    #[test]
    fn foreign_for_regular_file() {
        let (_dir, source, home) = setup();
        let target = home.join(".vimrc");
        std::fs::write(&target, "mine").unwrap();
        assert_eq!(classify(&source, &target).unwrap(), LinkState::Foreign);
    }

    #[test]
    fn foreign_for_directory() {
        let (_dir, source, home) = setup();
        let target = home.join(".vimrc");
        std::fs::create_dir(&target).unwrap();
        assert_eq!(classify(&source, &target).unwrap(), LinkState::Foreign);
    }

    #[test]
    fn foreign_when_parent_component_is_a_file() {
        let (_dir, source, home) = setup();
        std::fs::write(home.join(".config"), "").unwrap();
        assert_eq!(
            classify(&source, &home.join(".config/nvim/init.lua")).unwrap(),
            LinkState::Foreign
        );
    }

    #[test]
    fn hard_link_counts_as_correct() {
        let (_dir, source, home) = setup();
        let target = home.join(".vimrc");
        std::fs::hard_link(&source, &target).unwrap();
        assert_eq!(classify(&source, &target).unwrap(), LinkState::CorrectLink);
    }

    #[test]
    fn folded_parent_directory_counts_as_correct() {
        let dir = tempfile::tempdir().unwrap();
        let source_dir = dir.path().join("repo/nvim/.config/nvim");
        std::fs::create_dir_all(&source_dir).unwrap();
        std::fs::write(source_dir.join("init.lua"), "").unwrap();
        let home = dir.path().join("home");
        std::fs::create_dir_all(home.join(".config")).unwrap();
        symlink(&source_dir, home.join(".config/nvim")).unwrap();

        assert_eq!(
            classify(
                &source_dir.join("init.lua"),
                &home.join(".config/nvim/init.lua")
            )
            .unwrap(),
            LinkState::CorrectLink
        );
    }

    #[test]
    fn resolve_link_handles_relative_contents() {
        let (dir, source, home) = setup();
        let target = home.join(".vimrc");
        symlink("../repo/vim/.vimrc", &target).unwrap();
        let resolved = resolve_link(&target).unwrap();
        assert_eq!(resolved, dunce::canonicalize(&source).unwrap());
        drop(dir);
    }

    #[test]
    fn lexical_normalize_folds_segments() {
        assert_eq!(
            lexical_normalize(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
    }
}
