//! Symlink resource: create, remove, and back up a single destination.
use std::path::{Path, PathBuf};

use super::ResourceChange;
use crate::error::EngineError;

/// Suffix appended to destinations moved aside before an overwrite.
pub const BACKUP_SUFFIX: &str = "dotlink.bak";

/// A symlink from `target` (in the home tree) to `source` (in the repo).
#[derive(Debug, Clone)]
pub struct SymlinkResource {
    /// The source file (what the symlink points to).
    pub source: PathBuf,
    /// The destination path (where the symlink lives).
    pub target: PathBuf,
}

impl SymlinkResource {
    /// Create a new symlink resource.
    #[must_use]
    pub const fn new(source: PathBuf, target: PathBuf) -> Self {
        Self { source, target }
    }

    /// Human-readable description of this link.
    #[must_use]
    pub fn description(&self) -> String {
        format!("{} -> {}", self.target.display(), self.source.display())
    }

    /// Create the symlink, creating parent directories as needed.
    ///
    /// The destination must not exist; callers clear conflicts first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] if a parent directory or the link itself
    /// cannot be created.
    pub fn link(&self) -> Result<ResourceChange, EngineError> {
        ensure_parent_dir(&self.target)?;
        create_symlink(&self.source, &self.target)?;
        Ok(ResourceChange::Applied)
    }

    /// Remove the link at `target`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] if the link cannot be removed.
    pub fn unlink(&self) -> Result<ResourceChange, EngineError> {
        if self.target.symlink_metadata().is_err() {
            return Ok(ResourceChange::AlreadyCorrect);
        }
        remove_symlink(&self.target)?;
        Ok(ResourceChange::Applied)
    }

    /// Move whatever currently occupies `target` aside and return its new
    /// location.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] if the rename fails.
    pub fn backup(&self) -> Result<PathBuf, EngineError> {
        let backup = backup_path(&self.target);
        std::fs::rename(&self.target, &backup).map_err(|e| EngineError::io(&self.target, e))?;
        Ok(backup)
    }
}

/// First free backup location for `target`: `<name>.dotlink.bak`, then
/// `<name>.dotlink.bak.1`, `.2`, …
#[must_use]
pub fn backup_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    let first = target.with_file_name(format!("{name}.{BACKUP_SUFFIX}"));
    if first.symlink_metadata().is_err() {
        return first;
    }
    (1u32..)
        .map(|n| target.with_file_name(format!("{name}.{BACKUP_SUFFIX}.{n}")))
        .find(|candidate| candidate.symlink_metadata().is_err())
        .unwrap_or(first)
}

/// Ensure the parent directory of `path` exists.
fn ensure_parent_dir(path: &Path) -> Result<(), EngineError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
    }
    Ok(())
}

/// Create a symlink at `link` pointing to `source` (platform-specific).
///
/// On Windows, if symlink creation fails with "Access is denied" (OS error 5),
/// falls back to junctions for directories and hard links for files.
fn create_symlink(source: &Path, link: &Path) -> Result<(), EngineError> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(source, link).map_err(|e| EngineError::io(link, e))?;
    }

    #[cfg(windows)]
    {
        let result = if source.is_dir() {
            std::os::windows::fs::symlink_dir(source, link)
        } else {
            std::os::windows::fs::symlink_file(source, link)
        };
        match result {
            Ok(()) => {}
            Err(e) if e.raw_os_error() == Some(5) => create_symlink_fallback(source, link)?,
            Err(e) => return Err(EngineError::io(link, e)),
        }
    }

    Ok(())
}

/// Fallback for Windows when symlinks are not permitted.
#[cfg(windows)]
fn create_symlink_fallback(source: &Path, link: &Path) -> Result<(), EngineError> {
    if source.is_dir() {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        let output = std::process::Command::new("cmd")
            .arg("/c")
            .arg(format!(
                "mklink /J \"{}\" \"{}\"",
                link.display(),
                source.display()
            ))
            .creation_flags(CREATE_NO_WINDOW)
            .output()
            .map_err(|e| EngineError::io(link, e))?;
        if !output.status.success() {
            return Err(EngineError::io(
                link,
                std::io::Error::other(format!(
                    "mklink /J failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                )),
            ));
        }
    } else {
        std::fs::hard_link(source, link).map_err(|e| EngineError::io(link, e))?;
    }
    Ok(())
}

/// Remove a symlink, handling platform differences.
///
/// On Windows, directory symlinks must be removed with `remove_dir` (not
/// `remove_file`), so the raw `FILE_ATTRIBUTE_DIRECTORY` flag is checked.
fn remove_symlink(path: &Path) -> Result<(), EngineError> {
    let meta = std::fs::symlink_metadata(path).map_err(|e| EngineError::io(path, e))?;
    if is_dir_like(&meta) {
        std::fs::remove_dir(path).map_err(|e| EngineError::io(path, e))
    } else {
        std::fs::remove_file(path).map_err(|e| EngineError::io(path, e))
    }
}

/// Check if metadata represents a directory-like entry.
fn is_dir_like(meta: &std::fs::Metadata) -> bool {
    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        meta.file_attributes() & 0x10 != 0 // FILE_ATTRIBUTE_DIRECTORY
    }
    #[cfg(not(windows))]
    {
        meta.is_dir()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn description_mentions_both_ends() {
        let resource = SymlinkResource::new(PathBuf::from("/source"), PathBuf::from("/target"));
        assert!(resource.description().contains("/source"));
        assert!(resource.description().contains("/target"));
    }

    #[cfg(unix)]
    #[test]
    fn link_creates_parents_and_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source");
        std::fs::write(&source, "x").unwrap();
        let target = dir.path().join("a/b/target");

        let resource = SymlinkResource::new(source.clone(), target.clone());
        assert_eq!(resource.link().unwrap(), ResourceChange::Applied);
        assert_eq!(std::fs::read_link(&target).unwrap(), source);
    }

    #[cfg(unix)]
    #[test]
    fn unlink_removes_only_the_link() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source");
        std::fs::write(&source, "x").unwrap();
        let target = dir.path().join("target");
        std::os::unix::fs::symlink(&source, &target).unwrap();

        let resource = SymlinkResource::new(source.clone(), target.clone());
        assert_eq!(resource.unlink().unwrap(), ResourceChange::Applied);
        assert!(target.symlink_metadata().is_err());
        assert!(source.exists());
    }

    #[test]
    fn unlink_missing_target_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let resource = SymlinkResource::new(dir.path().join("s"), dir.path().join("t"));
        assert_eq!(resource.unlink().unwrap(), ResourceChange::AlreadyCorrect);
    }

    #[test]
    fn backup_moves_file_aside() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join(".vimrc");
        std::fs::write(&target, "mine").unwrap();

        let resource = SymlinkResource::new(dir.path().join("src"), target.clone());
        let backup = resource.backup().unwrap();
        assert_eq!(backup, dir.path().join(".vimrc.dotlink.bak"));
        assert!(!target.exists());
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "mine");
    }

    #[test]
    fn backup_path_picks_first_free_slot() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join(".bashrc");
        std::fs::write(dir.path().join(".bashrc.dotlink.bak"), "").unwrap();
        std::fs::write(dir.path().join(".bashrc.dotlink.bak.1"), "").unwrap();
        assert_eq!(
            backup_path(&target),
            dir.path().join(".bashrc.dotlink.bak.2")
        );
    }
}
