//! Path expression resolution.
//!
//! Config-declared paths are expressions rooted at a symbolic marker:
//!
//! - `~`: the user's home directory
//! - `$DOTFILES`: the dotfiles repository root
//!
//! Resolution is purely lexical (no filesystem access) and the result must
//! stay inside the marker's base directory.
use std::path::{Component, Path, PathBuf};

use crate::error::EngineError;

/// Marker for home-relative expressions.
pub const HOME_MARKER: &str = "~";
/// Marker for repository-relative expressions.
pub const REPO_MARKER: &str = "$DOTFILES";

/// Expands path expressions against explicit base directories.
#[derive(Debug, Clone)]
pub struct PathResolver {
    home: PathBuf,
    repo_root: PathBuf,
}

impl PathResolver {
    /// Create a resolver for the given home directory and repository root.
    ///
    /// Both bases are normalised lexically once so containment checks compare
    /// like with like.
    #[must_use]
    pub fn new(home: &Path, repo_root: &Path) -> Self {
        Self {
            home: normalize(home).unwrap_or_else(|| home.to_path_buf()),
            repo_root: normalize(repo_root).unwrap_or_else(|| repo_root.to_path_buf()),
        }
    }

    /// Home directory used for `~` expressions.
    #[must_use]
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Repository root used for `$DOTFILES` expressions.
    #[must_use]
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Resolve `expr` to an absolute path inside its marker's base directory.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidPath`] if the expression has no recognised
    /// marker or if it escapes the base directory.
    pub fn resolve(&self, expr: &str) -> Result<PathBuf, EngineError> {
        let (base, rest) = if let Some(rest) = strip_marker(expr, HOME_MARKER) {
            (&self.home, rest)
        } else if let Some(rest) = strip_marker(expr, REPO_MARKER) {
            (&self.repo_root, rest)
        } else {
            return Err(EngineError::invalid_path(
                expr,
                format!("must start with '{HOME_MARKER}' or '{REPO_MARKER}'"),
            ));
        };

        let rest = Path::new(rest);
        if rest.has_root() || rest.components().any(|c| matches!(c, Component::Prefix(_))) {
            return Err(EngineError::invalid_path(expr, "absolute path after marker"));
        }

        let joined = base.join(rest);
        let resolved = normalize(&joined)
            .ok_or_else(|| EngineError::invalid_path(expr, "traverses above filesystem root"))?;

        if !resolved.starts_with(base) {
            return Err(EngineError::invalid_path(
                expr,
                format!("escapes base directory {}", base.display()),
            ));
        }
        Ok(resolved)
    }

    /// Resolve a repo-relative source path (as declared in `bundles.toml`).
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve).
    pub fn resolve_source(&self, relative: &str) -> Result<PathBuf, EngineError> {
        self.resolve(&format!("{REPO_MARKER}/{relative}"))
    }

    /// Resolve a destination expression, which must use the home marker.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidPath`] for expressions rooted anywhere
    /// other than home, plus everything [`resolve`](Self::resolve) rejects.
    pub fn resolve_target(&self, expr: &str) -> Result<PathBuf, EngineError> {
        if strip_marker(expr, HOME_MARKER).is_none() {
            return Err(EngineError::invalid_path(
                expr,
                format!("destination must start with '{HOME_MARKER}'"),
            ));
        }
        self.resolve(expr)
    }
}

/// Return the remainder of `expr` after `marker`, if `expr` starts with it
/// as a whole segment.
fn strip_marker<'a>(expr: &'a str, marker: &str) -> Option<&'a str> {
    let rest = expr.strip_prefix(marker)?;
    if rest.is_empty() {
        return Some("");
    }
    rest.strip_prefix('/').or_else(|| rest.strip_prefix('\\'))
}

/// Lexically normalise `path`: drop `.` segments and fold `..` into their
/// parent.  Returns `None` when `..` would climb above the root.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                out.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                let popped_normal = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if !popped_normal || !out.pop() {
                    return None;
                }
            }
        }
    }
    Some(out)
}
