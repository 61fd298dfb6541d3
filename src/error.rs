//! Domain-specific error types for the reconciliation engine.
//!
//! Engine modules return typed errors ([`EngineError`], [`ConfigError`])
//! while command handlers at the CLI boundary convert them to
//! [`anyhow::Error`] via the standard `?` operator.
//!
//! # Error kinds
//!
//! ```text
//! EngineError: paths, filesystem I/O, conflicts, state file
//! ConfigError: bundles.toml loading and validation
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the reconciliation engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A path expression was malformed or escaped its base directory.
    #[error("invalid path '{expr}': {reason}")]
    InvalidPath {
        /// The offending path expression.
        expr: String,
        /// Why the expression was rejected.
        reason: String,
    },

    /// An underlying filesystem call failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path the failing call operated on.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Destination conflicts exist and no resolution allowed mutation.
    #[error("bundle '{bundle}' has {} unresolved conflict(s): {}", conflicts.len(), conflicts.join(", "))]
    ConflictUnresolved {
        /// Bundle whose mutation was blocked.
        bundle: String,
        /// Bundle-relative paths of the blocking conflicts.
        conflicts: Vec<String>,
    },

    /// The state file exists but could not be parsed.
    #[error("state file {} is corrupt: {source}", path.display())]
    StateCorrupt {
        /// Location of the state file.
        path: PathBuf,
        /// Parse error reported by `serde_json`.
        source: serde_json::Error,
    },
}

impl EngineError {
    /// Build an [`EngineError::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build an [`EngineError::InvalidPath`].
    pub fn invalid_path(expr: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            expr: expr.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that arise while loading declared bundles.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The bundle file could not be read.
    #[error("IO error reading config file {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The bundle file is not valid TOML or does not match the schema.
    #[error("Invalid TOML in {file}: {message}")]
    InvalidSyntax {
        /// File that failed to parse.
        file: String,
        /// Parser message.
        message: String,
    },

    /// Two bundles share a name.
    #[error("Duplicate bundle name '{0}'")]
    DuplicateBundle(String),

    /// A bundle was declared without a name.
    #[error("Bundle with source '{0}' has an empty name")]
    EmptyName(String),
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn invalid_path_display() {
        let e = EngineError::invalid_path("~/../etc", "escapes base directory");
        assert_eq!(
            e.to_string(),
            "invalid path '~/../etc': escapes base directory"
        );
    }

    #[test]
    fn io_display_includes_path() {
        let e = EngineError::io(
            "/home/user/.vimrc",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(e.to_string().contains("/home/user/.vimrc"));
        assert!(e.to_string().contains("denied"));
    }

    #[test]
    fn conflict_unresolved_lists_paths() {
        let e = EngineError::ConflictUnresolved {
            bundle: "vim".to_string(),
            conflicts: vec![".vimrc".to_string(), ".gvimrc".to_string()],
        };
        assert_eq!(
            e.to_string(),
            "bundle 'vim' has 2 unresolved conflict(s): .vimrc, .gvimrc"
        );
    }

    #[test]
    fn state_corrupt_has_source() {
        use std::error::Error as StdError;
        let parse = serde_json::from_str::<serde_json::Value>("{").expect_err("must fail");
        let e = EngineError::StateCorrupt {
            path: PathBuf::from("/home/user/.config/dotlink/state.json"),
            source: parse,
        };
        assert!(e.source().is_some());
        assert!(e.to_string().contains("corrupt"));
    }

    #[test]
    fn config_error_duplicate_display() {
        let e = ConfigError::DuplicateBundle("nvim".to_string());
        assert_eq!(e.to_string(), "Duplicate bundle name 'nvim'");
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn all_error_types_are_send_sync() {
        assert_send_sync::<EngineError>();
        assert_send_sync::<ConfigError>();
    }

    #[test]
    fn engine_error_converts_to_anyhow() {
        let e = EngineError::invalid_path("x", "y");
        let _anyhow_err: anyhow::Error = e.into();
    }
}
