//! Declared configuration bundles (`conf/bundles.toml`).
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::toml_loader;
use crate::error::{ConfigError, EngineError};
use crate::paths::{HOME_MARKER, PathResolver};
use crate::platform::Platform;

/// Whether a bundle is part of the core set or opt-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleKind {
    /// Installed on every machine.
    Core,
    /// Installed on request.
    #[default]
    Optional,
}

/// A bundle as declared in `bundles.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Bundle {
    /// Unique bundle name.
    pub name: String,
    /// Source directory, relative to the repository root.
    pub source: String,
    /// Destination root expression; defaults to the home directory.
    #[serde(default = "default_target")]
    pub target: String,
    /// Core or optional.
    #[serde(default)]
    pub kind: BundleKind,
    /// Platforms the bundle applies to; empty means all.
    #[serde(default)]
    pub platforms: Vec<String>,
}

fn default_target() -> String {
    HOME_MARKER.to_string()
}

impl Bundle {
    /// Resolve the bundle's paths against the given resolver.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidPath`] if either the source or the
    /// destination expression escapes its base directory.
    pub fn resolve(&self, resolver: &PathResolver) -> Result<ResolvedBundle, EngineError> {
        Ok(ResolvedBundle {
            name: self.name.clone(),
            source_dir: resolver.resolve_source(&self.source)?,
            target_dir: resolver.resolve_target(&self.target)?,
            is_core: self.kind == BundleKind::Core,
        })
    }
}

/// A bundle with absolute paths, ready for the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBundle {
    /// Unique bundle name.
    pub name: String,
    /// Absolute source directory inside the repository.
    pub source_dir: PathBuf,
    /// Absolute destination root inside the home directory.
    pub target_dir: PathBuf,
    /// Whether the bundle is a core bundle.
    pub is_core: bool,
}

impl ResolvedBundle {
    /// Build a bundle directly from absolute paths.
    #[must_use]
    pub fn new(name: &str, source_dir: impl Into<PathBuf>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            source_dir: source_dir.into(),
            target_dir: target_dir.into(),
            is_core: false,
        }
    }

    /// Whether the source is a single file rather than a directory.
    ///
    /// A single-file bundle has exactly one relative path, the file's own
    /// name, so `vim/.vimrc` links to `<target>/.vimrc`.
    #[must_use]
    pub fn is_single_file(&self) -> bool {
        std::fs::metadata(&self.source_dir).is_ok_and(|m| !m.is_dir())
    }

    /// Absolute source path for a bundle-relative file.
    #[must_use]
    pub fn source_of(&self, relative: &Path) -> PathBuf {
        if self.is_single_file() && self.source_dir.file_name() == Some(relative.as_os_str()) {
            return self.source_dir.clone();
        }
        self.source_dir.join(relative)
    }

    /// Absolute destination path for a bundle-relative file.
    #[must_use]
    pub fn target_of(&self, relative: &Path) -> PathBuf {
        self.target_dir.join(relative)
    }
}

#[derive(Debug, Deserialize, Default)]
struct BundleFile {
    #[serde(default)]
    bundle: Vec<Bundle>,
}

/// Load declared bundles from `bundles.toml`, keeping declaration order and
/// dropping bundles that do not apply to `platform`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, a bundle has an
/// empty name, or two bundles share a name.
pub fn load(path: &Path, platform: &Platform) -> Result<Vec<Bundle>, ConfigError> {
    let file: BundleFile = toml_loader::load_config(path)?;

    let mut seen = HashSet::new();
    for bundle in &file.bundle {
        if bundle.name.trim().is_empty() {
            return Err(ConfigError::EmptyName(bundle.source.clone()));
        }
        if !seen.insert(bundle.name.as_str()) {
            return Err(ConfigError::DuplicateBundle(bundle.name.clone()));
        }
    }

    Ok(file
        .bundle
        .into_iter()
        .filter(|b| platform.matches(&b.platforms))
        .collect())
}
