//! Declared configuration: which bundles exist and where they live.
pub mod bundles;
pub mod toml_loader;

use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::platform::Platform;

pub use bundles::{Bundle, BundleKind, ResolvedBundle};

/// All loaded configuration for the current platform.
#[derive(Debug)]
pub struct Config {
    /// Root of the dotfiles repository.
    pub root: PathBuf,
    /// Declared bundles applicable to this platform, in declaration order.
    pub bundles: Vec<Bundle>,
}

impl Config {
    /// Load all configuration from `<root>/conf/`.
    ///
    /// # Errors
    ///
    /// Returns an error if `bundles.toml` exists but is invalid.
    pub fn load(root: &Path, platform: &Platform) -> Result<Self, ConfigError> {
        let bundles = bundles::load(&root.join("conf").join("bundles.toml"), platform)?;
        Ok(Self {
            root: root.to_path_buf(),
            bundles,
        })
    }
}
