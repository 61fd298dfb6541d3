//! Persisted record of managed bundles.
//!
//! A single JSON document at `<home>/.config/dotlink/state.json`, written
//! owner-only because it records machine-identifying paths.
use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::platform::Platform;

/// Tool version stamped into every saved state.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// One managed bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRecord {
    /// Bundle name.
    pub name: String,
    /// Installed source path.
    pub path: PathBuf,
    /// When the bundle was first managed.
    pub installed_at: DateTime<Utc>,
    /// Whether the bundle is a core bundle.
    #[serde(default)]
    pub is_core: bool,
}

/// A machine-specific configuration file rendered by the templating layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConfigRecord {
    /// Where the rendered file lives.
    pub path: PathBuf,
    /// When it was rendered.
    pub installed_at: DateTime<Utc>,
}

/// An external dependency (e.g. a cloned plugin repository).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalDepRecord {
    /// Where it was fetched from.
    pub url: String,
    /// Where it was installed.
    pub path: PathBuf,
    /// When it was installed.
    pub installed_at: DateTime<Utc>,
}

/// Everything the tool remembers between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedState {
    /// Version of the tool that last saved this state.
    pub version: String,
    /// When the state was first created.
    pub installed_at: DateTime<Utc>,
    /// When the state was last saved.
    pub last_update: DateTime<Utc>,
    /// Repository the bundles were linked from.
    pub dotfiles_path: PathBuf,
    /// Platform snapshot taken when the state was created.
    pub platform: Platform,
    /// Managed bundles; a name appears at most once.
    #[serde(default)]
    pub configs: Vec<ConfigRecord>,
    /// Machine-specific configuration files.
    #[serde(default)]
    pub machine_config: BTreeMap<String, MachineConfigRecord>,
    /// External dependencies.
    #[serde(default)]
    pub external_deps: BTreeMap<String, ExternalDepRecord>,
    /// Cached number of source files per bundle.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub symlink_counts: BTreeMap<String, usize>,
    /// Fields written by other versions of the tool, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ManagedState {
    /// Fresh, empty state.
    #[must_use]
    pub fn new(dotfiles_path: &Path, platform: Platform) -> Self {
        let now = Utc::now();
        Self {
            version: TOOL_VERSION.to_string(),
            installed_at: now,
            last_update: now,
            dotfiles_path: dotfiles_path.to_path_buf(),
            platform,
            configs: Vec::new(),
            machine_config: BTreeMap::new(),
            external_deps: BTreeMap::new(),
            symlink_counts: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Record `name` as managed, updating the existing entry in place.
    ///
    /// The original `installed_at` is kept when the bundle was already managed.
    pub fn add_config(&mut self, name: &str, path: &Path, is_core: bool) {
        if let Some(existing) = self.configs.iter_mut().find(|c| c.name == name) {
            existing.path = path.to_path_buf();
            existing.is_core = is_core;
            return;
        }
        self.configs.push(ConfigRecord {
            name: name.to_string(),
            path: path.to_path_buf(),
            installed_at: Utc::now(),
            is_core,
        });
    }

    /// Forget `name`; returns whether it was managed.
    pub fn remove_config(&mut self, name: &str) -> bool {
        let before = self.configs.len();
        self.configs.retain(|c| c.name != name);
        self.symlink_counts.remove(name);
        self.configs.len() != before
    }

    /// Whether `name` is managed.
    #[must_use]
    pub fn is_managed(&self, name: &str) -> bool {
        self.configs.iter().any(|c| c.name == name)
    }

    /// The record for `name`, if managed.
    #[must_use]
    pub fn config(&self, name: &str) -> Option<&ConfigRecord> {
        self.configs.iter().find(|c| c.name == name)
    }

    /// Names of all managed bundles, in insertion order.
    pub fn config_names(&self) -> impl Iterator<Item = &str> {
        self.configs.iter().map(|c| c.name.as_str())
    }

    /// Cache the file count of `name`.
    pub fn set_symlink_count(&mut self, name: &str, count: usize) {
        self.symlink_counts.insert(name.to_string(), count);
    }

    /// Cheap pre-check: `true` unless the cached count equals `file_count`.
    #[must_use]
    pub fn is_likely_drifted(&self, name: &str, file_count: usize) -> bool {
        self.symlink_counts.get(name) != Some(&file_count)
    }
}

/// How far apart the tool and the state's writer are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionWarning {
    /// Written by a newer release with the same major version.
    Minor {
        /// Version recorded in the state file.
        state: String,
        /// Version of the running tool.
        tool: String,
    },
    /// Written by a newer major version; the schema may have changed.
    Major {
        /// Version recorded in the state file.
        state: String,
        /// Version of the running tool.
        tool: String,
    },
}

impl std::fmt::Display for VersionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Minor { state, tool } => write!(
                f,
                "state was written by dotlink {state}, newer than this dotlink {tool}; consider upgrading"
            ),
            Self::Major { state, tool } => write!(
                f,
                "state was written by dotlink {state}, a newer MAJOR version than this dotlink {tool}; \
                 the state format may have changed incompatibly, upgrade before making changes"
            ),
        }
    }
}

/// Compare the running tool's version against the state's writer.
///
/// Returns `None` when the state is not newer or either version is not valid
/// semver.
#[must_use]
pub fn check_version(tool_version: &str, state_version: &str) -> Option<VersionWarning> {
    let tool = semver::Version::parse(tool_version).ok()?;
    let state = semver::Version::parse(state_version).ok()?;
    if state <= tool {
        return None;
    }
    let same_major = state.major == tool.major;
    let (state, tool) = (state.to_string(), tool.to_string());
    Some(if same_major {
        VersionWarning::Minor { state, tool }
    } else {
        VersionWarning::Major { state, tool }
    })
}

/// Loads and saves [`ManagedState`] at a fixed path.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<home>/.config/dotlink/state.json`.
    #[must_use]
    pub fn for_home(home: &Path) -> Self {
        Self::new(home.join(".config").join("dotlink").join("state.json"))
    }

    /// Location of the state file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a state file exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load the state; `Ok(None)` on first run.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] if the file cannot be read and
    /// [`EngineError::StateCorrupt`] if it cannot be parsed.  A corrupt file is
    /// left untouched.
    pub fn load(&self) -> Result<Option<ManagedState>, EngineError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(EngineError::io(&self.path, e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| EngineError::StateCorrupt {
                path: self.path.clone(),
                source,
            })
    }

    /// Persist `state`, refreshing its `last_update` and `version`.
    ///
    /// Writes to a sibling temp file with owner-only permissions, then
    /// renames it into place.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] if the directory or file cannot be written.
    pub fn save(&self, state: &mut ManagedState) -> Result<(), EngineError> {
        state.last_update = Utc::now();
        state.version = TOOL_VERSION.to_string();

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| EngineError::io(dir, e))?;
        restrict_permissions(dir, 0o700)?;

        let json = serde_json::to_string_pretty(state).map_err(|e| {
            EngineError::io(&self.path, std::io::Error::other(e.to_string()))
        })?;

        let tmp = self.path.with_extension("json.tmp");
        let mut file = open_private(&tmp)?;
        file.write_all(json.as_bytes())
            .and_then(|()| file.write_all(b"\n"))
            .and_then(|()| file.sync_all())
            .map_err(|e| EngineError::io(&tmp, e))?;
        drop(file);

        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(EngineError::io(&self.path, e));
        }
        Ok(())
    }

    /// Remove the state file; a missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] if the file exists but cannot be removed.
    pub fn delete(&self) -> Result<(), EngineError> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                Err(EngineError::io(&self.path, e))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> Result<std::fs::File, EngineError> {
    use std::os::unix::fs::OpenOptionsExt;
    let file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| EngineError::io(path, e))?;
    restrict_permissions(path, 0o600)?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> Result<std::fs::File, EngineError> {
    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| EngineError::io(path, e))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path, mode: u32) -> Result<(), EngineError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| EngineError::io(path, e))
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
const fn restrict_permissions(_path: &Path, _mode: u32) -> Result<(), EngineError> {
    Ok(())
}
