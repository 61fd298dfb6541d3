// Shared helpers for integration tests.
//
// Provides a temporary-directory-backed dotfiles repository and fake home
// directory, plus a fluent builder for declaring bundles, so each test can
// set up an isolated environment without repeating filesystem boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code, clippy::expect_used)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use dotlink::commands::CommandSetup;
use dotlink::logging::Logger;
use dotlink::platform::{Os, Platform};
use dotlink::state::{ManagedState, StateStore};

/// An isolated repository and home directory backed by a [`tempfile::TempDir`].
pub struct TestEnv {
    dir: tempfile::TempDir,
    declared: Vec<String>,
}

impl TestEnv {
    /// Create an empty repository (with `conf/`) and home directory.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::create_dir_all(dir.path().join("repo").join("conf")).expect("create conf dir");
        std::fs::create_dir_all(dir.path().join("home")).expect("create home dir");
        Self {
            dir,
            declared: Vec::new(),
        }
    }

    /// Repository root.
    pub fn repo(&self) -> PathBuf {
        self.dir.path().join("repo")
    }

    /// Fake home directory.
    pub fn home(&self) -> PathBuf {
        self.dir.path().join("home")
    }

    /// Declare a bundle named `name` containing `files` (bundle-relative).
    pub fn bundle(mut self, name: &str, files: &[&str]) -> Self {
        for rel in files {
            self.write_source(name, rel, rel);
        }
        self.declared.push(format!(
            "[[bundle]]\nname = \"{name}\"\nsource = \"{name}\"\n"
        ));
        self.write_config();
        self
    }

    /// Declare a bundle whose source is the single repository file `source`.
    pub fn file_bundle(mut self, name: &str, source: &str) -> Self {
        let path = self.repo().join(source);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("create source dir");
        std::fs::write(&path, source).expect("write source file");
        self.declared.push(format!(
            "[[bundle]]\nname = \"{name}\"\nsource = \"{source}\"\n"
        ));
        self.write_config();
        self
    }

    /// Write (or overwrite) a source file.
    pub fn write_source(&self, bundle: &str, rel: &str, content: &str) -> PathBuf {
        let path = self.repo().join(bundle).join(rel);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("create source dir");
        std::fs::write(&path, content).expect("write source file");
        path
    }

    /// Absolute path of a file in the home directory.
    pub fn home_path(&self, rel: &str) -> PathBuf {
        self.home().join(rel)
    }

    /// Symlink `~/<rel>` to the bundle's source file, as a user would by hand.
    #[cfg(unix)]
    pub fn link_by_hand(&self, bundle: &str, rel: &str) {
        let target = self.home_path(rel);
        std::fs::create_dir_all(target.parent().expect("parent")).expect("create home dir");
        std::os::unix::fs::symlink(self.repo().join(bundle).join(rel), target)
            .expect("create symlink");
    }

    /// Whether `~/<rel>` is a symlink.
    pub fn is_link(&self, rel: &str) -> bool {
        self.home_path(rel)
            .symlink_metadata()
            .is_ok_and(|m| m.file_type().is_symlink())
    }

    /// Command setup pointing at this environment, sequential execution.
    pub fn setup(&self) -> CommandSetup {
        self.setup_with_jobs(1)
    }

    /// Command setup pointing at this environment.
    pub fn setup_with_jobs(&self, jobs: usize) -> CommandSetup {
        CommandSetup::from_paths(
            self.repo(),
            self.home(),
            Platform::new(Os::Linux),
            jobs,
            &Arc::new(AtomicBool::new(false)),
            &Logger::new(None),
        )
        .expect("command setup")
    }

    /// A fresh logger that writes no log file.
    pub fn logger(&self) -> Arc<Logger> {
        Arc::new(Logger::new(None))
    }

    /// The state store under the fake home.
    pub fn store(&self) -> StateStore {
        StateStore::for_home(&self.home())
    }

    /// Load the saved state, panicking if there is none.
    pub fn state(&self) -> ManagedState {
        self.store()
            .load()
            .expect("load state")
            .expect("state file exists")
    }

    fn write_config(&self) {
        std::fs::write(
            self.repo().join("conf").join("bundles.toml"),
            self.declared.join("\n"),
        )
        .expect("write bundles.toml");
    }
}

/// Recursively list `root` with link targets, for before/after comparisons.
///
/// The state directory (`.config/dotlink`) is left out.
pub fn snapshot(root: &Path) -> Vec<(PathBuf, Option<PathBuf>)> {
    let state_dir = root.join(".config").join("dotlink");
    let mut entries: Vec<_> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.path() != state_dir)
        .map(|e| {
            let e = e.expect("walk");
            (e.path().to_path_buf(), std::fs::read_link(e.path()).ok())
        })
        .collect();
    entries.sort();
    entries
}
