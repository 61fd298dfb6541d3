pub mod adopt;
pub mod status;
pub mod stow;
pub mod sync;
pub mod uninstall;
pub mod version;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context as _, Result};

use crate::cli::{ConflictOpts, GlobalOpts};
use crate::config::{Config, ResolvedBundle};
use crate::logging::{EntryStatus, Log, Logger};
use crate::paths::PathResolver;
use crate::platform::Platform;
use crate::reconcile::conflict::{
    AutoBackupAndOverwrite, ConflictStrategy, FailClosed, InteractivePrompt,
};
use crate::reconcile::progress::Progress;
use crate::reconcile::stow::{BatchReport, BundleStatus, StowEngine};
use crate::reconcile::{BundleError, default_jobs};
use crate::state::{ManagedState, StateStore, TOOL_VERSION, check_version};

/// Shared state produced by the common command setup sequence.
///
/// Resolves the repository, home directory, platform, declared bundles, and
/// state store once so that no engine code has to consult the environment.
#[derive(Debug)]
pub struct CommandSetup {
    /// Dotfiles repository root.
    pub root: PathBuf,
    /// Home directory links are created in.
    pub home: PathBuf,
    /// Detected platform.
    pub platform: Platform,
    /// Declared bundles for this platform whose paths resolved.
    pub bundles: Vec<ResolvedBundle>,
    /// Persisted state location.
    pub store: StateStore,
    /// Worker count for batch operations.
    pub jobs: usize,
    /// Set on Ctrl-C; batches start no further bundles.
    pub cancel: Arc<AtomicBool>,
}

impl CommandSetup {
    /// Resolve paths and load the declared bundles.
    ///
    /// # Errors
    ///
    /// Returns an error if the root or home directory cannot be determined or
    /// `conf/bundles.toml` is invalid.
    pub fn init(global: &GlobalOpts, log: &dyn Log, cancel: &Arc<AtomicBool>) -> Result<Self> {
        let root = resolve_root(global)?;
        let home = resolve_home(global)?;
        let jobs = if global.parallel {
            global.jobs.map_or_else(default_jobs, usize::from)
        } else {
            1
        };
        Self::from_paths(root, home, Platform::detect(), jobs, cancel, log)
    }

    /// Load the declared bundles of `root` for `platform`, resolving their
    /// paths against `home`.
    ///
    /// Bundles whose paths fail to resolve are reported and left out.
    ///
    /// # Errors
    ///
    /// Returns an error if `conf/bundles.toml` is invalid.
    pub fn from_paths(
        root: PathBuf,
        home: PathBuf,
        platform: Platform,
        jobs: usize,
        cancel: &Arc<AtomicBool>,
        log: &dyn Log,
    ) -> Result<Self> {
        log.debug(&format!("root: {}", root.display()));
        log.debug(&format!("home: {}", home.display()));
        log.debug(&format!("platform: {}", platform.os));

        let config = Config::load(&root, &platform)
            .with_context(|| format!("loading bundles from {}", root.display()))?;
        let resolver = PathResolver::new(&home, &root);
        let mut bundles = Vec::with_capacity(config.bundles.len());
        for bundle in &config.bundles {
            match bundle.resolve(&resolver) {
                Ok(resolved) => bundles.push(resolved),
                Err(e) => log.warn(&format!("skipping bundle '{}': {e}", bundle.name)),
            }
        }
        log.debug(&format!("{} bundles declared", bundles.len()));

        Ok(Self {
            store: StateStore::for_home(&home),
            root,
            home,
            platform,
            bundles,
            jobs: jobs.max(1),
            cancel: Arc::clone(cancel),
        })
    }

    /// Load the managed state, or start a fresh one on first run.
    ///
    /// A state written by a newer tool version produces a warning only.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file exists but cannot be read or parsed.
    pub fn load_state(&self, log: &dyn Log) -> Result<ManagedState> {
        let Some(state) = self.store.load()? else {
            log.debug("no state file, starting fresh");
            return Ok(ManagedState::new(&self.root, self.platform.clone()));
        };
        if let Some(warning) = check_version(TOOL_VERSION, &state.version) {
            log.warn(&warning.to_string());
        }
        Ok(state)
    }

    /// Persist `state` unless this is a dry run.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file cannot be written.
    pub fn save_state(&self, state: &mut ManagedState, dry_run: bool, log: &dyn Log) -> Result<()> {
        if dry_run {
            log.dry_run("would update the state file");
            return Ok(());
        }
        self.store.save(state)?;
        log.debug(&format!("state saved to {}", self.store.path().display()));
        Ok(())
    }

    /// Look up declared bundles by name, in the order given.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first bundle that is not declared.
    pub fn select(&self, names: &[String]) -> Result<Vec<ResolvedBundle>> {
        names
            .iter()
            .map(|name| {
                self.bundle(name)
                    .cloned()
                    .with_context(|| format!("unknown bundle '{name}'"))
            })
            .collect()
    }

    /// The declared bundle called `name`.
    #[must_use]
    pub fn bundle(&self, name: &str) -> Option<&ResolvedBundle> {
        self.bundles.iter().find(|b| b.name == name)
    }

    /// Declared bundles recorded in `state`, in declaration order.
    #[must_use]
    pub fn managed_bundles(&self, state: &ManagedState) -> Vec<ResolvedBundle> {
        self.bundles
            .iter()
            .filter(|b| state.is_managed(&b.name))
            .cloned()
            .collect()
    }

    /// Stow engine configured for this run.
    #[must_use]
    pub fn engine(&self, conflicts: &ConflictOpts, dry_run: bool) -> StowEngine {
        StowEngine::new(strategy(conflicts))
            .with_jobs(self.jobs)
            .with_dry_run(dry_run)
            .with_cancel_flag(Arc::clone(&self.cancel))
    }
}

/// Pick the conflict strategy requested on the command line.
#[must_use]
pub fn strategy(conflicts: &ConflictOpts) -> Arc<dyn ConflictStrategy> {
    if conflicts.interactive {
        Arc::new(InteractivePrompt::terminal())
    } else if conflicts.backup {
        Arc::new(AutoBackupAndOverwrite)
    } else {
        Arc::new(FailClosed)
    }
}

/// Resolve the dotfiles root: `--root`, then `$DOTFILES_DIR`, then the
/// current directory.
///
/// # Errors
///
/// Returns an error if the current directory cannot be determined.
pub fn resolve_root(global: &GlobalOpts) -> Result<PathBuf> {
    if let Some(root) = &global.root {
        return Ok(absolute(root));
    }
    if let Some(dir) = std::env::var_os("DOTFILES_DIR").filter(|d| !d.is_empty()) {
        return Ok(absolute(Path::new(&dir)));
    }
    std::env::current_dir().context("cannot determine current directory")
}

/// Resolve the home directory: `--home`, then `$HOME` (`%USERPROFILE%`).
///
/// # Errors
///
/// Returns an error if no home directory is known.
pub fn resolve_home(global: &GlobalOpts) -> Result<PathBuf> {
    if let Some(home) = &global.home {
        return Ok(absolute(home));
    }
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .context("cannot determine home directory; pass --home")
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Progress reporter drawing on the logger's progress line.
#[must_use]
pub fn progress_for(log: &Arc<Logger>) -> Progress {
    let log = Arc::clone(log);
    Progress::new(move |current, total, message| log.progress(current, total, message))
}

/// Record every bundle outcome of `report` in the logger summary.
pub fn record_batch(report: &BatchReport, log: &dyn Log) {
    for outcome in &report.outcomes {
        match &outcome.status {
            BundleStatus::Completed => {
                let changed = outcome.changed();
                let message = (changed > 0).then(|| format!("{changed} changed"));
                log.record(&outcome.bundle, EntryStatus::Ok, message.as_deref());
            }
            BundleStatus::Aborted(_) => {
                let message = outcome
                    .conflict_error()
                    .map_or_else(String::new, |e| e.to_string());
                log.error(&message);
                log.record(&outcome.bundle, EntryStatus::Failed, Some("conflicts"));
            }
            BundleStatus::Failed(message) => {
                log.error(&format!("{}: {message}", outcome.bundle));
                log.record(&outcome.bundle, EntryStatus::Failed, Some(message));
            }
            BundleStatus::Skipped(reason) => {
                log.record(&outcome.bundle, EntryStatus::Skipped, Some(reason));
            }
        }
    }
}

/// Record bundles that could not be inspected.
pub fn record_errors(errors: &[BundleError], log: &dyn Log) {
    for error in errors {
        log.record(&error.bundle, EntryStatus::Failed, Some(&error.message));
    }
}

/// Print the summary and fail if any bundle failed.
///
/// # Errors
///
/// Returns an error if one or more bundles recorded a failure.
pub fn finish(log: &Logger) -> Result<()> {
    log.print_summary();
    let count = log.failure_count();
    if count > 0 {
        anyhow::bail!("{count} bundle(s) failed");
    }
    Ok(())
}

/// Log the per-file actions of a dry run.
pub fn log_dry_run(report: &BatchReport, log: &dyn Log) {
    use crate::reconcile::stow::FileAction;
    for outcome in &report.outcomes {
        for file in &outcome.files {
            let what = match &file.action {
                FileAction::Linked => "link",
                FileAction::BackedUp { .. } => "back up and link",
                FileAction::Unlinked => "unlink",
                _ => continue,
            };
            log.dry_run(&format!(
                "would {what} {}/{}",
                outcome.bundle,
                file.relative.display()
            ));
        }
    }
}
