//! The stow engine: create and remove a bundle's links.
//!
//! Every operation inspects the bundle first and plans all changes before the
//! first mutation.  A bundle whose conflicts are not all resolved is left
//! untouched.
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::conflict::{Conflict, ConflictStrategy, Decision, find_conflicts};
use super::drift::inspect_bundle;
use super::inspect::LinkState;
use super::progress::Progress;
use super::for_each_bundle;
use crate::config::ResolvedBundle;
use crate::error::EngineError;
use crate::resources::SymlinkResource;
use crate::resources::symlink::backup_path;

/// What happened (or, in a dry run, would happen) to one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileAction {
    /// A new link was created.
    Linked,
    /// The destination already linked to the source.
    AlreadyLinked,
    /// The destination was moved to `backup` and replaced by a link.
    BackedUp {
        /// Where the previous destination now lives.
        backup: PathBuf,
    },
    /// The file was not linked.
    Skipped {
        /// Why.
        reason: String,
    },
    /// A link was removed.
    Unlinked,
    /// The destination was not ours to remove.
    LeftAlone {
        /// Why.
        reason: String,
    },
    /// The filesystem call failed; the rest of the bundle was not attempted.
    Failed {
        /// The underlying error.
        error: String,
    },
}

/// Outcome for a single file of a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    /// Bundle-relative path.
    pub relative: PathBuf,
    /// What happened.
    pub action: FileAction,
}

/// Overall result for a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleStatus {
    /// Every planned change was applied.
    Completed,
    /// Conflicts blocked the bundle; nothing was changed.
    Aborted(Vec<Conflict>),
    /// The bundle could not be inspected, or a write failed part way.
    Failed(String),
    /// The bundle was never started.
    Skipped(String),
}

/// Result of linking or unlinking one bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleOutcome {
    /// Bundle name.
    pub bundle: String,
    /// Per-file outcomes, in source order.
    pub files: Vec<FileOutcome>,
    /// Overall status.
    pub status: BundleStatus,
}

impl BundleOutcome {
    fn new(bundle: &ResolvedBundle) -> Self {
        Self {
            bundle: bundle.name.clone(),
            files: Vec::new(),
            status: BundleStatus::Completed,
        }
    }

    fn with_status(bundle: &ResolvedBundle, status: BundleStatus) -> Self {
        Self {
            status,
            ..Self::new(bundle)
        }
    }

    fn push(&mut self, relative: &Path, action: FileAction) {
        tracing::debug!("{}: {} {action:?}", self.bundle, relative.display());
        self.files.push(FileOutcome {
            relative: relative.to_path_buf(),
            action,
        });
    }

    fn fail(&mut self, relative: &Path, error: &EngineError) {
        self.push(
            relative,
            FileAction::Failed {
                error: error.to_string(),
            },
        );
        self.status = BundleStatus::Failed(error.to_string());
    }

    /// Whether every planned change was applied.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, BundleStatus::Completed)
    }

    /// Number of files whose destination changed.
    #[must_use]
    pub fn changed(&self) -> usize {
        self.files
            .iter()
            .filter(|f| {
                matches!(
                    f.action,
                    FileAction::Linked | FileAction::BackedUp { .. } | FileAction::Unlinked
                )
            })
            .count()
    }

    /// The blocking error for an aborted bundle.
    #[must_use]
    pub fn conflict_error(&self) -> Option<EngineError> {
        match &self.status {
            BundleStatus::Aborted(conflicts) => Some(EngineError::ConflictUnresolved {
                bundle: self.bundle.clone(),
                conflicts: conflicts
                    .iter()
                    .map(|c| c.relative.display().to_string())
                    .collect(),
            }),
            _ => None,
        }
    }
}

/// Outcomes of a multi-bundle operation.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// One outcome per bundle, in input order.
    pub outcomes: Vec<BundleOutcome>,
}

impl BatchReport {
    /// Bundles completed.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, BundleStatus::Completed))
    }

    /// Bundles not started.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, BundleStatus::Skipped(_)))
    }

    /// Bundles aborted on conflicts or failed on errors.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, BundleStatus::Aborted(_) | BundleStatus::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&BundleStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

/// Creates and removes links for bundles.
#[derive(Clone)]
pub struct StowEngine {
    strategy: Arc<dyn ConflictStrategy>,
    jobs: usize,
    dry_run: bool,
    cancel: Arc<AtomicBool>,
}

impl std::fmt::Debug for StowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StowEngine")
            .field("interactive", &self.strategy.is_interactive())
            .field("jobs", &self.jobs)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl StowEngine {
    /// Engine resolving conflicts with `strategy`, running one bundle at a time.
    #[must_use]
    pub fn new(strategy: Arc<dyn ConflictStrategy>) -> Self {
        Self {
            strategy,
            jobs: 1,
            dry_run: false,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run batches on up to `jobs` workers.
    #[must_use]
    pub const fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Plan changes without applying them.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Share `cancel`: once set, batches start no further bundles.
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Link every file of `bundle`.
    ///
    /// Conflicts are put to the strategy before anything changes; if any is
    /// aborted the bundle is left exactly as it was.
    #[must_use]
    pub fn link(&self, bundle: &ResolvedBundle) -> BundleOutcome {
        let inspection = match inspect_bundle(bundle) {
            Ok(inspection) => inspection,
            Err(e) => return BundleOutcome::with_status(bundle, BundleStatus::Failed(e.to_string())),
        };

        let conflicts = find_conflicts(bundle, &inspection);
        let mut decisions = Vec::with_capacity(conflicts.len());
        for conflict in &conflicts {
            let decision = self.strategy.resolve(conflict);
            if decision == Decision::Abort {
                tracing::debug!(
                    "{}: aborted on {} ({})",
                    bundle.name,
                    conflict.relative.display(),
                    conflict.kind
                );
                return BundleOutcome::with_status(bundle, BundleStatus::Aborted(conflicts));
            }
            decisions.push((conflict.relative.clone(), decision));
        }

        let mut outcome = BundleOutcome::new(bundle);
        for (rel, state) in &inspection.files {
            let decision = decisions
                .iter()
                .find(|(r, _)| r == rel)
                .map(|&(_, d)| d);
            let result = match (state, decision) {
                (LinkState::CorrectLink, _) => Ok(FileAction::AlreadyLinked),
                (_, Some(Decision::Skip)) => Ok(FileAction::Skipped {
                    reason: "kept existing destination".to_string(),
                }),
                (_, Some(Decision::BackupAndOverwrite)) => self.replace(bundle, rel),
                _ => self.create(bundle, rel).map(|()| FileAction::Linked),
            };
            match result {
                Ok(action) => outcome.push(rel, action),
                Err(e) => {
                    tracing::warn!("{}: {e}", bundle.name);
                    outcome.fail(rel, &e);
                    break;
                }
            }
        }
        outcome
    }

    /// Remove every link of `bundle` that points at this bundle's sources.
    ///
    /// Wrong links and foreign files are reported and left alone.
    #[must_use]
    pub fn unlink(&self, bundle: &ResolvedBundle) -> BundleOutcome {
        self.remove_links(bundle, false)
    }

    /// Remove only the links whose source file has disappeared.
    #[must_use]
    pub fn prune(&self, bundle: &ResolvedBundle) -> BundleOutcome {
        self.remove_links(bundle, true)
    }

    fn remove_links(&self, bundle: &ResolvedBundle, orphans_only: bool) -> BundleOutcome {
        let inspection = match inspect_bundle(bundle) {
            Ok(inspection) => inspection,
            Err(e) => return BundleOutcome::with_status(bundle, BundleStatus::Failed(e.to_string())),
        };

        let mut outcome = BundleOutcome::new(bundle);
        let files = if orphans_only {
            &[][..]
        } else {
            inspection.files.as_slice()
        };
        let removals = files
            .iter()
            .map(|(rel, state)| (rel, Some(state)))
            .chain(inspection.orphans.iter().map(|rel| (rel, None)));
        for (rel, state) in removals {
            let action = match state {
                None => FileAction::Unlinked,
                Some(LinkState::Absent) => continue,
                Some(LinkState::CorrectLink) if reached_through_folded_parent(bundle, rel) => {
                    FileAction::LeftAlone {
                        reason: "inside a linked directory".to_string(),
                    }
                }
                Some(LinkState::CorrectLink) => FileAction::Unlinked,
                Some(LinkState::IncorrectLink { current }) => FileAction::LeftAlone {
                    reason: format!("links to {}", current.display()),
                },
                Some(LinkState::Foreign) => FileAction::LeftAlone {
                    reason: "not a link".to_string(),
                },
            };
            if action == FileAction::Unlinked && !self.dry_run {
                let resource = SymlinkResource::new(bundle.source_of(rel), bundle.target_of(rel));
                if let Err(e) = resource.unlink() {
                    tracing::warn!("{}: {e}", bundle.name);
                    outcome.fail(rel, &e);
                    break;
                }
            }
            outcome.push(rel, action);
        }
        outcome
    }

    /// Link several bundles; see [`StowEngine::link`].
    #[must_use]
    pub fn link_all(&self, bundles: &[ResolvedBundle], progress: &Progress) -> BatchReport {
        self.run_all(bundles, progress, "linking", Self::link)
    }

    /// Unlink several bundles; see [`StowEngine::unlink`].
    #[must_use]
    pub fn unlink_all(&self, bundles: &[ResolvedBundle], progress: &Progress) -> BatchReport {
        self.run_all(bundles, progress, "unlinking", Self::unlink)
    }

    /// Prune several bundles; see [`StowEngine::prune`].
    #[must_use]
    pub fn prune_all(&self, bundles: &[ResolvedBundle], progress: &Progress) -> BatchReport {
        self.run_all(bundles, progress, "pruning", Self::prune)
    }

    fn run_all(
        &self,
        bundles: &[ResolvedBundle],
        progress: &Progress,
        verb: &str,
        op: fn(&Self, &ResolvedBundle) -> BundleOutcome,
    ) -> BatchReport {
        let jobs = if self.strategy.is_interactive() {
            1
        } else {
            self.jobs
        };
        let outcomes = for_each_bundle(bundles, jobs, progress, verb, |bundle| {
            if self.cancel.load(Ordering::SeqCst) {
                return BundleOutcome::with_status(
                    bundle,
                    BundleStatus::Skipped("cancelled".to_string()),
                );
            }
            op(self, bundle)
        });
        BatchReport { outcomes }
    }

    /// Link a destination that does not exist yet.
    fn create(&self, bundle: &ResolvedBundle, rel: &Path) -> Result<(), EngineError> {
        if self.dry_run {
            return Ok(());
        }
        let source = bundle.source_of(rel);
        let source = dunce::canonicalize(&source).unwrap_or(source);
        let resource = SymlinkResource::new(source, bundle.target_of(rel));
        tracing::debug!("{}: {}", bundle.name, resource.description());
        resource.link()?;
        Ok(())
    }

    /// Move an occupied destination aside and link in its place.
    fn replace(&self, bundle: &ResolvedBundle, rel: &Path) -> Result<FileAction, EngineError> {
        let target = bundle.target_of(rel);
        if contains_bundle(bundle, rel, &target) {
            return Err(EngineError::invalid_path(
                target.display().to_string(),
                "refusing to move aside a directory that contains the bundle",
            ));
        }
        if self.dry_run {
            return Ok(FileAction::BackedUp {
                backup: backup_path(&target),
            });
        }
        let backup = SymlinkResource::new(bundle.source_of(rel), target).backup()?;
        self.create(bundle, rel)?;
        Ok(FileAction::BackedUp { backup })
    }
}

/// Whether `target` is the bundle's destination root, or a real directory
/// holding that root or the source of `rel`.
///
/// Symlinks are never containers here: moving one aside moves only the link.
fn contains_bundle(bundle: &ResolvedBundle, rel: &Path, target: &Path) -> bool {
    if rel.as_os_str().is_empty() {
        return true;
    }
    if target
        .symlink_metadata()
        .is_ok_and(|m| m.file_type().is_symlink())
    {
        return false;
    }
    let canonical = |p: &Path| dunce::canonicalize(p).unwrap_or_else(|_| p.to_path_buf());
    let target = canonical(target);
    canonical(&bundle.target_dir).starts_with(&target)
        || canonical(&bundle.source_of(rel)).starts_with(&target)
}

/// Whether the destination of `rel` is the source file itself, seen through a
/// parent directory that links into the source tree.
fn reached_through_folded_parent(bundle: &ResolvedBundle, rel: &Path) -> bool {
    let parent_of = |p: PathBuf| p.parent().and_then(|dir| dunce::canonicalize(dir).ok());
    match (
        parent_of(bundle.target_of(rel)),
        parent_of(bundle.source_of(rel)),
    ) {
        (Some(target_dir), Some(source_dir)) => target_dir == source_dir,
        _ => false,
    }
}

#[cfg(test)]
#[cfg(unix)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::reconcile::conflict::{AutoBackupAndOverwrite, FailClosed};
    use crate::reconcile::drift::detect;
    use std::os::unix::fs::symlink;

    struct Fixture {
        _dir: tempfile::TempDir,
        repo: PathBuf,
        home: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let repo = dir.path().join("repo");
            let home = dir.path().join("home");
            std::fs::create_dir_all(&repo).unwrap();
            std::fs::create_dir_all(&home).unwrap();
            Self {
                _dir: dir,
                repo,
                home,
            }
        }

        fn file(&self, bundle: &str, rel: &str) -> PathBuf {
            let path = self.repo.join(bundle).join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, rel).unwrap();
            path
        }

        fn bundle(&self, name: &str) -> ResolvedBundle {
            ResolvedBundle::new(name, self.repo.join(name), &self.home)
        }
    }

    fn engine(strategy: impl ConflictStrategy + 'static) -> StowEngine {
        StowEngine::new(Arc::new(strategy))
    }

    #[test]
    fn link_creates_absolute_links_and_clears_drift() {
        let fx = Fixture::new();
        let src = fx.file("vim", ".vimrc");
        let bundle = fx.bundle("vim");

        let outcome = engine(FailClosed).link(&bundle);
        assert!(outcome.is_success());
        assert_eq!(outcome.files[0].action, FileAction::Linked);
        let link = std::fs::read_link(fx.home.join(".vimrc")).unwrap();
        assert!(link.is_absolute());
        assert_eq!(link, dunce::canonicalize(&src).unwrap());
        assert!(!detect(&bundle).unwrap().has_drift());
    }

    #[test]
    fn link_is_idempotent() {
        let fx = Fixture::new();
        fx.file("nvim", ".config/nvim/init.lua");
        fx.file("nvim", ".config/nvim/lua/opts.lua");
        let bundle = fx.bundle("nvim");
        let engine = engine(FailClosed);

        let first = engine.link(&bundle);
        assert_eq!(first.changed(), 2);
        let drift_after_first = detect(&bundle).unwrap();

        let second = engine.link(&bundle);
        assert_eq!(second.changed(), 0);
        assert!(
            second
                .files
                .iter()
                .all(|f| f.action == FileAction::AlreadyLinked)
        );
        assert_eq!(detect(&bundle).unwrap(), drift_after_first);
    }

    #[test]
    fn fail_closed_makes_no_changes() {
        let fx = Fixture::new();
        fx.file("vim", ".vimrc");
        fx.file("vim", ".gvimrc");
        std::fs::write(fx.home.join(".vimrc"), "mine").unwrap();

        let outcome = engine(FailClosed).link(&fx.bundle("vim"));
        let BundleStatus::Aborted(conflicts) = &outcome.status else {
            panic!("expected abort, got {:?}", outcome.status);
        };
        assert_eq!(conflicts.len(), 1);
        assert!(outcome.files.is_empty());
        assert!(fx.home.join(".gvimrc").symlink_metadata().is_err());
        assert_eq!(
            std::fs::read_to_string(fx.home.join(".vimrc")).unwrap(),
            "mine"
        );
        assert!(matches!(
            outcome.conflict_error(),
            Some(EngineError::ConflictUnresolved { .. })
        ));
    }

    #[test]
    fn backup_strategy_moves_file_aside() {
        let fx = Fixture::new();
        fx.file("vim", ".vimrc");
        std::fs::write(fx.home.join(".vimrc"), "mine").unwrap();

        let outcome = engine(AutoBackupAndOverwrite).link(&fx.bundle("vim"));
        assert!(outcome.is_success());
        let FileAction::BackedUp { backup } = &outcome.files[0].action else {
            panic!("expected backup, got {:?}", outcome.files[0].action);
        };
        assert_eq!(backup, &fx.home.join(".vimrc.dotlink.bak"));
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "mine");
        assert!(
            fx.home
                .join(".vimrc")
                .symlink_metadata()
                .unwrap()
                .file_type()
                .is_symlink()
        );
    }

    #[test]
    fn single_file_bundle_backs_up_only_that_file() {
        let fx = Fixture::new();
        let src = fx.file("vim", ".vimrc");
        std::fs::write(fx.home.join(".vimrc"), "mine").unwrap();
        std::fs::write(fx.home.join("precious.txt"), "keep").unwrap();
        let bundle = ResolvedBundle::new("vim", &src, &fx.home);

        let outcome = engine(AutoBackupAndOverwrite).link(&bundle);

        assert!(outcome.is_success(), "{:?}", outcome.status);
        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.files[0].relative, PathBuf::from(".vimrc"));
        assert_eq!(
            std::fs::read_to_string(fx.home.join("precious.txt")).unwrap(),
            "keep"
        );
        assert_eq!(
            std::fs::read_to_string(fx.home.join(".vimrc.dotlink.bak")).unwrap(),
            "mine"
        );
        assert_eq!(
            std::fs::read_link(fx.home.join(".vimrc")).unwrap(),
            dunce::canonicalize(&src).unwrap()
        );
        assert!(!detect(&bundle).unwrap().has_drift());
    }

    #[test]
    fn single_file_bundle_links_and_unlinks() {
        let fx = Fixture::new();
        let src = fx.file("git", ".gitconfig");
        let bundle = ResolvedBundle::new("git", &src, &fx.home);
        let engine = engine(FailClosed);

        assert!(engine.link(&bundle).is_success());
        assert!(fx.home.join(".gitconfig").symlink_metadata().is_ok());

        let outcome = engine.unlink(&bundle);
        assert!(outcome.is_success());
        assert_eq!(outcome.files[0].action, FileAction::Unlinked);
        assert!(fx.home.join(".gitconfig").symlink_metadata().is_err());
        assert!(src.is_file());
    }

    #[test]
    fn backup_refuses_directory_holding_the_source() {
        let fx = Fixture::new();
        // The repository lives inside the destination `~/work/dots`.
        let source_dir = fx.home.join("work/dots/x");
        let src = source_dir.join("work/dots");
        std::fs::create_dir_all(src.parent().unwrap()).unwrap();
        std::fs::write(&src, "data").unwrap();
        let bundle = ResolvedBundle::new("loop", &source_dir, &fx.home);

        let outcome = engine(AutoBackupAndOverwrite).link(&bundle);

        assert!(matches!(outcome.status, BundleStatus::Failed(_)));
        assert!(src.is_file());
        assert!(fx.home.join("work/dots").is_dir());
        assert!(fx.home.join("work/dots.dotlink.bak").symlink_metadata().is_err());
    }

    #[test]
    fn skip_decision_links_the_rest() {
        struct SkipAll;
        impl ConflictStrategy for SkipAll {
            fn resolve(&self, _: &Conflict) -> Decision {
                Decision::Skip
            }
        }

        let fx = Fixture::new();
        fx.file("sh", ".bashrc");
        fx.file("sh", ".profile");
        std::fs::write(fx.home.join(".bashrc"), "mine").unwrap();

        let outcome = engine(SkipAll).link(&fx.bundle("sh"));
        assert!(outcome.is_success());
        assert!(matches!(outcome.files[0].action, FileAction::Skipped { .. }));
        assert_eq!(outcome.files[1].action, FileAction::Linked);
        assert_eq!(
            std::fs::read_to_string(fx.home.join(".bashrc")).unwrap(),
            "mine"
        );
    }

    #[test]
    fn dry_run_changes_nothing() {
        let fx = Fixture::new();
        fx.file("vim", ".vimrc");
        fx.file("vim", ".gvimrc");
        std::fs::write(fx.home.join(".vimrc"), "mine").unwrap();

        let outcome = engine(AutoBackupAndOverwrite)
            .with_dry_run(true)
            .link(&fx.bundle("vim"));
        assert_eq!(outcome.changed(), 2);
        assert!(fx.home.join(".gvimrc").symlink_metadata().is_err());
        assert!(fx.home.join(".vimrc.dotlink.bak").symlink_metadata().is_err());
    }

    #[test]
    fn unlink_removes_only_our_links() {
        let fx = Fixture::new();
        let ours = fx.file("sh", ".bashrc");
        fx.file("sh", ".profile");
        fx.file("sh", ".zshrc");
        symlink(&ours, fx.home.join(".bashrc")).unwrap();
        symlink("/elsewhere", fx.home.join(".profile")).unwrap();
        std::fs::write(fx.home.join(".zshrc"), "mine").unwrap();

        let outcome = engine(FailClosed).unlink(&fx.bundle("sh"));
        assert!(outcome.is_success());
        assert_eq!(outcome.changed(), 1);
        assert!(fx.home.join(".bashrc").symlink_metadata().is_err());
        assert!(fx.home.join(".profile").symlink_metadata().is_ok());
        assert!(fx.home.join(".zshrc").exists());
        assert!(ours.exists());
    }

    #[test]
    fn unlink_removes_orphan_links() {
        let fx = Fixture::new();
        fx.file("git", ".gitconfig");
        let gone = fx.file("git", ".gitignore_global");
        symlink(&gone, fx.home.join(".gitignore_global")).unwrap();
        std::fs::remove_file(&gone).unwrap();

        let outcome = engine(FailClosed).unlink(&fx.bundle("git"));
        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.files[0].action, FileAction::Unlinked);
        assert!(fx.home.join(".gitignore_global").symlink_metadata().is_err());
    }

    #[test]
    fn prune_keeps_live_links() {
        let fx = Fixture::new();
        let keep = fx.file("git", ".gitconfig");
        let gone = fx.file("git", ".gitignore_global");
        symlink(&keep, fx.home.join(".gitconfig")).unwrap();
        symlink(&gone, fx.home.join(".gitignore_global")).unwrap();
        std::fs::remove_file(&gone).unwrap();

        let outcome = engine(FailClosed).prune(&fx.bundle("git"));
        assert_eq!(outcome.changed(), 1);
        assert!(fx.home.join(".gitconfig").symlink_metadata().is_ok());
        assert!(fx.home.join(".gitignore_global").symlink_metadata().is_err());
    }

    #[test]
    fn unlink_leaves_sources_behind_folded_directory() {
        let fx = Fixture::new();
        let src = fx.file("nvim", ".config/nvim/init.lua");
        std::fs::create_dir_all(fx.home.join(".config")).unwrap();
        symlink(src.parent().unwrap(), fx.home.join(".config/nvim")).unwrap();

        let outcome = engine(FailClosed).unlink(&fx.bundle("nvim"));
        assert!(matches!(
            outcome.files[0].action,
            FileAction::LeftAlone { .. }
        ));
        assert!(src.exists());
    }

    #[test]
    fn unlink_removes_hard_links() {
        let fx = Fixture::new();
        let src = fx.file("vim", ".vimrc");
        std::fs::hard_link(&src, fx.home.join(".vimrc")).unwrap();

        let outcome = engine(FailClosed).unlink(&fx.bundle("vim"));
        assert_eq!(outcome.files[0].action, FileAction::Unlinked);
        assert!(fx.home.join(".vimrc").symlink_metadata().is_err());
        assert!(src.exists());
    }

    #[test]
    fn batch_counts_and_partial_failure() {
        let fx = Fixture::new();
        fx.file("a", ".a");
        fx.file("b", ".b");
        std::fs::write(fx.home.join(".b"), "mine").unwrap();
        let bundles = vec![
            fx.bundle("a"),
            fx.bundle("b"),
            fx.bundle("missing"),
        ];

        let report = engine(FailClosed)
            .with_jobs(3)
            .link_all(&bundles, &Progress::none());
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.skipped(), 0);
        assert!(fx.home.join(".a").symlink_metadata().is_ok());
    }

    #[test]
    fn cancelled_batch_starts_nothing() {
        let fx = Fixture::new();
        fx.file("a", ".a");
        let cancel = Arc::new(AtomicBool::new(true));
        let report = engine(FailClosed)
            .with_cancel_flag(Arc::clone(&cancel))
            .link_all(&[fx.bundle("a")], &Progress::none());
        assert_eq!(report.skipped(), 1);
        assert!(fx.home.join(".a").symlink_metadata().is_err());
    }
}
