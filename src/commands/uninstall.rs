//! Uninstall command implementation.
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Result;

use super::{CommandSetup, finish, log_dry_run, progress_for, record_batch};
use crate::cli::{ConflictOpts, GlobalOpts, UninstallOpts};
use crate::config::ResolvedBundle;
use crate::logging::Logger;
use crate::reconcile::stow::BundleStatus;

/// Run the uninstall command.
///
/// # Errors
///
/// Returns an error if setup fails or any bundle could not be unlinked.
pub fn run(
    global: &GlobalOpts,
    opts: &UninstallOpts,
    log: &Arc<Logger>,
    cancel: &Arc<AtomicBool>,
) -> Result<()> {
    let setup = CommandSetup::init(global, &**log, cancel)?;
    uninstall(&setup, opts, log)
}

/// Unlink every managed bundle, then delete the state file.
///
/// Managed bundles that are no longer declared are unlinked from their
/// recorded source path.  The state file is only deleted when every bundle
/// was unlinked.
///
/// # Errors
///
/// Returns an error if the state cannot be loaded or deleted, or any bundle
/// could not be unlinked.
pub fn uninstall(setup: &CommandSetup, opts: &UninstallOpts, log: &Arc<Logger>) -> Result<()> {
    if !setup.store.exists() {
        log.info("nothing is managed; no state file found");
        return finish(log);
    }
    let mut state = setup.load_state(&**log)?;

    let bundles: Vec<ResolvedBundle> = state
        .configs
        .iter()
        .map(|record| {
            setup.bundle(&record.name).cloned().unwrap_or_else(|| {
                ResolvedBundle::new(&record.name, &record.path, &setup.home)
            })
        })
        .collect();

    log.stage("Removing links");
    let engine = setup.engine(&ConflictOpts::default(), opts.dry_run);
    let progress = progress_for(log);
    let report = engine.unlink_all(&bundles, &progress);
    progress.finish();
    log.clear_progress();

    if opts.dry_run {
        log_dry_run(&report, &**log);
    }
    record_batch(&report, &**log);

    if opts.dry_run {
        log.dry_run(&format!("would delete {}", setup.store.path().display()));
    } else if report.failed() == 0 && report.skipped() == 0 {
        setup.store.delete()?;
        log.info(&format!("removed {}", setup.store.path().display()));
    } else {
        for outcome in &report.outcomes {
            if outcome.status == BundleStatus::Completed {
                state.remove_config(&outcome.bundle);
            }
        }
        setup.store.save(&mut state)?;
        log.warn("state file kept because some bundles were not unlinked");
    }
    finish(log)
}
