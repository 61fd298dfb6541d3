//! `stow add`, `stow remove`, and `stow refresh`.
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Result;

use super::{CommandSetup, finish, log_dry_run, progress_for, record_batch};
use crate::cli::{ConflictOpts, GlobalOpts, StowAction, StowAddOpts, StowRemoveOpts, StowRefreshOpts};
use crate::config::ResolvedBundle;
use crate::logging::Logger;
use crate::reconcile::stow::{BatchReport, BundleStatus};
use crate::state::ManagedState;

/// Dispatch a `stow` action.
///
/// # Errors
///
/// Returns an error if setup fails, the state cannot be saved, or any bundle
/// failed.
pub fn run(
    global: &GlobalOpts,
    action: &StowAction,
    log: &Arc<Logger>,
    cancel: &Arc<AtomicBool>,
) -> Result<()> {
    let setup = CommandSetup::init(global, &**log, cancel)?;
    match action {
        StowAction::Add(opts) => add(&setup, opts, log),
        StowAction::Remove(opts) => remove(&setup, opts, log),
        StowAction::Refresh(opts) => refresh(&setup, opts, log),
    }
}

/// Link the named bundles and start managing them.
///
/// # Errors
///
/// Returns an error if a bundle is unknown, the state cannot be loaded or
/// saved, or any bundle failed.
pub fn add(setup: &CommandSetup, opts: &StowAddOpts, log: &Arc<Logger>) -> Result<()> {
    let bundles = setup.select(&opts.bundles)?;
    let mut state = setup.load_state(&**log)?;
    log.stage("Linking bundles");
    link_and_record(setup, &bundles, &opts.conflicts, opts.dry_run, &mut state, log)?;
    finish(log)
}

/// Unlink the named bundles and stop managing them.
///
/// # Errors
///
/// Returns an error if a bundle is unknown, the state cannot be loaded or
/// saved, or any bundle failed.
pub fn remove(setup: &CommandSetup, opts: &StowRemoveOpts, log: &Arc<Logger>) -> Result<()> {
    let bundles = setup.select(&opts.bundles)?;
    let mut state = setup.load_state(&**log)?;

    log.stage("Unlinking bundles");
    let engine = setup.engine(&ConflictOpts::default(), opts.dry_run);
    let progress = progress_for(log);
    let report = engine.unlink_all(&bundles, &progress);
    progress.finish();
    log.clear_progress();

    if opts.dry_run {
        log_dry_run(&report, &**log);
    }
    for outcome in &report.outcomes {
        if outcome.status == BundleStatus::Completed {
            state.remove_config(&outcome.bundle);
        }
    }
    record_batch(&report, &**log);
    setup.save_state(&mut state, opts.dry_run, &**log)?;
    finish(log)
}

/// Relink every managed bundle that is still declared.
///
/// # Errors
///
/// Returns an error if the state cannot be loaded or saved, or any bundle
/// failed.
pub fn refresh(setup: &CommandSetup, opts: &StowRefreshOpts, log: &Arc<Logger>) -> Result<()> {
    let mut state = setup.load_state(&**log)?;
    for name in state.config_names() {
        if setup.bundle(name).is_none() {
            log.warn(&format!("managed bundle '{name}' is no longer declared"));
        }
    }
    let bundles = setup.managed_bundles(&state);
    if bundles.is_empty() {
        log.info("no managed bundles; use `dotlink stow add <bundle>` first");
        return finish(log);
    }

    log.stage("Refreshing bundles");
    link_and_record(setup, &bundles, &opts.conflicts, opts.dry_run, &mut state, log)?;
    finish(log)
}

/// Link `bundles`, record completed ones in `state`, and save it.
///
/// # Errors
///
/// Returns an error if the state cannot be saved.
pub(super) fn link_and_record(
    setup: &CommandSetup,
    bundles: &[ResolvedBundle],
    conflicts: &ConflictOpts,
    dry_run: bool,
    state: &mut ManagedState,
    log: &Arc<Logger>,
) -> Result<BatchReport> {
    let engine = setup.engine(conflicts, dry_run);
    let progress = progress_for(log);
    let report = engine.link_all(bundles, &progress);
    progress.finish();
    log.clear_progress();

    if dry_run {
        log_dry_run(&report, &**log);
    }
    for (bundle, outcome) in bundles.iter().zip(&report.outcomes) {
        if outcome.status == BundleStatus::Completed {
            state.add_config(&bundle.name, &bundle.source_dir, bundle.is_core);
            state.set_symlink_count(&bundle.name, outcome.files.len());
        }
    }
    record_batch(&report, &**log);
    setup.save_state(state, dry_run, &**log)?;
    Ok(report)
}
