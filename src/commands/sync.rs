//! `sync`: bring managed bundles back in line with the repository.
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Result;

use super::stow::link_and_record;
use super::{CommandSetup, finish, log_dry_run, progress_for, record_batch, record_errors};
use crate::cli::{GlobalOpts, SyncOpts};
use crate::config::ResolvedBundle;
use crate::logging::{EntryStatus, Logger};
use crate::reconcile::drift::detect_all;
use crate::reconcile::progress::Progress;
use crate::reconcile::stow::BatchReport;

/// Run the sync command.
///
/// # Errors
///
/// Returns an error if setup fails, the state cannot be saved, or any bundle
/// failed.
pub fn run(
    global: &GlobalOpts,
    opts: &SyncOpts,
    log: &Arc<Logger>,
    cancel: &Arc<AtomicBool>,
) -> Result<()> {
    let setup = CommandSetup::init(global, &**log, cancel)?;
    sync(&setup, opts, log)
}

/// Link new files and prune dangling links of the selected bundles.
///
/// With a bundle name only that bundle is synced (and becomes managed);
/// otherwise every managed bundle is.
///
/// # Errors
///
/// Returns an error if the named bundle is unknown, the state cannot be
/// loaded or saved, or any bundle failed.
pub fn sync(setup: &CommandSetup, opts: &SyncOpts, log: &Arc<Logger>) -> Result<()> {
    let mut state = setup.load_state(&**log)?;
    let candidates = match &opts.bundle {
        Some(name) => setup.select(std::slice::from_ref(name))?,
        None => setup.managed_bundles(&state),
    };
    if candidates.is_empty() {
        log.info("no managed bundles; use `dotlink stow add <bundle>` first");
        return finish(log);
    }

    log.stage("Detecting drift");
    let summary = detect_all(&candidates, Some(&state), setup.jobs, &Progress::none());
    record_errors(&summary.errors, &**log);
    if opts.bundle.is_none() {
        for name in &summary.removed {
            log.warn(&format!(
                "managed bundle '{name}' is no longer declared; its links were left in place"
            ));
        }
    }

    let mut to_link: Vec<ResolvedBundle> = Vec::new();
    let mut to_prune: Vec<ResolvedBundle> = Vec::new();
    let mut settled: Vec<(&ResolvedBundle, usize)> = Vec::new();
    for result in &summary.results {
        let Some(bundle) = candidates.iter().find(|b| b.name == result.bundle) else {
            continue;
        };
        if !result.has_drift() {
            log.debug(&format!("{}: in sync", result.bundle));
            log.record(&result.bundle, EntryStatus::Ok, Some("in sync"));
            settled.push((bundle, result.file_count()));
            continue;
        }
        log.info(&format!("{}: {}", result.bundle, result.summary()));
        let needs_link = !result.new_files.is_empty() || !result.conflicts.is_empty();
        if needs_link {
            to_link.push(bundle.clone());
        }
        if !result.missing_files.is_empty() {
            to_prune.push(bundle.clone());
            if !needs_link {
                settled.push((bundle, result.file_count()));
            }
        }
    }

    if !to_prune.is_empty() {
        log.stage("Removing dangling links");
        let engine = setup.engine(&opts.conflicts, opts.dry_run);
        let progress = progress_for(log);
        let report = engine.prune_all(&to_prune, &progress);
        progress.finish();
        log.clear_progress();
        if opts.dry_run {
            log_dry_run(&report, &**log);
        }
        let failed: Vec<&str> = report
            .outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.bundle.as_str())
            .collect();
        settled.retain(|(b, _)| !failed.contains(&b.name.as_str()));
        // Bundles relinked below are recorded by the link pass.
        let pruned_only = BatchReport {
            outcomes: report
                .outcomes
                .into_iter()
                .filter(|o| !o.is_success() || !to_link.iter().any(|b| b.name == o.bundle))
                .collect(),
        };
        record_batch(&pruned_only, &**log);
    }

    for (bundle, count) in settled {
        state.add_config(&bundle.name, &bundle.source_dir, bundle.is_core);
        state.set_symlink_count(&bundle.name, count);
    }

    if to_link.is_empty() {
        setup.save_state(&mut state, opts.dry_run, &**log)?;
    } else {
        log.stage("Linking bundles");
        link_and_record(
            setup,
            &to_link,
            &opts.conflicts,
            opts.dry_run,
            &mut state,
            log,
        )?;
    }
    finish(log)
}
