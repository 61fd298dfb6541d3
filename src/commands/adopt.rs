//! `adopt`: record bundles that were linked by hand.
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Result;

use super::{CommandSetup, finish, progress_for, record_errors};
use crate::cli::{AdoptOpts, GlobalOpts};
use crate::logging::{EntryStatus, Logger};
use crate::reconcile::adopt::{AdoptStatus, adopt};

/// Run the adopt command.
///
/// # Errors
///
/// Returns an error if setup fails, the state cannot be saved, or any bundle
/// could not be scanned.
pub fn run(
    global: &GlobalOpts,
    opts: &AdoptOpts,
    log: &Arc<Logger>,
    cancel: &Arc<AtomicBool>,
) -> Result<()> {
    let setup = CommandSetup::init(global, &**log, cancel)?;
    run_with(&setup, opts, log)
}

/// Scan every declared bundle and adopt the linked ones.
///
/// # Errors
///
/// Returns an error if the state cannot be loaded or saved, or any bundle
/// could not be scanned.
pub fn run_with(setup: &CommandSetup, opts: &AdoptOpts, log: &Arc<Logger>) -> Result<()> {
    let mut state = setup.load_state(&**log)?;

    log.stage("Scanning for existing links");
    let progress = progress_for(log);
    let report = adopt(
        &setup.bundles,
        &mut state,
        opts.force,
        opts.dry_run,
        setup.jobs,
        &progress,
    );
    progress.finish();
    log.clear_progress();

    for result in &report.results {
        let detail = format!("{} ({}/{} linked)", result.status, result.synced, result.total);
        if report.adopted.contains(&result.bundle) {
            if opts.dry_run {
                log.dry_run(&format!("would adopt {}", result.bundle));
            }
            log.record(&result.bundle, EntryStatus::Ok, Some(&detail));
        } else {
            let reason = if result.status == AdoptStatus::PartiallyLinked {
                format!("{detail}, use --force")
            } else {
                detail
            };
            log.record(&result.bundle, EntryStatus::Skipped, Some(&reason));
        }
    }
    record_errors(&report.errors, &**log);

    if !report.adopted.is_empty() {
        setup.save_state(&mut state, opts.dry_run, &**log)?;
    }
    finish(log)
}
