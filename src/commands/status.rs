//! `status`: report drift without changing anything.
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Result;

use super::{CommandSetup, finish, progress_for, record_errors};
use crate::cli::{GlobalOpts, StatusOpts};
use crate::logging::{EntryStatus, Logger};
use crate::reconcile::drift::{detect_all, source_files};

/// Run the status command.
///
/// # Errors
///
/// Returns an error if setup fails, the state cannot be loaded, or any
/// bundle could not be inspected.
pub fn run(
    global: &GlobalOpts,
    opts: &StatusOpts,
    log: &Arc<Logger>,
    cancel: &Arc<AtomicBool>,
) -> Result<()> {
    let setup = CommandSetup::init(global, &**log, cancel)?;
    status(&setup, opts, log)
}

/// Report drift of every declared bundle.
///
/// # Errors
///
/// Returns an error if the state cannot be loaded or any bundle could not be
/// inspected.
pub fn status(setup: &CommandSetup, opts: &StatusOpts, log: &Arc<Logger>) -> Result<()> {
    let state = if setup.store.exists() {
        Some(setup.load_state(&**log)?)
    } else {
        None
    };

    if opts.quick {
        let Some(state) = &state else {
            log.info("no state file; nothing is managed yet");
            return finish(log);
        };
        log.stage("Checking file counts");
        for bundle in setup.managed_bundles(state) {
            match source_files(&bundle) {
                Ok(files) if state.is_likely_drifted(&bundle.name, files.len()) => {
                    log.record(&bundle.name, EntryStatus::Ok, Some("likely drifted"));
                }
                Ok(_) => log.record(&bundle.name, EntryStatus::Ok, Some("unchanged")),
                Err(e) => {
                    log.warn(&format!("{}: {e}", bundle.name));
                    log.record(&bundle.name, EntryStatus::Failed, Some(&e.to_string()));
                }
            }
        }
        return finish(log);
    }

    log.stage("Detecting drift");
    let progress = progress_for(log);
    let summary = detect_all(&setup.bundles, state.as_ref(), setup.jobs, &progress);
    progress.finish();
    log.clear_progress();

    for result in &summary.results {
        let managed = state.as_ref().is_some_and(|s| s.is_managed(&result.bundle));
        let label = if managed { "managed" } else { "unmanaged" };
        log.info(&format!("{} [{label}]: {}", result.bundle, result.summary()));
        for path in &result.conflicts {
            log.debug(&format!("  conflict: {}", path.display()));
        }
        for path in &result.missing_files {
            log.debug(&format!("  missing: {}", path.display()));
        }
        let message = if result.has_drift() { "drifted" } else { "in sync" };
        log.record(&result.bundle, EntryStatus::Ok, Some(message));
    }
    for name in &summary.removed {
        log.warn(&format!("managed bundle '{name}' is no longer declared"));
    }
    record_errors(&summary.errors, &**log);
    finish(log)
}
