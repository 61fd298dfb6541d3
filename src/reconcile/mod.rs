//! Symlink reconciliation engine.
//!
//! - [`inspect`]: classify one destination against its source
//! - [`drift`]: classify every file of a bundle; aggregate across bundles
//! - [`adopt`]: discover bundles that are already linked by hand
//! - [`conflict`]: list blocking destinations and decide what to do with them
//! - [`stow`]: create and remove links
//! - [`progress`]: non-blocking progress callbacks
//!
//! Inspection never mutates the filesystem; only [`stow`] does.
pub mod adopt;
pub mod conflict;
pub mod drift;
pub mod inspect;
pub mod progress;
pub mod stow;

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::config::ResolvedBundle;
use progress::Progress;

/// A bundle that could not be processed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleError {
    /// Bundle name.
    pub bundle: String,
    /// Human-readable failure.
    pub message: String,
}

/// Run `work` on every bundle using at most `jobs` workers, preserving
/// input order in the returned vector.
///
/// Progress is reported once per finished bundle.  With `jobs <= 1` the
/// bundles are processed sequentially on the calling thread.
pub(crate) fn for_each_bundle<R, F>(
    bundles: &[ResolvedBundle],
    jobs: usize,
    progress: &Progress,
    verb: &str,
    work: F,
) -> Vec<R>
where
    R: Send,
    F: Fn(&ResolvedBundle) -> R + Sync,
{
    let total = bundles.len();
    let done = AtomicUsize::new(0);
    let run = |bundle: &ResolvedBundle| {
        let result = work(bundle);
        let current = done.fetch_add(1, Ordering::SeqCst) + 1;
        progress.report(current, total, &format!("{verb} {}", bundle.name));
        result
    };

    if jobs <= 1 || total <= 1 {
        return bundles.iter().map(&run).collect();
    }

    match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
        Ok(pool) => pool.install(|| bundles.par_iter().map(&run).collect()),
        Err(e) => {
            tracing::debug!("worker pool unavailable, running sequentially: {e}");
            bundles.iter().map(&run).collect()
        }
    }
}

/// Default worker count: one per available CPU, capped at 8.
#[must_use]
pub fn default_jobs() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get().min(8))
}
