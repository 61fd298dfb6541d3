//! Adoption: bring bundles that were linked by hand under management.
//!
//! Adoption only ever touches [`ManagedState`]; links are never created or
//! removed here.
use super::drift::{DriftResult, detect};
use super::progress::Progress;
use super::{BundleError, for_each_bundle};
use crate::config::ResolvedBundle;
use crate::state::ManagedState;

/// How much of a bundle is already linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdoptStatus {
    /// Every file is synced (and there is at least one).
    FullyLinked,
    /// Some, but not all, files are synced.
    PartiallyLinked,
    /// No file is synced.
    NotLinked,
}

impl std::fmt::Display for AdoptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FullyLinked => write!(f, "fully linked"),
            Self::PartiallyLinked => write!(f, "partially linked"),
            Self::NotLinked => write!(f, "not linked"),
        }
    }
}

/// Adoption scan result for one bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdoptResult {
    /// Bundle name.
    pub bundle: String,
    /// Aggregate link status.
    pub status: AdoptStatus,
    /// Files already synced.
    pub synced: usize,
    /// Files in the bundle's source tree.
    pub total: usize,
}

impl AdoptResult {
    /// Aggregate a drift result into an adoption status.
    #[must_use]
    pub fn from_drift(drift: &DriftResult) -> Self {
        let synced = drift.synced.len();
        let total = drift.file_count();
        let status = if total > 0 && synced == total {
            AdoptStatus::FullyLinked
        } else if synced > 0 {
            AdoptStatus::PartiallyLinked
        } else {
            AdoptStatus::NotLinked
        };
        Self {
            bundle: drift.bundle.clone(),
            status,
            synced,
            total,
        }
    }
}

/// Outcome of [`adopt`].
#[derive(Debug, Clone, Default)]
pub struct AdoptReport {
    /// Every scanned bundle.
    pub results: Vec<AdoptResult>,
    /// Bundles recorded (or, in a dry run, that would be recorded).
    pub adopted: Vec<String>,
    /// Bundles that could not be scanned.
    pub errors: Vec<BundleError>,
}

/// Scan every bundle for existing links, tolerating per-bundle failures.
#[must_use]
pub fn scan(
    bundles: &[ResolvedBundle],
    jobs: usize,
    progress: &Progress,
) -> (Vec<AdoptResult>, Vec<BundleError>) {
    let outcomes = for_each_bundle(bundles, jobs, progress, "scanning", detect);

    let mut results = Vec::new();
    let mut errors = Vec::new();
    for (bundle, outcome) in bundles.iter().zip(outcomes) {
        match outcome {
            Ok(drift) => results.push(AdoptResult::from_drift(&drift)),
            Err(e) => {
                tracing::warn!("skipping bundle '{}': {e}", bundle.name);
                errors.push(BundleError {
                    bundle: bundle.name.clone(),
                    message: e.to_string(),
                });
            }
        }
    }
    (results, errors)
}

/// Record already-linked bundles in `state`.
///
/// Fully linked bundles are always adopted; partially linked ones only with
/// `force`.  With `dry_run`, `state` is left unchanged and the report lists
/// what would have been adopted.
pub fn adopt(
    bundles: &[ResolvedBundle],
    state: &mut ManagedState,
    force: bool,
    dry_run: bool,
    jobs: usize,
    progress: &Progress,
) -> AdoptReport {
    let (results, errors) = scan(bundles, jobs, progress);

    let mut adopted = Vec::new();
    for result in &results {
        let eligible = match result.status {
            AdoptStatus::FullyLinked => true,
            AdoptStatus::PartiallyLinked => force,
            AdoptStatus::NotLinked => false,
        };
        if !eligible {
            tracing::debug!("not adopting {} ({})", result.bundle, result.status);
            continue;
        }
        let Some(bundle) = bundles.iter().find(|b| b.name == result.bundle) else {
            continue;
        };
        if !dry_run {
            state.add_config(&bundle.name, &bundle.source_dir, bundle.is_core);
            state.set_symlink_count(&bundle.name, result.total);
        }
        tracing::debug!(
            "adopted {} ({}/{} linked)",
            result.bundle,
            result.synced,
            result.total
        );
        adopted.push(result.bundle.clone());
    }

    AdoptReport {
        results,
        adopted,
        errors,
    }
}
