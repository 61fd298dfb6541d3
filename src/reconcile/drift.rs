//! Drift detection: compare a bundle's source tree against its destinations.
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::inspect::{LinkState, classify, resolve_link};
use super::progress::Progress;
use super::{BundleError, for_each_bundle};
use crate::config::ResolvedBundle;
use crate::error::EngineError;
use crate::state::ManagedState;

/// Per-file classification of a bundle's link topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkClassification {
    /// Destination is a correct link to the source.
    Synced,
    /// Source exists, destination does not.
    NewFile,
    /// Destination links to this bundle's source, but the source is gone.
    MissingFile,
    /// Destination exists and is not a correct link.
    Conflict,
}

/// Raw inspection of a bundle: every source file with its link state, plus
/// destination links whose source has disappeared.
#[derive(Debug, Clone, Default)]
pub struct BundleInspection {
    /// Bundle-relative source files and the state of their destinations.
    pub files: Vec<(PathBuf, LinkState)>,
    /// Bundle-relative paths of orphaned destination links.
    pub orphans: Vec<PathBuf>,
}

impl BundleInspection {
    /// Classification of every inspected path.
    pub fn classified(&self) -> impl Iterator<Item = (&Path, LinkClassification)> {
        self.files
            .iter()
            .map(|(rel, state)| (rel.as_path(), classification_of(state)))
            .chain(
                self.orphans
                    .iter()
                    .map(|rel| (rel.as_path(), LinkClassification::MissingFile)),
            )
    }
}

/// Map a link state onto its drift classification.
#[must_use]
pub const fn classification_of(state: &LinkState) -> LinkClassification {
    match state {
        LinkState::CorrectLink => LinkClassification::Synced,
        LinkState::Absent => LinkClassification::NewFile,
        LinkState::IncorrectLink { .. } | LinkState::Foreign => LinkClassification::Conflict,
    }
}

/// Drift of a single bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftResult {
    /// Bundle name.
    pub bundle: String,
    /// Files whose destination is correctly linked.
    pub synced: Vec<PathBuf>,
    /// Files with no destination yet.
    pub new_files: Vec<PathBuf>,
    /// Destination links whose source file is gone.
    pub missing_files: Vec<PathBuf>,
    /// Files whose destination is occupied by something else.
    pub conflicts: Vec<PathBuf>,
}

impl DriftResult {
    /// Build the result from an inspection.
    #[must_use]
    pub fn from_inspection(bundle: &str, inspection: &BundleInspection) -> Self {
        let mut result = Self {
            bundle: bundle.to_string(),
            ..Self::default()
        };
        for (rel, class) in inspection.classified() {
            let bucket = match class {
                LinkClassification::Synced => &mut result.synced,
                LinkClassification::NewFile => &mut result.new_files,
                LinkClassification::MissingFile => &mut result.missing_files,
                LinkClassification::Conflict => &mut result.conflicts,
            };
            bucket.push(rel.to_path_buf());
        }
        for bucket in [
            &mut result.synced,
            &mut result.new_files,
            &mut result.missing_files,
            &mut result.conflicts,
        ] {
            bucket.sort();
        }
        result
    }

    /// Whether anything needs attention.
    #[must_use]
    pub fn has_drift(&self) -> bool {
        !self.new_files.is_empty() || !self.missing_files.is_empty() || !self.conflicts.is_empty()
    }

    /// Number of classified paths across all categories.
    #[must_use]
    pub fn total(&self) -> usize {
        self.synced.len() + self.new_files.len() + self.missing_files.len() + self.conflicts.len()
    }

    /// Number of files present in the source tree.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.synced.len() + self.new_files.len() + self.conflicts.len()
    }

    /// One-line description, e.g. `"3 synced, 1 new, 0 missing, 0 conflicting"`.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} synced, {} new, {} missing, {} conflicting",
            self.synced.len(),
            self.new_files.len(),
            self.missing_files.len(),
            self.conflicts.len()
        )
    }
}

/// Drift across every declared bundle.
#[derive(Debug, Clone, Default)]
pub struct DriftSummary {
    /// Per-bundle results, in declaration order.
    pub results: Vec<DriftResult>,
    /// Bundles that could not be inspected.
    pub errors: Vec<BundleError>,
    /// Managed bundles no longer present in the declared set.
    pub removed: Vec<String>,
}

impl DriftSummary {
    /// Bundles with drift.
    pub fn drifted(&self) -> impl Iterator<Item = &DriftResult> {
        self.results.iter().filter(|r| r.has_drift())
    }

    /// Whether anything anywhere needs attention.
    #[must_use]
    pub fn has_drift(&self) -> bool {
        self.drifted().next().is_some() || !self.removed.is_empty() || !self.errors.is_empty()
    }
}

/// List the files of a bundle's source tree, relative to its root.
///
/// Directories are walked but not returned; `.git` directories are skipped.
///
/// # Errors
///
/// Returns [`EngineError::Io`] if the tree cannot be walked.
pub fn source_files(bundle: &ResolvedBundle) -> Result<Vec<PathBuf>, EngineError> {
    Ok(walk_source(bundle)?.0)
}

/// Walk the source tree, returning `(files, directories)`.
fn walk_source(bundle: &ResolvedBundle) -> Result<(Vec<PathBuf>, BTreeSet<PathBuf>), EngineError> {
    if bundle.is_single_file() {
        let name = bundle.source_dir.file_name().ok_or_else(|| {
            EngineError::invalid_path(
                bundle.source_dir.display().to_string(),
                "single-file source has no file name",
            )
        })?;
        return Ok((vec![PathBuf::from(name)], BTreeSet::new()));
    }

    let mut files = Vec::new();
    let mut dirs = BTreeSet::new();
    let walker = WalkDir::new(&bundle.source_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name() != ".git");
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map_or_else(|| bundle.source_dir.clone(), Path::to_path_buf);
            EngineError::io(path, e.into())
        })?;
        let rel = entry
            .path()
            .strip_prefix(&bundle.source_dir)
            .map_or_else(|_| entry.path().to_path_buf(), Path::to_path_buf);
        if entry.file_type().is_dir() {
            dirs.insert(rel);
        } else if !rel.as_os_str().is_empty() {
            files.push(rel);
        }
    }
    Ok((files, dirs))
}

/// Inspect every file of `bundle` without mutating anything.
///
/// # Errors
///
/// Returns [`EngineError::Io`] if the source tree cannot be walked or a
/// destination cannot be inspected.
pub fn inspect_bundle(bundle: &ResolvedBundle) -> Result<BundleInspection, EngineError> {
    let (rels, dirs) = walk_source(bundle)?;

    let mut files = Vec::with_capacity(rels.len());
    for rel in rels {
        let state = classify(&bundle.source_of(&rel), &bundle.target_of(&rel))?;
        files.push((rel, state));
    }

    let orphans = find_orphans(bundle, &dirs);
    Ok(BundleInspection { files, orphans })
}

/// Find destination links that point into the bundle's source tree at files
/// that no longer exist.
///
/// Only destination directories mirroring a source directory are listed, and
/// only one level deep each.
fn find_orphans(bundle: &ResolvedBundle, dirs: &BTreeSet<PathBuf>) -> Vec<PathBuf> {
    let roots: Vec<PathBuf> = dunce::canonicalize(&bundle.source_dir)
        .into_iter()
        .chain(std::iter::once(bundle.source_dir.clone()))
        .collect();

    let mut orphans = BTreeSet::new();
    for rel_dir in dirs {
        let Ok(entries) = std::fs::read_dir(bundle.target_of(rel_dir)) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let is_link = entry.file_type().is_ok_and(|t| t.is_symlink());
            if !is_link {
                continue;
            }
            let Ok(resolved) = resolve_link(&path) else {
                continue;
            };
            let Some(rel) = roots
                .iter()
                .find_map(|root| resolved.strip_prefix(root).ok())
            else {
                continue;
            };
            if rel.as_os_str().is_empty() {
                continue;
            }
            if bundle.source_of(rel).symlink_metadata().is_err() {
                orphans.insert(rel.to_path_buf());
            }
        }
    }
    orphans.into_iter().collect()
}

/// Detect drift for a single bundle.
///
/// # Errors
///
/// Returns [`EngineError::Io`] if the bundle cannot be inspected.
pub fn detect(bundle: &ResolvedBundle) -> Result<DriftResult, EngineError> {
    let inspection = inspect_bundle(bundle)?;
    Ok(DriftResult::from_inspection(&bundle.name, &inspection))
}

/// Detect drift for every bundle, tolerating per-bundle failures.
///
/// Bundles are inspected on a pool of at most `jobs` workers.  Names recorded
/// in `managed` but absent from `bundles` are reported as removed.
#[must_use]
pub fn detect_all(
    bundles: &[ResolvedBundle],
    managed: Option<&ManagedState>,
    jobs: usize,
    progress: &Progress,
) -> DriftSummary {
    let outcomes = for_each_bundle(bundles, jobs, progress, "scanning", detect);

    let mut summary = DriftSummary::default();
    for (bundle, outcome) in bundles.iter().zip(outcomes) {
        match outcome {
            Ok(result) => summary.results.push(result),
            Err(e) => {
                tracing::warn!("skipping bundle '{}': {e}", bundle.name);
                summary.errors.push(BundleError {
                    bundle: bundle.name.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    if let Some(state) = managed {
        summary.removed = state
            .config_names()
            .filter(|name| !bundles.iter().any(|b| b.name == *name))
            .map(str::to_string)
            .collect();
    }
    summary
}
