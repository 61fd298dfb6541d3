//! Filesystem primitives used by the stow engine.
//!
//! Everything here mutates the filesystem; inspection lives in
//! [`crate::reconcile::inspect`].
pub mod symlink;

pub use symlink::SymlinkResource;

/// Result of applying a change to a single destination.
///
/// # Examples
///
/// ```
/// use dotlink::resources::ResourceChange;
///
/// let applied = ResourceChange::Applied;
/// let noop = ResourceChange::AlreadyCorrect;
///
/// assert_eq!(applied, ResourceChange::Applied);
/// assert_ne!(applied, noop);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceChange {
    /// The destination was created, removed, or moved aside.
    Applied,
    /// The destination was already in the desired state.
    AlreadyCorrect,
}
