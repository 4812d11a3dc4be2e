//! Term and clause indexing structures
//!
//! Three independent index families over a shared node-storage abstraction:
//!
//! - [`DiscriminationTree`]: terms flattened to preorder key sequences;
//!   fast generalization retrieval.
//! - [`PathTree`]: structure-preserving per-argument-position tree; fast
//!   instance retrieval.
//! - [`FeatureVectorIndex`]: clauses summarized as sparse feature vectors;
//!   fast subsumption candidate retrieval.
//!
//! All three share the same shape: an add/query algorithm walking a tree
//! whose structure mirrors the indexed data, over a pluggable
//! [`NodeStore`](crate::store::NodeStore). Every operation exists in a
//! synchronous form and an `_async` form with identical semantics; the
//! async forms accept a cancellation token checked at each store boundary.

pub mod disc_tree;
pub mod feature_vector;
pub mod path_tree;

#[cfg(test)]
mod proptest_tests;

pub use disc_tree::{DiscKey, DiscriminationTree};
pub use feature_vector::{
    FeatureExtractor, FeatureKey, FeatureVectorIndex, SymbolCountFeatures, SymbolFeature,
};
pub use path_tree::{PathKey, PathTree};

use crate::store::{NodeId, NodeStore};
use std::fmt;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Errors
// =============================================================================

/// Errors reported by index mutations and queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// The exact term/clause is already stored; the tree was left unmodified.
    Duplicate,
    /// A feature vector contained distinct features that compare equal, or
    /// the same feature twice. The insertion was rejected.
    MalformedFeatureVector(String),
    /// The operation observed its cancellation token and aborted without
    /// corrupting tree structure.
    Cancelled,
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexError::Duplicate => write!(f, "entry is already present in the index"),
            IndexError::MalformedFeatureVector(msg) => {
                write!(f, "malformed feature vector: {}", msg)
            }
            IndexError::Cancelled => write!(f, "index operation was cancelled"),
        }
    }
}

impl std::error::Error for IndexError {}

// =============================================================================
// Shared walk plumbing
// =============================================================================

/// Cancellation handle threaded through the shared algorithms. The
/// synchronous entry points pass `None`.
pub(crate) type Cancel<'a> = Option<&'a CancellationToken>;

/// Check the token at a suspension point.
pub(crate) fn check_cancelled(cancel: Cancel<'_>) -> Result<(), IndexError> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(IndexError::Cancelled),
        _ => Ok(()),
    }
}

/// Unwrap an operation result that cannot fail without a cancellation
/// token. Reaching the error arm is a programming error.
pub(crate) fn infallible<T>(result: Result<T, IndexError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => unreachable!("synchronous index operation failed: {err}"),
    }
}

/// Prune now-empty nodes along a walked path, deepest edge first.
///
/// `path` holds `(parent, key, child)` edges in descent order; a node that
/// still has children or values stops nothing else from being pruned, since
/// its own ancestors are by definition non-empty. Used both by removal and
/// by cancelled mutations unwinding the nodes they created, so it is never
/// itself cancellable.
pub(crate) async fn prune_path<S: NodeStore>(store: &mut S, path: &[(NodeId, S::Key, NodeId)]) {
    for (parent, key, child) in path.iter().rev() {
        if store.is_empty(*child).await {
            store.remove_child(*parent, key).await;
        }
    }
}

/// Walk/create nodes along `keys` and attach `value` under `entry` at the
/// final node. Duplicate entries are an error; cancellation unwinds any
/// nodes the walk created, so the tree is as if the add never started.
pub(crate) async fn add_along_keys<S: NodeStore>(
    store: &mut S,
    keys: &[S::Key],
    entry: &S::Entry,
    value: S::Value,
    cancel: Cancel<'_>,
) -> Result<(), IndexError> {
    let mut path = Vec::with_capacity(keys.len());
    let mut node = store.root();
    for key in keys {
        if let Err(err) = check_cancelled(cancel) {
            prune_path(store, &path).await;
            return Err(err);
        }
        let child = store.child_or_insert(node, key).await;
        path.push((node, key.clone(), child));
        node = child;
    }
    if let Err(err) = check_cancelled(cancel) {
        prune_path(store, &path).await;
        return Err(err);
    }
    if !store.insert_value(node, entry.clone(), value).await {
        // The full path pre-existed, so nothing needs unwinding.
        return Err(IndexError::Duplicate);
    }
    Ok(())
}

/// Follow `keys` through existing children only. Returns the final node,
/// or None as soon as an edge is missing.
pub(crate) async fn find_along_keys<S: NodeStore>(
    store: &S,
    keys: &[S::Key],
    cancel: Cancel<'_>,
) -> Result<Option<NodeId>, IndexError> {
    let mut node = store.root();
    for key in keys {
        check_cancelled(cancel)?;
        match store.child(node, key).await {
            Some(child) => node = child,
            None => return Ok(None),
        }
    }
    Ok(Some(node))
}

/// Walk `keys`, detach the value stored under `entry` at the final node,
/// and prune emptied nodes back toward the root. Returns the detached
/// value, or None ("not found") without modifying the tree.
pub(crate) async fn remove_along_keys<S: NodeStore>(
    store: &mut S,
    keys: &[S::Key],
    entry: &S::Entry,
    cancel: Cancel<'_>,
) -> Result<Option<S::Value>, IndexError> {
    let mut path = Vec::with_capacity(keys.len());
    let mut node = store.root();
    for key in keys {
        check_cancelled(cancel)?;
        match store.child(node, key).await {
            Some(child) => {
                path.push((node, key.clone(), child));
                node = child;
            }
            None => return Ok(None),
        }
    }
    check_cancelled(cancel)?;
    let Some(value) = store.remove_value(node, entry).await else {
        return Ok(None);
    };
    prune_path(store, &path).await;
    Ok(Some(value))
}
