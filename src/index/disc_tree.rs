//! Discrimination tree indexing for terms
//!
//! Terms are flattened into preorder key sequences with variables renamed to
//! first-encounter ordinals; the tree indexes these sequences. The flattened
//! form is prefix-free (the arity carried by each function key always
//! recovers how many keys remain), so no terminator key is needed and a node
//! holding values sits exactly at the end of a complete stored term.
//!
//! Retrieval walks the query's key sequence: generalization retrieval binds
//! stored variable ordinals to query subsequences, instance retrieval binds
//! query variable ordinals to stored subsequences, and both enforce that a
//! repeated ordinal binds the same subsequence every time.

use crate::fol::interner::{ConstantId, FunctionId, VariableId};
use crate::fol::Term;
use crate::index::{
    add_along_keys, check_cancelled, find_along_keys, infallible, remove_along_keys, Cancel,
    IndexError,
};
use crate::store::{run_ready, HashStore, NodeId, NodeStore};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::trace;

// =============================================================================
// Flat key for preorder term representation
// =============================================================================

/// Key type for a single node in the flattened preorder traversal of a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiscKey {
    /// Function symbol with arity (the arity is the key's child count,
    /// needed to skip whole subterms during retrieval)
    Func(FunctionId, u8),
    /// Constant symbol
    Const(ConstantId),
    /// Variable, renamed to its first-encounter ordinal
    Var(u32),
}

impl DiscKey {
    /// Number of argument subterms following this key in a flattened
    /// sequence.
    pub fn child_count(&self) -> usize {
        match self {
            DiscKey::Func(_, arity) => *arity as usize,
            DiscKey::Const(_) | DiscKey::Var(_) => 0,
        }
    }
}

/// Flatten a term into its preorder key sequence, ordinalizing variables in
/// first-encounter order. Two terms differing only in variable names
/// flatten identically.
pub fn flatten(term: &Term) -> Vec<DiscKey> {
    let mut keys = Vec::new();
    let mut ordinals = HashMap::new();
    flatten_into(term, &mut keys, &mut ordinals);
    keys
}

fn flatten_into(term: &Term, keys: &mut Vec<DiscKey>, ordinals: &mut HashMap<VariableId, u32>) {
    match term {
        Term::Variable(v) => {
            let next = ordinals.len() as u32;
            let ordinal = *ordinals.entry(v.id).or_insert(next);
            keys.push(DiscKey::Var(ordinal));
        }
        Term::Constant(c) => keys.push(DiscKey::Const(c.id)),
        Term::Function(f, args) => {
            keys.push(DiscKey::Func(f.id, f.arity));
            for arg in args {
                flatten_into(arg, keys, ordinals);
            }
        }
    }
}

/// Count the number of flat keys the subterm starting at `pos` occupies.
pub fn subterm_size(keys: &[DiscKey], pos: usize) -> usize {
    let mut end = pos;
    let mut remaining = 1usize;
    while remaining > 0 {
        remaining = remaining - 1 + keys[end].child_count();
        end += 1;
    }
    end - pos
}

// =============================================================================
// DiscriminationTree
// =============================================================================

/// Discrimination tree index over terms, parameterized over node storage.
///
/// Values attach to the node at the end of each stored term's flattened key
/// sequence, in a map keyed by the original (non-ordinalized) term. Adding
/// the exact same term twice is an error; removal prunes emptied branches.
#[derive(Debug)]
pub struct DiscriminationTree<S> {
    store: S,
}

impl<V: Clone> DiscriminationTree<HashStore<DiscKey, Term, V>> {
    /// Create an empty tree over hash-map-backed in-memory storage.
    pub fn new() -> Self {
        DiscriminationTree {
            store: HashStore::new(),
        }
    }
}

impl<V: Clone> Default for DiscriminationTree<HashStore<DiscKey, Term, V>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> DiscriminationTree<S>
where
    S: NodeStore<Key = DiscKey, Entry = Term>,
{
    /// Create an empty tree over caller-supplied node storage.
    pub fn with_store(store: S) -> Self {
        DiscriminationTree { store }
    }

    /// Borrow the underlying node store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Store `value` for `term`. Fails with [`IndexError::Duplicate`] if
    /// the exact term is already present, leaving the tree unmodified.
    pub fn add(&mut self, term: &Term, value: S::Value) -> Result<(), IndexError> {
        run_ready(add_entry(&mut self.store, term, value, None))
    }

    /// Suspending form of [`add`](Self::add). Cancellation unwinds any
    /// intermediate nodes the walk created.
    pub async fn add_async(
        &mut self,
        term: &Term,
        value: S::Value,
        cancel: &CancellationToken,
    ) -> Result<(), IndexError> {
        add_entry(&mut self.store, term, value, Some(cancel)).await
    }

    /// Check whether the exact term is present.
    pub fn contains(&self, term: &Term) -> bool {
        self.get(term).is_some()
    }

    /// Suspending form of [`contains`](Self::contains).
    pub async fn contains_async(
        &self,
        term: &Term,
        cancel: &CancellationToken,
    ) -> Result<bool, IndexError> {
        Ok(self.get_async(term, cancel).await?.is_some())
    }

    /// Look up the value stored for the exact term.
    pub fn get(&self, term: &Term) -> Option<S::Value> {
        infallible(run_ready(get_entry(&self.store, term, None)))
    }

    /// Suspending form of [`get`](Self::get).
    pub async fn get_async(
        &self,
        term: &Term,
        cancel: &CancellationToken,
    ) -> Result<Option<S::Value>, IndexError> {
        get_entry(&self.store, term, Some(cancel)).await
    }

    /// Remove the exact term. Returns false if it was not present; pruning
    /// of emptied branches keeps node count bounded by live content.
    pub fn remove(&mut self, term: &Term) -> bool {
        infallible(run_ready(remove_entry(&mut self.store, term, None)))
    }

    /// Suspending form of [`remove`](Self::remove).
    pub async fn remove_async(
        &mut self,
        term: &Term,
        cancel: &CancellationToken,
    ) -> Result<bool, IndexError> {
        remove_entry(&mut self.store, term, Some(cancel)).await
    }

    /// Collect values of every stored term that generalizes `query`.
    pub fn get_generalizations(&self, query: &Term) -> Vec<S::Value> {
        let mut results = Vec::new();
        self.for_each_generalization(query, |_, value| {
            results.push(value.clone());
            false
        });
        results
    }

    /// Visit stored terms generalizing `query`; return true from the sink
    /// to stop early without walking the remaining branches.
    pub fn for_each_generalization(
        &self,
        query: &Term,
        mut sink: impl FnMut(&Term, &S::Value) -> bool,
    ) {
        infallible(run_ready(walk_generalizations(
            &self.store,
            query,
            None,
            &mut sink,
        )))
    }

    /// Suspending form of [`get_generalizations`](Self::get_generalizations).
    pub async fn get_generalizations_async(
        &self,
        query: &Term,
        cancel: &CancellationToken,
    ) -> Result<Vec<S::Value>, IndexError> {
        let mut results = Vec::new();
        walk_generalizations(&self.store, query, Some(cancel), &mut |_, value| {
            results.push(value.clone());
            false
        })
        .await?;
        Ok(results)
    }

    /// Collect values of every stored term that is an instance of `query`.
    pub fn get_instances(&self, query: &Term) -> Vec<S::Value> {
        let mut results = Vec::new();
        self.for_each_instance(query, |_, value| {
            results.push(value.clone());
            false
        });
        results
    }

    /// Visit stored terms that are instances of `query`; return true from
    /// the sink to stop early.
    pub fn for_each_instance(&self, query: &Term, mut sink: impl FnMut(&Term, &S::Value) -> bool) {
        infallible(run_ready(walk_instances(&self.store, query, None, &mut sink)))
    }

    /// Suspending form of [`get_instances`](Self::get_instances).
    pub async fn get_instances_async(
        &self,
        query: &Term,
        cancel: &CancellationToken,
    ) -> Result<Vec<S::Value>, IndexError> {
        let mut results = Vec::new();
        walk_instances(&self.store, query, Some(cancel), &mut |_, value| {
            results.push(value.clone());
            false
        })
        .await?;
        Ok(results)
    }
}

// =============================================================================
// Shared walk algorithms (sync and async run the same code)
// =============================================================================

async fn add_entry<S>(
    store: &mut S,
    term: &Term,
    value: S::Value,
    cancel: Cancel<'_>,
) -> Result<(), IndexError>
where
    S: NodeStore<Key = DiscKey, Entry = Term>,
{
    let keys = flatten(term);
    add_along_keys(store, &keys, term, value, cancel).await?;
    trace!(keys = keys.len(), "discrimination tree add");
    Ok(())
}

async fn get_entry<S>(
    store: &S,
    term: &Term,
    cancel: Cancel<'_>,
) -> Result<Option<S::Value>, IndexError>
where
    S: NodeStore<Key = DiscKey, Entry = Term>,
{
    let keys = flatten(term);
    match find_along_keys(store, &keys, cancel).await? {
        Some(node) => {
            check_cancelled(cancel)?;
            Ok(store.value(node, term).await)
        }
        None => Ok(None),
    }
}

async fn remove_entry<S>(
    store: &mut S,
    term: &Term,
    cancel: Cancel<'_>,
) -> Result<bool, IndexError>
where
    S: NodeStore<Key = DiscKey, Entry = Term>,
{
    let keys = flatten(term);
    let removed = remove_along_keys(store, &keys, term, cancel).await?;
    if removed.is_some() {
        trace!(keys = keys.len(), "discrimination tree remove");
    }
    Ok(removed.is_some())
}

/// Walk for stored terms MORE GENERAL than the query.
///
/// A stored variable ordinal binds the query subsequence it consumes; a
/// repeated ordinal must consume an identical subsequence (so `f(X, X)`
/// never generalizes `f(a, b)`). A query variable is matched only by stored
/// variables, never by concrete stored symbols.
async fn walk_generalizations<S>(
    store: &S,
    query: &Term,
    cancel: Cancel<'_>,
    sink: &mut impl FnMut(&Term, &S::Value) -> bool,
) -> Result<(), IndexError>
where
    S: NodeStore<Key = DiscKey, Entry = Term>,
{
    struct Frame {
        node: NodeId,
        pos: usize,
        /// (stored ordinal, query key range start, length)
        bindings: Vec<(u32, usize, usize)>,
    }

    let keys = flatten(query);
    let mut stack = vec![Frame {
        node: store.root(),
        pos: 0,
        bindings: Vec::new(),
    }];

    while let Some(frame) = stack.pop() {
        check_cancelled(cancel)?;

        if frame.pos == keys.len() {
            for (entry, value) in store.values(frame.node).await {
                if sink(&entry, &value) {
                    return Ok(());
                }
            }
            continue;
        }

        // Branch 1: exact match on a concrete query key
        match keys[frame.pos] {
            key @ (DiscKey::Func(..) | DiscKey::Const(_)) => {
                if let Some(child) = store.child(frame.node, &key).await {
                    stack.push(Frame {
                        node: child,
                        pos: frame.pos + 1,
                        bindings: frame.bindings.clone(),
                    });
                }
            }
            DiscKey::Var(_) => {} // only a stored variable can generalize a query variable
        }

        // Branch 2: stored variables bind the whole query subterm here
        let skip = subterm_size(&keys, frame.pos);
        for (key, child) in store.children(frame.node).await {
            let DiscKey::Var(ordinal) = key else { continue };
            match frame.bindings.iter().find(|(o, _, _)| *o == ordinal) {
                Some(&(_, start, len)) => {
                    if len == skip && keys[start..start + len] == keys[frame.pos..frame.pos + skip]
                    {
                        stack.push(Frame {
                            node: child,
                            pos: frame.pos + skip,
                            bindings: frame.bindings.clone(),
                        });
                    }
                }
                None => {
                    let mut bindings = frame.bindings.clone();
                    bindings.push((ordinal, frame.pos, skip));
                    stack.push(Frame {
                        node: child,
                        pos: frame.pos + skip,
                        bindings,
                    });
                }
            }
        }
    }

    Ok(())
}

/// Walk for stored terms that are INSTANCES of the query.
///
/// A query variable consumes one whole stored subterm, tracked by the count
/// of unexplored branches; the consumed key sequence is bound to the query
/// ordinal, and a repeated ordinal re-walks its bound sequence exactly, so
/// `f(X, X)` only retrieves stored terms with identical argument subtrees.
async fn walk_instances<S>(
    store: &S,
    query: &Term,
    cancel: Cancel<'_>,
    sink: &mut impl FnMut(&Term, &S::Value) -> bool,
) -> Result<(), IndexError>
where
    S: NodeStore<Key = DiscKey, Entry = Term>,
{
    struct Skip {
        ordinal: u32,
        /// Unexplored branch count: subterm is complete when it hits zero
        remaining: usize,
        consumed: Vec<DiscKey>,
    }

    struct Frame {
        node: NodeId,
        pos: usize,
        /// (query ordinal, consumed stored key sequence)
        bindings: Vec<(u32, Vec<DiscKey>)>,
        skip: Option<Skip>,
    }

    let keys = flatten(query);
    let mut stack = vec![Frame {
        node: store.root(),
        pos: 0,
        bindings: Vec::new(),
        skip: None,
    }];

    while let Some(frame) = stack.pop() {
        check_cancelled(cancel)?;

        if let Some(skip) = frame.skip {
            // Mid-skip: consume stored keys until the subterm closes
            for (key, child) in store.children(frame.node).await {
                let mut consumed = skip.consumed.clone();
                consumed.push(key);
                let remaining = skip.remaining - 1 + key.child_count();
                if remaining == 0 {
                    let mut bindings = frame.bindings.clone();
                    bindings.push((skip.ordinal, consumed));
                    stack.push(Frame {
                        node: child,
                        pos: frame.pos,
                        bindings,
                        skip: None,
                    });
                } else {
                    stack.push(Frame {
                        node: child,
                        pos: frame.pos,
                        bindings: frame.bindings.clone(),
                        skip: Some(Skip {
                            ordinal: skip.ordinal,
                            remaining,
                            consumed,
                        }),
                    });
                }
            }
            continue;
        }

        if frame.pos == keys.len() {
            for (entry, value) in store.values(frame.node).await {
                if sink(&entry, &value) {
                    return Ok(());
                }
            }
            continue;
        }

        match keys[frame.pos] {
            key @ (DiscKey::Func(..) | DiscKey::Const(_)) => {
                // A concrete query position admits only the identical stored key
                if let Some(child) = store.child(frame.node, &key).await {
                    stack.push(Frame {
                        node: child,
                        pos: frame.pos + 1,
                        bindings: frame.bindings,
                        skip: None,
                    });
                }
            }
            DiscKey::Var(ordinal) => {
                let bound = frame
                    .bindings
                    .iter()
                    .position(|(o, _)| *o == ordinal);
                match bound {
                    Some(idx) => {
                        // Re-occurrence: the bound stored sequence must repeat
                        let mut node = frame.node;
                        let mut matched = true;
                        for key in &frame.bindings[idx].1 {
                            check_cancelled(cancel)?;
                            match store.child(node, key).await {
                                Some(child) => node = child,
                                None => {
                                    matched = false;
                                    break;
                                }
                            }
                        }
                        if matched {
                            stack.push(Frame {
                                node,
                                pos: frame.pos + 1,
                                bindings: frame.bindings,
                                skip: None,
                            });
                        }
                    }
                    None => {
                        stack.push(Frame {
                            node: frame.node,
                            pos: frame.pos + 1,
                            bindings: frame.bindings,
                            skip: Some(Skip {
                                ordinal,
                                remaining: 1,
                                consumed: Vec::new(),
                            }),
                        });
                    }
                }
            }
        }
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
