//! Path tree indexing for terms
//!
//! Unlike the discrimination tree, the path tree mirrors term structure
//! directly: a function node owns one child per argument position, and each
//! argument child is itself a root for the subterms occurring at that
//! position across all stored terms. Values live on the nodes for 0-arity
//! symbols and variables, so one stored term attaches its value once per
//! terminal position.
//!
//! Sibling argument positions are explored independently during retrieval,
//! so the tree walk over-approximates: the final candidate set is the
//! intersection across positions, and every result is confirmed with the
//! exact one-way matching check before it is reported.

use crate::fol::interner::{ConstantId, FunctionId};
use crate::fol::Term;
use crate::index::{check_cancelled, infallible, prune_path, Cancel, IndexError};
use crate::store::{run_ready, HashStore, NodeId, NodeStore};
use indexmap::IndexMap;
use std::future::Future;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;
use tracing::trace;

// =============================================================================
// Path key
// =============================================================================

/// Key type for one edge in a path tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathKey {
    /// Function symbol with arity
    Func(FunctionId, u8),
    /// Constant symbol
    Const(ConstantId),
    /// Variable, renamed to its first-encounter ordinal
    Var(u32),
    /// Argument position under a function node
    Arg(u8),
}

// =============================================================================
// PathTree
// =============================================================================

/// Path tree index over terms, parameterized over node storage.
///
/// A stored term's value is attached at every terminal node its structure
/// reaches, keyed by the original (non-ordinalized) term; exact lookups and
/// removal walk the same structure deterministically.
#[derive(Debug)]
pub struct PathTree<S> {
    store: S,
}

impl<V: Clone> PathTree<HashStore<PathKey, Term, V>> {
    /// Create an empty tree over hash-map-backed in-memory storage.
    pub fn new() -> Self {
        PathTree {
            store: HashStore::new(),
        }
    }
}

impl<V: Clone> Default for PathTree<HashStore<PathKey, Term, V>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> PathTree<S>
where
    S: NodeStore<Key = PathKey, Entry = Term>,
{
    /// Create an empty tree over caller-supplied node storage.
    pub fn with_store(store: S) -> Self {
        PathTree { store }
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

    /// Remove the exact term. Returns false if it was not present.
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
    /// to stop early.
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
}

// =============================================================================
// Structural walk shared by add / lookup / removal
// =============================================================================

/// Walk the ordinalized term through existing nodes, collecting every edge
/// touched and every terminal node. Returns None as soon as a needed edge
/// is missing.
async fn locate<S>(
    store: &S,
    ordinalized: &Term,
    cancel: Cancel<'_>,
) -> Result<Option<(Vec<(NodeId, PathKey, NodeId)>, Vec<NodeId>)>, IndexError>
where
    S: NodeStore<Key = PathKey, Entry = Term>,
{
    let mut edges = Vec::new();
    let mut leaves = Vec::new();
    let mut stack = vec![(store.root(), ordinalized)];

    while let Some((node, sub)) = stack.pop() {
        check_cancelled(cancel)?;
        let key = match sub {
            Term::Variable(v) => PathKey::Var(v.id.as_u32()),
            Term::Constant(c) => PathKey::Const(c.id),
            Term::Function(f, _) => PathKey::Func(f.id, f.arity),
        };
        let Some(child) = store.child(node, &key).await else {
            return Ok(None);
        };
        edges.push((node, key, child));

        match sub {
            Term::Variable(_) | Term::Constant(_) => leaves.push(child),
            Term::Function(_, args) => {
                if args.is_empty() {
                    leaves.push(child);
                } else {
                    for (i, arg) in args.iter().enumerate().rev() {
                        check_cancelled(cancel)?;
                        let Some(pnode) = store.child(child, &PathKey::Arg(i as u8)).await else {
                            return Ok(None);
                        };
                        edges.push((child, PathKey::Arg(i as u8), pnode));
                        stack.push((pnode, arg));
                    }
                }
            }
        }
    }

    Ok(Some((edges, leaves)))
}

async fn add_entry<S>(
    store: &mut S,
    term: &Term,
    value: S::Value,
    cancel: Cancel<'_>,
) -> Result<(), IndexError>
where
    S: NodeStore<Key = PathKey, Entry = Term>,
{
    let ordinalized = term.ordinalize();
    let mut edges: Vec<(NodeId, PathKey, NodeId)> = Vec::new();
    let mut leaves = Vec::new();
    let mut stack = vec![(store.root(), &ordinalized)];

    while let Some((node, sub)) = stack.pop() {
        if let Err(err) = check_cancelled(cancel) {
            prune_path(store, &edges).await;
            return Err(err);
        }
        let key = match sub {
            Term::Variable(v) => PathKey::Var(v.id.as_u32()),
            Term::Constant(c) => PathKey::Const(c.id),
            Term::Function(f, _) => PathKey::Func(f.id, f.arity),
        };
        let child = store.child_or_insert(node, &key).await;
        edges.push((node, key, child));

        match sub {
            Term::Variable(_) | Term::Constant(_) => leaves.push(child),
            Term::Function(_, args) => {
                if args.is_empty() {
                    leaves.push(child);
                } else {
                    for (i, arg) in args.iter().enumerate().rev() {
                        let pnode = store.child_or_insert(child, &PathKey::Arg(i as u8)).await;
                        edges.push((child, PathKey::Arg(i as u8), pnode));
                        stack.push((pnode, arg));
                    }
                }
            }
        }
    }

    for (i, leaf) in leaves.iter().enumerate() {
        if let Err(err) = check_cancelled(cancel) {
            // Detach what was attached so far, then unwind created nodes
            for earlier in &leaves[..i] {
                store.remove_value(*earlier, term).await;
            }
            prune_path(store, &edges).await;
            return Err(err);
        }
        if !store.insert_value(*leaf, term.clone(), value.clone()).await {
            // Entry already present: the whole structure pre-existed and
            // leaves before `i` (all holding the entry) were left untouched.
            debug_assert_eq!(i, 0, "entry present at some leaves but not others");
            return Err(IndexError::Duplicate);
        }
    }

    trace!(leaves = leaves.len(), "path tree add");
    Ok(())
}

async fn get_entry<S>(
    store: &S,
    term: &Term,
    cancel: Cancel<'_>,
) -> Result<Option<S::Value>, IndexError>
where
    S: NodeStore<Key = PathKey, Entry = Term>,
{
    let ordinalized = term.ordinalize();
    match locate(store, &ordinalized, cancel).await? {
        // Every terminal holds the value; the first is as good as any
        Some((_, leaves)) => Ok(store.value(leaves[0], term).await),
        None => Ok(None),
    }
}

async fn remove_entry<S>(
    store: &mut S,
    term: &Term,
    cancel: Cancel<'_>,
) -> Result<bool, IndexError>
where
    S: NodeStore<Key = PathKey, Entry = Term>,
{
    let ordinalized = term.ordinalize();
    let Some((edges, leaves)) = locate(store, &ordinalized, cancel).await? else {
        return Ok(false);
    };
    check_cancelled(cancel)?;
    if store.remove_value(leaves[0], term).await.is_none() {
        return Ok(false);
    }
    for leaf in &leaves[1..] {
        let detached = store.remove_value(*leaf, term).await;
        debug_assert!(detached.is_some(), "entry present at some leaves but not others");
    }
    prune_path(store, &edges).await;
    trace!(leaves = leaves.len(), "path tree remove");
    Ok(true)
}

// =============================================================================
// Retrieval
// =============================================================================

type CandidateMap<V> = IndexMap<Term, V>;

/// Collect the values of every node in the subtree under `node`.
async fn values_under<S>(
    store: &S,
    node: NodeId,
    cancel: Cancel<'_>,
) -> Result<CandidateMap<S::Value>, IndexError>
where
    S: NodeStore<Key = PathKey, Entry = Term>,
{
    let mut out = IndexMap::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        check_cancelled(cancel)?;
        out.extend(store.values(current).await);
        for (_, child) in store.children(current).await {
            stack.push(child);
        }
    }
    Ok(out)
}

/// Intersect per-argument-position candidate maps.
fn intersect<V>(acc: Option<CandidateMap<V>>, next: CandidateMap<V>) -> CandidateMap<V> {
    match acc {
        None => next,
        Some(mut prev) => {
            prev.retain(|term, _| next.contains_key(term));
            prev
        }
    }
}

/// Candidate instances of `term` reachable below `node`: a variable
/// position admits every stored subterm, a concrete position only its own
/// symbol's child. Over-approximates across sibling positions.
fn collect_instances<'a, S>(
    store: &'a S,
    node: NodeId,
    term: &'a Term,
    cancel: Cancel<'a>,
) -> Pin<Box<dyn Future<Output = Result<CandidateMap<S::Value>, IndexError>> + 'a>>
where
    S: NodeStore<Key = PathKey, Entry = Term>,
{
    Box::pin(async move {
        check_cancelled(cancel)?;
        match term {
            Term::Variable(_) => values_under(store, node, cancel).await,
            Term::Constant(c) => match store.child(node, &PathKey::Const(c.id)).await {
                Some(child) => Ok(store.values(child).await.into_iter().collect()),
                None => Ok(IndexMap::new()),
            },
            Term::Function(f, args) => {
                let Some(fnode) = store.child(node, &PathKey::Func(f.id, f.arity)).await else {
                    return Ok(IndexMap::new());
                };
                if args.is_empty() {
                    return Ok(store.values(fnode).await.into_iter().collect());
                }
                let mut acc = None;
                for (i, arg) in args.iter().enumerate() {
                    let candidates = match store.child(fnode, &PathKey::Arg(i as u8)).await {
                        Some(pnode) => collect_instances(store, pnode, arg, cancel).await?,
                        None => IndexMap::new(),
                    };
                    let merged = intersect(acc, candidates);
                    if merged.is_empty() {
                        return Ok(merged);
                    }
                    acc = Some(merged);
                }
                Ok(acc.unwrap_or_default())
            }
        }
    })
}

/// Candidate generalizations of `term` reachable below `node`: a stored
/// variable child is always eligible, a concrete child only on an exact
/// symbol match. Over-approximates across sibling positions.
fn collect_generalizations<'a, S>(
    store: &'a S,
    node: NodeId,
    term: &'a Term,
    cancel: Cancel<'a>,
) -> Pin<Box<dyn Future<Output = Result<CandidateMap<S::Value>, IndexError>> + 'a>>
where
    S: NodeStore<Key = PathKey, Entry = Term>,
{
    Box::pin(async move {
        check_cancelled(cancel)?;
        let mut out = IndexMap::new();

        // Stored variables at this position generalize whatever the query
        // holds here
        for (key, child) in store.children(node).await {
            if matches!(key, PathKey::Var(_)) {
                out.extend(store.values(child).await);
            }
        }

        match term {
            Term::Variable(_) => {} // nothing concrete can generalize a variable
            Term::Constant(c) => {
                if let Some(child) = store.child(node, &PathKey::Const(c.id)).await {
                    out.extend(store.values(child).await);
                }
            }
            Term::Function(f, args) => {
                if let Some(fnode) = store.child(node, &PathKey::Func(f.id, f.arity)).await {
                    if args.is_empty() {
                        out.extend(store.values(fnode).await);
                    } else {
                        let mut acc = None;
                        for (i, arg) in args.iter().enumerate() {
                            let candidates = match store.child(fnode, &PathKey::Arg(i as u8)).await
                            {
                                Some(pnode) => {
                                    collect_generalizations(store, pnode, arg, cancel).await?
                                }
                                None => IndexMap::new(),
                            };
                            let merged = intersect(acc, candidates);
                            if merged.is_empty() {
                                acc = Some(merged);
                                break;
                            }
                            acc = Some(merged);
                        }
                        out.extend(acc.unwrap_or_default());
                    }
                }
            }
        }

        Ok(out)
    })
}

async fn walk_instances<S>(
    store: &S,
    query: &Term,
    cancel: Cancel<'_>,
    sink: &mut impl FnMut(&Term, &S::Value) -> bool,
) -> Result<(), IndexError>
where
    S: NodeStore<Key = PathKey, Entry = Term>,
{
    let candidates = collect_instances(store, store.root(), query, cancel).await?;
    for (term, value) in candidates {
        check_cancelled(cancel)?;
        // The walk over-approximates; confirm before reporting
        if term.is_instance_of(query) && sink(&term, &value) {
            return Ok(());
        }
    }
    Ok(())
}

async fn walk_generalizations<S>(
    store: &S,
    query: &Term,
    cancel: Cancel<'_>,
    sink: &mut impl FnMut(&Term, &S::Value) -> bool,
) -> Result<(), IndexError>
where
    S: NodeStore<Key = PathKey, Entry = Term>,
{
    let candidates = collect_generalizations(store, store.root(), query, cancel).await?;
    for (term, value) in candidates {
        check_cancelled(cancel)?;
        if term.generalizes(query) && sink(&term, &value) {
            return Ok(());
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
