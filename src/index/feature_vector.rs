//! Feature vector indexing for clause subsumption
//!
//! A clause maps, through a caller-supplied extractor, to a sparse vector
//! of (feature, magnitude) components sorted by the feature type's total
//! order; zero magnitudes are omitted. The vector gives a necessary
//! condition for subsumption: if C subsumes D then every feature magnitude
//! of C is ≤ D's, treating omitted features as zero. The index is a
//! set-trie over these sorted vectors, so subsumption candidates fall out
//! of magnitude-bounded walks, and every candidate is confirmed with the
//! real subsumption test before it is reported.
//!
//! Because omitted components are implicit, a clause may terminate at a
//! node that is also an ancestor of other clauses: nodes here hold values
//! and children simultaneously.

use crate::fol::interner::{FunctionId, PredicateId};
use crate::fol::{Clause, Term};
use crate::index::{
    add_along_keys, check_cancelled, find_along_keys, infallible, remove_along_keys, Cancel,
    IndexError,
};
use crate::store::{run_ready, NodeStore, SortedStore};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

// =============================================================================
// Feature keys and extraction
// =============================================================================

/// One component of a sparse feature vector: a feature and its non-zero
/// magnitude. Ordered by feature first, so a sorted vector is also a valid
/// sorted key path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureKey<F> {
    pub feature: F,
    pub magnitude: u32,
}

/// Maps clauses to sparse feature vectors.
///
/// The feature type's `Ord` is the caller-supplied total order over
/// features; it must compare equal only for genuinely equal features, or
/// tree shape silently degrades. Insertions validate this for the
/// components of each single vector and reject violations.
pub trait FeatureExtractor {
    type Feature: Clone + Eq + Ord + Hash + Debug;

    /// Extract (feature, magnitude) components for a clause. Order and
    /// zero-magnitude components are irrelevant; the index sorts and drops
    /// zeros.
    fn extract(&self, clause: &Clause) -> Vec<(Self::Feature, u32)>;
}

impl<F, X> FeatureExtractor for X
where
    X: Fn(&Clause) -> Vec<(F, u32)>,
    F: Clone + Eq + Ord + Hash + Debug,
{
    type Feature = F;

    fn extract(&self, clause: &Clause) -> Vec<(F, u32)> {
        self(clause)
    }
}

/// Feature emitted by [`SymbolCountFeatures`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolFeature {
    /// Total literal count; sorts first so it is the cheapest discriminator
    LiteralCount,
    /// Positive occurrences of a predicate
    Positive(PredicateId),
    /// Negative occurrences of a predicate
    Negative(PredicateId),
    /// Occurrences of a function symbol anywhere in the arguments
    Function(FunctionId),
}

/// Default extractor: literal count, per-polarity predicate occurrence
/// counts, and function symbol occurrence counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolCountFeatures;

impl FeatureExtractor for SymbolCountFeatures {
    type Feature = SymbolFeature;

    fn extract(&self, clause: &Clause) -> Vec<(SymbolFeature, u32)> {
        let mut counts: HashMap<SymbolFeature, u32> = HashMap::new();
        if !clause.literals.is_empty() {
            counts.insert(SymbolFeature::LiteralCount, clause.literals.len() as u32);
        }
        for lit in &clause.literals {
            let feature = if lit.polarity {
                SymbolFeature::Positive(lit.predicate.id)
            } else {
                SymbolFeature::Negative(lit.predicate.id)
            };
            *counts.entry(feature).or_insert(0) += 1;

            for term in &lit.args {
                term.for_each_subterm(&mut |sub| {
                    if let Term::Function(f, _) = sub {
                        *counts.entry(SymbolFeature::Function(f.id)).or_insert(0) += 1;
                    }
                });
            }
        }
        counts.into_iter().collect()
    }
}

/// Sort a raw extraction into a key path, dropping zero magnitudes.
/// With `validate`, reject vectors whose distinct features compare equal.
fn make_vector<X: FeatureExtractor>(
    extractor: &X,
    clause: &Clause,
    validate: bool,
) -> Result<Vec<FeatureKey<X::Feature>>, IndexError> {
    let mut components: Vec<(X::Feature, u32)> = extractor
        .extract(clause)
        .into_iter()
        .filter(|(_, magnitude)| *magnitude > 0)
        .collect();
    components.sort_by(|a, b| a.0.cmp(&b.0));

    if validate {
        for pair in components.windows(2) {
            if pair[0].0.cmp(&pair[1].0) == Ordering::Equal {
                let msg = if pair[0].0 == pair[1].0 {
                    format!("feature {:?} extracted more than once", pair[0].0)
                } else {
                    format!(
                        "ordering compares distinct features {:?} and {:?} as equal",
                        pair[0].0, pair[1].0
                    )
                };
                return Err(IndexError::MalformedFeatureVector(msg));
            }
        }
    }

    Ok(components
        .into_iter()
        .map(|(feature, magnitude)| FeatureKey { feature, magnitude })
        .collect())
}

// =============================================================================
// FeatureVectorIndex
// =============================================================================

/// Feature vector index over clauses, parameterized over the extractor and
/// node storage.
///
/// The governing relation is subsumption: [`get_subsuming`](Self::get_subsuming)
/// finds stored clauses that subsume a query, [`get_subsumed`](Self::get_subsumed)
/// the dual, and [`try_replace_subsumed`](Self::try_replace_subsumed)
/// maintains a subsumption-minimal clause set.
#[derive(Debug)]
pub struct FeatureVectorIndex<X: FeatureExtractor, S> {
    extractor: X,
    store: S,
}

impl<X, V> FeatureVectorIndex<X, SortedStore<FeatureKey<X::Feature>, Clause, V>>
where
    X: FeatureExtractor,
    V: Clone,
{
    /// Create an empty index over sorted in-memory storage, ordered by the
    /// feature type's `Ord`.
    pub fn new(extractor: X) -> Self {
        FeatureVectorIndex {
            extractor,
            store: SortedStore::new(),
        }
    }
}

impl<V: Clone> Default
    for FeatureVectorIndex<SymbolCountFeatures, SortedStore<FeatureKey<SymbolFeature>, Clause, V>>
{
    fn default() -> Self {
        Self::new(SymbolCountFeatures)
    }
}

impl<X, S> FeatureVectorIndex<X, S>
where
    X: FeatureExtractor,
    S: NodeStore<Key = FeatureKey<X::Feature>, Entry = Clause>,
{
    /// Create an empty index over caller-supplied node storage.
    pub fn with_store(extractor: X, store: S) -> Self {
        FeatureVectorIndex { extractor, store }
    }

    /// Borrow the underlying node store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Store `value` for `clause`. Fails with [`IndexError::Duplicate`] if
    /// the exact clause is already present, and with
    /// [`IndexError::MalformedFeatureVector`] if the extracted vector
    /// contains features that compare equal without being equal. The tree
    /// is left unmodified on every error.
    pub fn add(&mut self, clause: &Clause, value: S::Value) -> Result<(), IndexError> {
        run_ready(add_entry(&self.extractor, &mut self.store, clause, value, None))
    }

    /// Suspending form of [`add`](Self::add).
    pub async fn add_async(
        &mut self,
        clause: &Clause,
        value: S::Value,
        cancel: &CancellationToken,
    ) -> Result<(), IndexError> {
        add_entry(&self.extractor, &mut self.store, clause, value, Some(cancel)).await
    }

    /// Check whether the exact clause is present.
    pub fn contains(&self, clause: &Clause) -> bool {
        self.get(clause).is_some()
    }

    /// Look up the value stored for the exact clause.
    pub fn get(&self, clause: &Clause) -> Option<S::Value> {
        infallible(run_ready(get_entry(&self.extractor, &self.store, clause, None)))
    }

    /// Suspending form of [`get`](Self::get).
    pub async fn get_async(
        &self,
        clause: &Clause,
        cancel: &CancellationToken,
    ) -> Result<Option<S::Value>, IndexError> {
        get_entry(&self.extractor, &self.store, clause, Some(cancel)).await
    }

    /// Remove the exact clause. Returns false if it was not present.
    pub fn remove(&mut self, clause: &Clause) -> bool {
        infallible(run_ready(remove_entry(
            &self.extractor,
            &mut self.store,
            clause,
            None,
        )))
    }

    /// Suspending form of [`remove`](Self::remove).
    pub async fn remove_async(
        &mut self,
        clause: &Clause,
        cancel: &CancellationToken,
    ) -> Result<bool, IndexError> {
        remove_entry(&self.extractor, &mut self.store, clause, Some(cancel)).await
    }

    /// Collect values of every stored clause that subsumes `query`.
    pub fn get_subsuming(&self, query: &Clause) -> Vec<S::Value> {
        let mut results = Vec::new();
        self.for_each_subsuming(query, |_, value| {
            results.push(value.clone());
            false
        });
        results
    }

    /// Visit stored clauses subsuming `query` (each already confirmed by
    /// the real subsumption test); return true from the sink to stop early.
    pub fn for_each_subsuming(&self, query: &Clause, mut sink: impl FnMut(&Clause, &S::Value) -> bool) {
        let vector = infallible(make_vector(&self.extractor, query, false));
        infallible(run_ready(walk_subsuming(
            &self.store,
            &vector,
            query,
            None,
            &mut sink,
        )))
    }

    /// Suspending form of [`get_subsuming`](Self::get_subsuming).
    pub async fn get_subsuming_async(
        &self,
        query: &Clause,
        cancel: &CancellationToken,
    ) -> Result<Vec<S::Value>, IndexError> {
        let vector = make_vector(&self.extractor, query, false)?;
        let mut results = Vec::new();
        walk_subsuming(&self.store, &vector, query, Some(cancel), &mut |_, value| {
            results.push(value.clone());
            false
        })
        .await?;
        Ok(results)
    }

    /// Collect values of every stored clause that `query` subsumes.
    pub fn get_subsumed(&self, query: &Clause) -> Vec<S::Value> {
        let mut results = Vec::new();
        self.for_each_subsumed(query, |_, value| {
            results.push(value.clone());
            false
        });
        results
    }

    /// Visit stored clauses subsumed by `query`; return true from the sink
    /// to stop early.
    pub fn for_each_subsumed(&self, query: &Clause, mut sink: impl FnMut(&Clause, &S::Value) -> bool) {
        let vector = infallible(make_vector(&self.extractor, query, false));
        infallible(run_ready(walk_subsumed(
            &self.store,
            &vector,
            query,
            None,
            &mut sink,
        )))
    }

    /// Suspending form of [`get_subsumed`](Self::get_subsumed).
    pub async fn get_subsumed_async(
        &self,
        query: &Clause,
        cancel: &CancellationToken,
    ) -> Result<Vec<S::Value>, IndexError> {
        let vector = make_vector(&self.extractor, query, false)?;
        let mut results = Vec::new();
        walk_subsumed(&self.store, &vector, query, Some(cancel), &mut |_, value| {
            results.push(value.clone());
            false
        })
        .await?;
        Ok(results)
    }

    /// Keep the stored set subsumption-minimal: if any stored clause
    /// subsumes `clause`, change nothing and return `Ok(false)`; otherwise
    /// remove every stored clause that `clause` subsumes and insert it,
    /// returning `Ok(true)`.
    pub fn try_replace_subsumed(
        &mut self,
        clause: &Clause,
        value: S::Value,
    ) -> Result<bool, IndexError> {
        self.try_replace_subsumed_with(clause, value, |_, _| {})
    }

    /// [`try_replace_subsumed`](Self::try_replace_subsumed) with a callback
    /// invoked for each removed clause and its detached value.
    pub fn try_replace_subsumed_with(
        &mut self,
        clause: &Clause,
        value: S::Value,
        mut on_removed: impl FnMut(&Clause, S::Value),
    ) -> Result<bool, IndexError> {
        run_ready(replace_subsumed(
            &self.extractor,
            &mut self.store,
            clause,
            value,
            &mut on_removed,
            None,
        ))
    }

    /// Suspending form of [`try_replace_subsumed`](Self::try_replace_subsumed).
    ///
    /// Cancellation between the removal sweep and the final insert leaves
    /// the tree structurally valid: some subsumed clauses may already be
    /// gone (they were redundant regardless), and `clause` is not added.
    pub async fn try_replace_subsumed_async(
        &mut self,
        clause: &Clause,
        value: S::Value,
        cancel: &CancellationToken,
    ) -> Result<bool, IndexError> {
        replace_subsumed(
            &self.extractor,
            &mut self.store,
            clause,
            value,
            &mut |_, _| {},
            Some(cancel),
        )
        .await
    }
}

// =============================================================================
// Shared walk algorithms (sync and async run the same code)
// =============================================================================

async fn add_entry<X, S>(
    extractor: &X,
    store: &mut S,
    clause: &Clause,
    value: S::Value,
    cancel: Cancel<'_>,
) -> Result<(), IndexError>
where
    X: FeatureExtractor,
    S: NodeStore<Key = FeatureKey<X::Feature>, Entry = Clause>,
{
    let vector = make_vector(extractor, clause, true)?;
    add_along_keys(store, &vector, clause, value, cancel).await?;
    trace!(features = vector.len(), "feature vector index add");
    Ok(())
}

async fn get_entry<X, S>(
    extractor: &X,
    store: &S,
    clause: &Clause,
    cancel: Cancel<'_>,
) -> Result<Option<S::Value>, IndexError>
where
    X: FeatureExtractor,
    S: NodeStore<Key = FeatureKey<X::Feature>, Entry = Clause>,
{
    let vector = make_vector(extractor, clause, false)?;
    match find_along_keys(store, &vector, cancel).await? {
        Some(node) => {
            check_cancelled(cancel)?;
            Ok(store.value(node, clause).await)
        }
        None => Ok(None),
    }
}

async fn remove_entry<X, S>(
    extractor: &X,
    store: &mut S,
    clause: &Clause,
    cancel: Cancel<'_>,
) -> Result<bool, IndexError>
where
    X: FeatureExtractor,
    S: NodeStore<Key = FeatureKey<X::Feature>, Entry = Clause>,
{
    let vector = make_vector(extractor, clause, false)?;
    let removed = remove_along_keys(store, &vector, clause, cancel).await?;
    if removed.is_some() {
        trace!(features = vector.len(), "feature vector index remove");
    }
    Ok(removed.is_some())
}

/// Walk for stored clauses whose vectors are componentwise ≤ the query's.
///
/// Values are collected at every visited node: a clause ending there has
/// implicit zeros for everything unconsumed, which is always ≤. A child is
/// entered only when its feature occurs in the remaining query components
/// with at least its magnitude; query components skipped on the way
/// correspond to features the stored clause omits. Each candidate is
/// confirmed with the real subsumption test before reaching the sink.
async fn walk_subsuming<S, F>(
    store: &S,
    vector: &[FeatureKey<F>],
    query: &Clause,
    cancel: Cancel<'_>,
    sink: &mut impl FnMut(&Clause, &S::Value) -> bool,
) -> Result<(), IndexError>
where
    F: Clone + Eq + Ord + Hash + Debug,
    S: NodeStore<Key = FeatureKey<F>, Entry = Clause>,
{
    let mut stack = vec![(store.root(), 0usize)];
    while let Some((node, qpos)) = stack.pop() {
        check_cancelled(cancel)?;

        for (entry, value) in store.values(node).await {
            if entry.subsumes(query) && sink(&entry, &value) {
                return Ok(());
            }
        }

        for (key, child) in store.children(node).await {
            let mut j = qpos;
            while j < vector.len() {
                match key.feature.cmp(&vector[j].feature) {
                    // Query feature the stored clause omits: implicit 0 ≤ anything
                    Ordering::Greater => j += 1,
                    Ordering::Equal => {
                        if key.magnitude <= vector[j].magnitude {
                            stack.push((child, j + 1));
                        }
                        break;
                    }
                    // Stored feature absent from the query: its magnitude
                    // would need to be ≤ 0, and zero magnitudes are omitted
                    Ordering::Less => break,
                }
            }
        }
    }
    Ok(())
}

/// Walk for stored clauses whose vectors are componentwise ≥ the query's.
///
/// Once the query vector is exhausted, every clause in the subtree
/// qualifies (query's remaining implicit zeros are ≤ anything stored). A
/// stored feature smaller than the next query feature is an extra the
/// query omits; one larger means the stored clause skipped a required
/// query feature and the branch dies. Each candidate is confirmed with the
/// real subsumption test before reaching the sink.
async fn walk_subsumed<S, F>(
    store: &S,
    vector: &[FeatureKey<F>],
    query: &Clause,
    cancel: Cancel<'_>,
    sink: &mut impl FnMut(&Clause, &S::Value) -> bool,
) -> Result<(), IndexError>
where
    F: Clone + Eq + Ord + Hash + Debug,
    S: NodeStore<Key = FeatureKey<F>, Entry = Clause>,
{
    let mut stack = vec![(store.root(), 0usize)];
    while let Some((node, qpos)) = stack.pop() {
        check_cancelled(cancel)?;

        if qpos == vector.len() {
            let mut subtree = vec![node];
            while let Some(current) = subtree.pop() {
                check_cancelled(cancel)?;
                for (entry, value) in store.values(current).await {
                    if query.subsumes(&entry) && sink(&entry, &value) {
                        return Ok(());
                    }
                }
                for (_, child) in store.children(current).await {
                    subtree.push(child);
                }
            }
            continue;
        }

        // Values at this node are clauses that ended before the remaining
        // query components: implicit 0 < required magnitude, so skip them.
        for (key, child) in store.children(node).await {
            match key.feature.cmp(&vector[qpos].feature) {
                Ordering::Less => stack.push((child, qpos)),
                Ordering::Equal => {
                    if key.magnitude >= vector[qpos].magnitude {
                        stack.push((child, qpos + 1));
                    }
                }
                Ordering::Greater => {}
            }
        }
    }
    Ok(())
}

async fn replace_subsumed<X, S>(
    extractor: &X,
    store: &mut S,
    clause: &Clause,
    value: S::Value,
    on_removed: &mut impl FnMut(&Clause, S::Value),
    cancel: Cancel<'_>,
) -> Result<bool, IndexError>
where
    X: FeatureExtractor,
    S: NodeStore<Key = FeatureKey<X::Feature>, Entry = Clause>,
{
    let vector = make_vector(extractor, clause, true)?;

    // Anything already stored that subsumes the incoming clause makes it
    // redundant; first hit wins and nothing changes.
    let mut blocked = false;
    walk_subsuming(store, &vector, clause, cancel, &mut |_, _| {
        blocked = true;
        true
    })
    .await?;
    if blocked {
        debug!("replacement blocked by an existing subsumer");
        return Ok(false);
    }

    // The incoming clause makes every clause it subsumes redundant.
    let mut victims: Vec<Clause> = Vec::new();
    walk_subsumed(store, &vector, clause, cancel, &mut |entry, _| {
        victims.push(entry.clone());
        false
    })
    .await?;

    for victim in &victims {
        check_cancelled(cancel)?;
        let victim_vector = make_vector(extractor, victim, false)?;
        // The removal itself runs to completion so the tree stays coherent
        if let Some(removed) = remove_along_keys(store, &victim_vector, victim, None).await? {
            debug!(victim = %victim, "removed subsumed clause");
            on_removed(victim, removed);
        }
    }

    add_along_keys(store, &vector, clause, value, cancel).await?;
    trace!(
        features = vector.len(),
        removed = victims.len(),
        "replaced subsumed clauses"
    );
    Ok(true)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fol::{Constant, Interner, Literal, PredicateSymbol, Variable};

    struct TestCtx {
        interner: Interner,
    }

    impl TestCtx {
        fn new() -> Self {
            TestCtx {
                interner: Interner::new(),
            }
        }

        fn var(&mut self, name: &str) -> Term {
            let id = self.interner.intern_variable(name);
            Term::Variable(Variable::new(id))
        }

        fn const_(&mut self, name: &str) -> Term {
            let id = self.interner.intern_constant(name);
            Term::Constant(Constant::new(id))
        }

        fn pred(&mut self, name: &str, arity: u8) -> PredicateSymbol {
            PredicateSymbol::new(self.interner.intern_predicate(name), arity)
        }
    }

    /// P(x) ∨ Q(x) and P(a) ∨ Q(a) ∨ R(a)
    fn sample_clauses(ctx: &mut TestCtx) -> (Clause, Clause) {
        let p = ctx.pred("P", 1);
        let q = ctx.pred("Q", 1);
        let r = ctx.pred("R", 1);
        let x = ctx.var("X");
        let a = ctx.const_("a");

        let general = Clause::new(vec![
            Literal::positive(p, vec![x.clone()]),
            Literal::positive(q, vec![x]),
        ]);
        let ground = Clause::new(vec![
            Literal::positive(p, vec![a.clone()]),
            Literal::positive(q, vec![a.clone()]),
            Literal::positive(r, vec![a]),
        ]);
        (general, ground)
    }

    #[test]
    fn test_round_trip() {
        let mut ctx = TestCtx::new();
        let (general, _) = sample_clauses(&mut ctx);

        let mut index = FeatureVectorIndex::new(SymbolCountFeatures);
        index.add(&general, 1).unwrap();
        assert!(index.contains(&general));
        assert_eq!(index.get(&general), Some(1));
        assert!(index.remove(&general));
        assert!(!index.contains(&general));
        assert!(!index.remove(&general));
        assert_eq!(index.store().node_count(), 1);
    }

    #[test]
    fn test_duplicate_add_is_error() {
        let mut ctx = TestCtx::new();
        let (general, _) = sample_clauses(&mut ctx);

        let mut index = FeatureVectorIndex::new(SymbolCountFeatures);
        index.add(&general, 1).unwrap();
        let nodes = index.store().node_count();
        assert_eq!(index.add(&general, 2), Err(IndexError::Duplicate));
        assert_eq!(index.store().node_count(), nodes);
        assert_eq!(index.get(&general), Some(1));
    }

    #[test]
    fn test_get_subsuming_finds_more_general_clause() {
        let mut ctx = TestCtx::new();
        let (general, ground) = sample_clauses(&mut ctx);

        let mut index = FeatureVectorIndex::new(SymbolCountFeatures);
        index.add(&general, "general").unwrap();

        assert_eq!(index.get_subsuming(&ground), vec!["general"]);
        // And not the other way around
        assert!(index.get_subsumed(&ground).is_empty());
    }

    #[test]
    fn test_get_subsumed_finds_more_specific_clause() {
        let mut ctx = TestCtx::new();
        let (general, ground) = sample_clauses(&mut ctx);

        let mut index = FeatureVectorIndex::new(SymbolCountFeatures);
        index.add(&ground, "ground").unwrap();

        assert_eq!(index.get_subsumed(&general), vec!["ground"]);
        assert!(index.get_subsuming(&general).is_empty());
    }

    #[test]
    fn test_feature_filter_needs_confirmation() {
        // P(a) and P(b) have identical feature vectors; only confirmation
        // keeps P(b) out of the results for a P(a) query.
        let mut ctx = TestCtx::new();
        let p = ctx.pred("P", 1);
        let a = ctx.const_("a");
        let b = ctx.const_("b");
        let pa = Clause::unit(Literal::positive(p, vec![a]));
        let pb = Clause::unit(Literal::positive(p, vec![b]));

        let mut index = FeatureVectorIndex::new(SymbolCountFeatures);
        index.add(&pb, "pb").unwrap();
        assert!(index.get_subsuming(&pa).is_empty());
        assert!(index.get_subsumed(&pa).is_empty());
    }

    #[test]
    fn test_try_replace_subsumed_replaces_ground_clause() {
        let mut ctx = TestCtx::new();
        let (general, ground) = sample_clauses(&mut ctx);

        let mut index = FeatureVectorIndex::new(SymbolCountFeatures);
        index.add(&ground, 1).unwrap();

        // The general clause subsumes the stored ground clause: it replaces it
        let mut removed = Vec::new();
        let inserted = index
            .try_replace_subsumed_with(&general, 2, |clause, value| {
                removed.push((clause.clone(), value));
            })
            .unwrap();
        assert!(inserted);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].0, ground);
        assert_eq!(removed[0].1, 1);
        assert!(!index.contains(&ground));
        assert!(index.contains(&general));

        // Re-adding anything the stored set subsumes fails and changes nothing
        let blocked = index.try_replace_subsumed(&ground, 3).unwrap();
        assert!(!blocked);
        assert!(!index.contains(&ground));
        assert_eq!(index.get(&general), Some(2));
    }

    #[test]
    fn test_subsumption_minimality_is_maintained() {
        let mut ctx = TestCtx::new();
        let p = ctx.pred("P", 1);
        let q = ctx.pred("Q", 1);
        let x = ctx.var("X");
        let a = ctx.const_("a");
        let b = ctx.const_("b");

        let clauses = vec![
            Clause::new(vec![
                Literal::positive(p, vec![a.clone()]),
                Literal::positive(q, vec![a.clone()]),
            ]),
            Clause::new(vec![
                Literal::positive(p, vec![b.clone()]),
                Literal::positive(q, vec![b]),
            ]),
            Clause::new(vec![
                Literal::positive(p, vec![x.clone()]),
                Literal::positive(q, vec![x.clone()]),
            ]),
            Clause::unit(Literal::positive(p, vec![x.clone()])),
            Clause::unit(Literal::positive(q, vec![a])),
        ];

        let mut index = FeatureVectorIndex::new(SymbolCountFeatures);
        for (i, clause) in clauses.iter().enumerate() {
            index.try_replace_subsumed(clause, i).unwrap();
        }

        // Enumerate survivors: the empty clause subsumes everything
        let everything = Clause::new(vec![]);
        let mut survivors = Vec::new();
        index.for_each_subsumed(&everything, |clause, _| {
            survivors.push(clause.clone());
            false
        });

        for c1 in &survivors {
            for c2 in &survivors {
                if c1 != c2 {
                    assert!(!c1.subsumes(c2), "{c1} subsumes {c2}");
                }
            }
        }
        // P(X) killed both P∨Q ground clauses and their generalization;
        // Q(a) is incomparable with P(X)
        assert_eq!(survivors.len(), 2);
    }

    #[test]
    fn test_malformed_feature_order_is_rejected() {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        struct Collapsed(u32);

        impl PartialOrd for Collapsed {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        // Distinct features compare equal: the invariant the caller owes us
        impl Ord for Collapsed {
            fn cmp(&self, _other: &Self) -> Ordering {
                Ordering::Equal
            }
        }

        let extractor = |_: &Clause| vec![(Collapsed(0), 1), (Collapsed(1), 2)];
        let mut index: FeatureVectorIndex<_, SortedStore<_, Clause, i32>> =
            FeatureVectorIndex::new(extractor);

        let clause = Clause::new(vec![]);
        match index.add(&clause, 1) {
            Err(IndexError::MalformedFeatureVector(msg)) => {
                assert!(msg.contains("distinct features"));
            }
            other => panic!("expected malformed-vector error, got {other:?}"),
        }
        assert_eq!(index.store().node_count(), 1);
    }

    #[test]
    fn test_duplicate_feature_is_rejected() {
        let extractor = |_: &Clause| vec![(7u32, 1), (7u32, 2)];
        let mut index: FeatureVectorIndex<_, SortedStore<_, Clause, i32>> =
            FeatureVectorIndex::new(extractor);

        match index.add(&Clause::new(vec![]), 1) {
            Err(IndexError::MalformedFeatureVector(msg)) => {
                assert!(msg.contains("more than once"));
            }
            other => panic!("expected malformed-vector error, got {other:?}"),
        }
    }

    #[test]
    fn test_clauses_sharing_a_vector_share_a_node() {
        let mut ctx = TestCtx::new();
        let p = ctx.pred("P", 1);
        let a = ctx.const_("a");
        let b = ctx.const_("b");
        let pa = Clause::unit(Literal::positive(p, vec![a]));
        let pb = Clause::unit(Literal::positive(p, vec![b]));

        let mut index = FeatureVectorIndex::new(SymbolCountFeatures);
        index.add(&pa, 1).unwrap();
        let nodes = index.store().node_count();
        index.add(&pb, 2).unwrap();
        assert_eq!(index.store().node_count(), nodes);
        assert_eq!(index.get(&pa), Some(1));
        assert_eq!(index.get(&pb), Some(2));
    }

    #[tokio::test]
    async fn test_async_forms_match_sync_semantics() {
        let mut ctx = TestCtx::new();
        let (general, ground) = sample_clauses(&mut ctx);

        let cancel = CancellationToken::new();
        let mut index = FeatureVectorIndex::new(SymbolCountFeatures);
        index.add_async(&general, 1, &cancel).await.unwrap();
        assert_eq!(
            index.get_subsuming_async(&ground, &cancel).await.unwrap(),
            vec![1]
        );
        assert!(index
            .get_subsumed_async(&ground, &cancel)
            .await
            .unwrap()
            .is_empty());
        assert!(index.remove_async(&general, &cancel).await.unwrap());
        assert_eq!(index.store().node_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_replace_makes_no_insertion() {
        let mut ctx = TestCtx::new();
        let (general, _) = sample_clauses(&mut ctx);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut index = FeatureVectorIndex::new(SymbolCountFeatures);
        assert_eq!(
            index.try_replace_subsumed_async(&general, 1, &cancel).await,
            Err(IndexError::Cancelled)
        );
        assert!(!index.contains(&general));
        assert_eq!(index.store().node_count(), 1);
    }
}
