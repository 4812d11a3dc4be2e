//! Sorted-vec-backed node storage

use super::{NodeId, NodeStore, Slab};
use indexmap::IndexMap;
use std::hash::Hash;

/// One node: children in a vec kept sorted by key, plus insertion-ordered
/// leaf values.
#[derive(Debug, Clone)]
struct SortedNode<K, E, V> {
    children: Vec<(K, NodeId)>,
    values: IndexMap<E, V>,
}

impl<K, E, V> SortedNode<K, E, V> {
    fn new() -> Self {
        SortedNode {
            children: Vec::new(),
            values: IndexMap::new(),
        }
    }
}

/// In-memory node store with sorted-list children.
///
/// Children are kept ordered by the key type's `Ord`, which is how a caller
/// injects an ordering: the feature-vector index, for example, is ordered by
/// the caller's `Ord` implementation on its feature type. Enumeration is
/// ascending and deterministic.
///
/// Lookup is a binary search, so this store trades a little lookup speed
/// against [`HashStore`](super::HashStore) for ordered, reproducible
/// enumeration and no hashing requirement on keys.
#[derive(Debug, Clone)]
pub struct SortedStore<K, E, V> {
    slab: Slab<SortedNode<K, E, V>>,
    root: NodeId,
}

impl<K, E, V> SortedStore<K, E, V> {
    /// Create an empty store holding only a root node.
    pub fn new() -> Self {
        let mut slab = Slab::new();
        let root = slab.alloc(SortedNode::new());
        SortedStore { slab, root }
    }

    /// Number of live nodes, including the root.
    pub fn node_count(&self) -> usize {
        self.slab.len()
    }
}

impl<K, E, V> Default for SortedStore<K, E, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, E, V> NodeStore for SortedStore<K, E, V>
where
    K: Clone + Ord,
    E: Clone + Eq + Hash,
    V: Clone,
{
    type Key = K;
    type Entry = E;
    type Value = V;

    fn root(&self) -> NodeId {
        self.root
    }

    async fn child(&self, node: NodeId, key: &K) -> Option<NodeId> {
        let children = &self.slab.get(node).children;
        children
            .binary_search_by(|(k, _)| k.cmp(key))
            .ok()
            .map(|i| children[i].1)
    }

    async fn child_or_insert(&mut self, node: NodeId, key: &K) -> NodeId {
        match self
            .slab
            .get(node)
            .children
            .binary_search_by(|(k, _)| k.cmp(key))
        {
            Ok(i) => self.slab.get(node).children[i].1,
            Err(i) => {
                let child = self.slab.alloc(SortedNode::new());
                self.slab
                    .get_mut(node)
                    .children
                    .insert(i, (key.clone(), child));
                child
            }
        }
    }

    async fn remove_child(&mut self, node: NodeId, key: &K) -> bool {
        let idx = match self
            .slab
            .get(node)
            .children
            .binary_search_by(|(k, _)| k.cmp(key))
        {
            Ok(i) => i,
            Err(_) => return false,
        };
        let (_, child) = self.slab.get_mut(node).children.remove(idx);
        let freed = self.slab.release(child);
        debug_assert!(
            freed.children.is_empty() && freed.values.is_empty(),
            "removed a populated node"
        );
        true
    }

    async fn children(&self, node: NodeId) -> Vec<(K, NodeId)> {
        self.slab.get(node).children.clone()
    }

    async fn insert_value(&mut self, node: NodeId, entry: E, value: V) -> bool {
        let values = &mut self.slab.get_mut(node).values;
        if values.contains_key(&entry) {
            return false;
        }
        values.insert(entry, value);
        true
    }

    async fn remove_value(&mut self, node: NodeId, entry: &E) -> Option<V> {
        self.slab.get_mut(node).values.shift_remove(entry)
    }

    async fn value(&self, node: NodeId, entry: &E) -> Option<V> {
        self.slab.get(node).values.get(entry).cloned()
    }

    async fn values(&self, node: NodeId) -> Vec<(E, V)> {
        self.slab
            .get(node)
            .values
            .iter()
            .map(|(e, v)| (e.clone(), v.clone()))
            .collect()
    }

    async fn is_empty(&self, node: NodeId) -> bool {
        let n = self.slab.get(node);
        n.children.is_empty() && n.values.is_empty()
    }
}
