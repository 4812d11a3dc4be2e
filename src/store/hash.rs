//! Hash-map-backed node storage

use super::{NodeId, NodeStore, Slab};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::hash::Hash;

/// One node: hashed children plus insertion-ordered leaf values.
#[derive(Debug, Clone)]
struct HashNode<K, E, V> {
    children: HashMap<K, NodeId>,
    values: IndexMap<E, V>,
}

impl<K, E, V> HashNode<K, E, V> {
    fn new() -> Self {
        HashNode {
            children: HashMap::new(),
            values: IndexMap::new(),
        }
    }
}

/// In-memory node store with hash-map children.
///
/// Child enumeration order is unspecified; all index algorithms that need
/// an enumeration order tolerate this (see [`SortedStore`](super::SortedStore)
/// for deterministic enumeration).
#[derive(Debug, Clone)]
pub struct HashStore<K, E, V> {
    slab: Slab<HashNode<K, E, V>>,
    root: NodeId,
}

impl<K, E, V> HashStore<K, E, V> {
    /// Create an empty store holding only a root node.
    pub fn new() -> Self {
        let mut slab = Slab::new();
        let root = slab.alloc(HashNode::new());
        HashStore { slab, root }
    }

    /// Number of live nodes, including the root.
    pub fn node_count(&self) -> usize {
        self.slab.len()
    }
}

impl<K, E, V> Default for HashStore<K, E, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, E, V> NodeStore for HashStore<K, E, V>
where
    K: Clone + Eq + Hash,
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
        self.slab.get(node).children.get(key).copied()
    }

    async fn child_or_insert(&mut self, node: NodeId, key: &K) -> NodeId {
        if let Some(&child) = self.slab.get(node).children.get(key) {
            return child;
        }
        let child = self.slab.alloc(HashNode::new());
        self.slab
            .get_mut(node)
            .children
            .insert(key.clone(), child);
        child
    }

    async fn remove_child(&mut self, node: NodeId, key: &K) -> bool {
        match self.slab.get_mut(node).children.remove(key) {
            Some(child) => {
                let freed = self.slab.release(child);
                debug_assert!(
                    freed.children.is_empty() && freed.values.is_empty(),
                    "removed a populated node"
                );
                true
            }
            None => false,
        }
    }

    async fn children(&self, node: NodeId) -> Vec<(K, NodeId)> {
        self.slab
            .get(node)
            .children
            .iter()
            .map(|(k, &id)| (k.clone(), id))
            .collect()
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
        // shift_remove keeps insertion order for the surviving values
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
