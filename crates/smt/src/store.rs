//! Node and value storage

use std::collections::HashMap;

use crate::error::{SmtError, StoreError};

/// A byte-keyed map backing a tree's nodes or values.
pub trait MapStore {
    /// Read the value stored under `key`
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store `value` under `key`, overwriting any previous value
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError>;

    /// Whether `key` is present
    fn has(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }

    /// Apply every write in `batch`.
    ///
    /// The default applies writes one by one and stops at the first failure;
    /// backends with native batches should override it to apply all or nothing.
    fn write_batch(&mut self, batch: WriteBatch) -> Result<(), StoreError> {
        for (key, value) in batch {
            self.set(key, value)?;
        }
        Ok(())
    }
}

/// In-memory [`MapStore`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entries: HashMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl MapStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError> {
        self.entries.insert(key, value);
        Ok(())
    }

    fn has(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.entries.contains_key(key))
    }

    fn write_batch(&mut self, batch: WriteBatch) -> Result<(), StoreError> {
        self.entries.extend(batch);
        Ok(())
    }
}

/// Ordered writes collected before being applied to a store
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteBatch {
    writes: Vec<(Vec<u8>, Vec<u8>)>,
}

impl WriteBatch {
    /// Queue a write
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.writes.push((key, value));
    }

    /// Number of queued writes
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

impl IntoIterator for WriteBatch {
    type Item = (Vec<u8>, Vec<u8>);
    type IntoIter = std::vec::IntoIter<(Vec<u8>, Vec<u8>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.into_iter()
    }
}

/// Node and value writes produced by one tree operation
#[derive(Clone, Debug, Default)]
pub(crate) struct PendingWrites {
    pub(crate) nodes: WriteBatch,
    pub(crate) values: WriteBatch,
}

/// The node store (digest → preimage) and value store (path → value) of one tree
#[derive(Clone, Debug)]
pub struct TreeStore<NS, VS> {
    nodes: NS,
    values: VS,
}

impl<NS: MapStore, VS: MapStore> TreeStore<NS, VS> {
    /// Bundle a node store and a value store
    pub const fn new(nodes: NS, values: VS) -> Self {
        Self { nodes, values }
    }

    /// Preimage of the node with digest `hash`
    pub fn get_node(&self, hash: &[u8]) -> Result<Vec<u8>, SmtError> {
        self.nodes
            .get(hash)?
            .ok_or_else(|| SmtError::NodeNotFound(hash.to_vec()))
    }

    /// Value of the leaf at `path`
    pub fn get_value(&self, path: &[u8]) -> Result<Vec<u8>, SmtError> {
        self.values
            .get(path)?
            .ok_or_else(|| SmtError::ValueNotFound(path.to_vec()))
    }

    /// Whether a node with digest `hash` is stored
    pub fn has_node(&self, hash: &[u8]) -> Result<bool, SmtError> {
        Ok(self.nodes.has(hash)?)
    }

    /// Apply one operation's writes, nodes first.
    ///
    /// Values are keyed by path, so a value written ahead of a failed node
    /// write would be read through the old root's leaf.
    pub(crate) fn commit(&mut self, pending: PendingWrites) -> Result<(), SmtError> {
        if !pending.nodes.is_empty() {
            self.nodes.write_batch(pending.nodes)?;
        }
        if !pending.values.is_empty() {
            self.values.write_batch(pending.values)?;
        }
        Ok(())
    }

    /// Node store
    pub const fn nodes(&self) -> &NS {
        &self.nodes
    }

    /// Value store
    pub const fn values(&self) -> &VS {
        &self.values
    }

    /// Release both stores
    pub fn into_inner(self) -> (NS, VS) {
        (self.nodes, self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get(b"k").unwrap(), None);
        assert!(!store.has(b"k").unwrap());

        store.set(b"k".to_vec(), b"v".to_vec()).unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
        assert!(store.has(b"k").unwrap());

        store.set(b"k".to_vec(), b"w".to_vec()).unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"w".to_vec()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_write_batch() {
        let mut batch = WriteBatch::default();
        batch.put(b"a".to_vec(), b"1".to_vec());
        batch.put(b"b".to_vec(), b"2".to_vec());
        batch.put(b"a".to_vec(), b"3".to_vec());
        assert_eq!(batch.len(), 3);

        let mut store = MemoryStore::new();
        store.write_batch(batch).unwrap();
        assert_eq!(store.len(), 2);
        // Later writes win
        assert_eq!(store.get(b"a").unwrap(), Some(b"3".to_vec()));
    }

    #[test]
    fn test_tree_store_not_found() {
        let store = TreeStore::new(MemoryStore::new(), MemoryStore::new());
        assert!(matches!(store.get_node(b"missing"), Err(SmtError::NodeNotFound(h)) if h == b"missing"));
        assert!(matches!(store.get_value(b"missing"), Err(SmtError::ValueNotFound(_))));
    }

    #[test]
    fn test_tree_store_commit() {
        let mut store = TreeStore::new(MemoryStore::new(), MemoryStore::new());
        let mut pending = PendingWrites::default();
        pending.nodes.put(b"h".to_vec(), b"n".to_vec());
        pending.values.put(b"p".to_vec(), b"v".to_vec());
        store.commit(pending).unwrap();

        assert_eq!(store.get_node(b"h").unwrap(), b"n");
        assert_eq!(store.get_value(b"p").unwrap(), b"v");
        assert!(store.has_node(b"h").unwrap());
    }
}
