//! Sparse Merkle Tree implementation
//!
//! Nodes are addressed by digest in a node store and leaf values by path in a
//! value store. A leaf sits at the shallowest depth where no other leaf shares
//! its path prefix, so a branch is only as long as the key's unique prefix.
//! Nothing is ever removed from the stores: updates write new nodes and leave
//! the old ones in place.

use tracing::trace;

use crate::{
    error::SmtError,
    hasher::{Hasher, TreeHasher},
    path::{count_common_prefix, is_right},
    proof::{LeafData, SparseCompactMerkleProof, SparseMerkleProof},
    store::{MapStore, PendingWrites, TreeStore},
    value::Value,
};

/// Read and write access to an authenticated key-value tree.
pub trait KeyValueTree {
    /// Current root digest
    fn root(&self) -> &[u8];

    /// Value bound to `key`
    fn get(&self, key: &[u8]) -> Result<Value, SmtError>;

    /// Bind `key` to `value`
    fn update(&mut self, key: &[u8], value: &[u8]) -> Result<(), SmtError>;

    /// Unbind `key`. Deleting an absent key is a no-op.
    fn delete(&mut self, key: &[u8]) -> Result<(), SmtError>;

    /// Whether `key` is bound to a value
    fn has(&self, key: &[u8]) -> Result<bool, SmtError> {
        Ok(self.get(key)?.is_present())
    }
}

/// The nodes met while walking one path from a root
#[derive(Debug)]
struct Branch {
    /// Siblings of the walked nodes, leaf level first
    side_nodes: Vec<Vec<u8>>,
    /// Walked nodes, leaf level first, root last
    path_nodes: Vec<Vec<u8>>,
    /// Preimage of the leaf the walk ended on
    leaf_data: Option<Vec<u8>>,
    /// Preimage of the lowest side node, when requested
    sibling_data: Option<Vec<u8>>,
}

/// Sparse Merkle Tree over a node store and a value store
#[derive(Clone, Debug)]
pub struct SparseMerkleTree<H, NS, VS> {
    hasher: TreeHasher<H>,
    store: TreeStore<NS, VS>,
    root: Vec<u8>,
}

impl<H: Hasher, NS: MapStore, VS: MapStore> SparseMerkleTree<H, NS, VS> {
    /// Create an empty tree
    pub fn new(nodes: NS, values: VS, hasher: H) -> Self {
        let hasher = TreeHasher::new(hasher);
        let root = hasher.placeholder().to_vec();
        Self { hasher, store: TreeStore::new(nodes, values), root }
    }

    /// Open a tree with a known root over existing stores
    pub fn import(nodes: NS, values: VS, hasher: H, root: Vec<u8>) -> Self {
        Self { hasher: TreeHasher::new(hasher), store: TreeStore::new(nodes, values), root }
    }

    /// Current root digest
    pub fn root(&self) -> &[u8] {
        &self.root
    }

    /// Hashing rules of this tree
    pub const fn hasher(&self) -> &TreeHasher<H> {
        &self.hasher
    }

    /// Backing stores
    pub const fn store(&self) -> &TreeStore<NS, VS> {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut TreeStore<NS, VS> {
        &mut self.store
    }

    /// Release the backing stores
    pub fn into_stores(self) -> (NS, VS) {
        self.store.into_inner()
    }

    /// Value bound to `key`.
    ///
    /// Fails with [`SmtError::NodeNotFound`] if a node on the key's path is
    /// missing from the node store.
    pub fn get(&self, key: &[u8]) -> Result<Value, SmtError> {
        let path = self.hasher.path(key);
        let mut current = self.root.clone();

        for depth in 0..=TreeHasher::<H>::depth() {
            if self.hasher.is_placeholder(&current) {
                return Ok(Value::Absent);
            }
            let data = self.store.get_node(&current)?;
            if self.hasher.is_leaf(&data) {
                let (leaf_path, _) = self.parse_leaf(&current, &data)?;
                if leaf_path != path.as_slice() {
                    return Ok(Value::Absent);
                }
                return self.store.get_value(&path).map(Value::Present);
            }
            if depth == TreeHasher::<H>::depth() {
                break;
            }
            let (left, right) = self.parse_node(&current, &data)?;
            current = if is_right(&path, depth) { right.to_vec() } else { left.to_vec() };
        }

        // An internal node below the deepest level
        Err(SmtError::MalformedNode(current))
    }

    /// Whether `key` is bound to a value
    pub fn has(&self, key: &[u8]) -> Result<bool, SmtError> {
        Ok(self.get(key)?.is_present())
    }

    /// Bind `key` to `value` and advance the root
    pub fn update(&mut self, key: &[u8], value: &[u8]) -> Result<(), SmtError> {
        let path = self.hasher.path(key);
        let branch = self.side_nodes_for_root(&path, &self.root, false)?;
        let mut pending = PendingWrites::default();
        let Some(root) = self.update_with_side_nodes(&path, value, &branch, &mut pending)? else {
            // Same value already bound
            return Ok(());
        };

        self.store.commit(pending)?;
        trace!(target: "smt", key = %hex::encode(key), root = %hex::encode(&root), "updated key");
        self.root = root;
        Ok(())
    }

    /// Unbind `key` and advance the root. Deleting an absent key is a no-op.
    pub fn delete(&mut self, key: &[u8]) -> Result<(), SmtError> {
        let path = self.hasher.path(key);
        let branch = self.side_nodes_for_root(&path, &self.root, false)?;
        let mut pending = PendingWrites::default();
        let Some(root) = self.delete_with_side_nodes(&path, &branch, &mut pending)? else {
            return Ok(());
        };

        self.store.commit(pending)?;
        trace!(target: "smt", key = %hex::encode(key), root = %hex::encode(&root), "deleted key");
        self.root = root;
        Ok(())
    }

    /// Bind or unbind `key` according to `value`
    pub fn apply(&mut self, key: &[u8], value: &Value) -> Result<(), SmtError> {
        match value {
            Value::Present(value) => self.update(key, value),
            Value::Absent => self.delete(key),
        }
    }

    /// Proof for `key` against the current root
    pub fn prove(&self, key: &[u8]) -> Result<SparseMerkleProof<H>, SmtError> {
        self.prove_for_root(key, &self.root)
    }

    /// Proof for `key` against the current root, carrying the preimage of its
    /// lowest side node so the key can later be deleted in a deep subtree
    pub fn prove_updatable(&self, key: &[u8]) -> Result<SparseMerkleProof<H>, SmtError> {
        self.prove_updatable_for_root(key, &self.root)
    }

    /// Compact proof for `key` against the current root
    pub fn prove_compact(&self, key: &[u8]) -> Result<SparseCompactMerkleProof<H>, SmtError> {
        Ok(self.prove(key)?.compact())
    }

    /// Proof for `key` against an earlier `root` whose nodes are still stored
    pub fn prove_for_root(&self, key: &[u8], root: &[u8]) -> Result<SparseMerkleProof<H>, SmtError> {
        self.prove_inner(key, root, false)
    }

    /// Updatable proof for `key` against an earlier `root`
    pub fn prove_updatable_for_root(
        &self,
        key: &[u8],
        root: &[u8],
    ) -> Result<SparseMerkleProof<H>, SmtError> {
        self.prove_inner(key, root, true)
    }

    fn prove_inner(
        &self,
        key: &[u8],
        root: &[u8],
        with_sibling_data: bool,
    ) -> Result<SparseMerkleProof<H>, SmtError> {
        let path = self.hasher.path(key);
        let branch = self.side_nodes_for_root(&path, root, with_sibling_data)?;

        // A leaf of another key at our position must be shown to prove absence
        let non_membership_leaf = match &branch.leaf_data {
            Some(data) => {
                let (leaf_path, leaf_value) = self.parse_leaf(&branch.path_nodes[0], data)?;
                (leaf_path != path.as_slice())
                    .then(|| LeafData { path: leaf_path.to_vec(), value: leaf_value.to_vec() })
            }
            None => None,
        };

        Ok(SparseMerkleProof::new_unchecked(branch.side_nodes, non_membership_leaf, branch.sibling_data))
    }

    /// Walk from `root` towards `path` until a leaf or an empty subtree is met
    fn side_nodes_for_root(
        &self,
        path: &[u8],
        root: &[u8],
        with_sibling_data: bool,
    ) -> Result<Branch, SmtError> {
        let mut branch = Branch {
            side_nodes: Vec::new(),
            path_nodes: vec![root.to_vec()],
            leaf_data: None,
            sibling_data: None,
        };
        if self.hasher.is_placeholder(root) {
            return Ok(branch);
        }

        let mut current = self.store.get_node(root)?;
        if self.hasher.is_leaf(&current) {
            branch.leaf_data = Some(current);
            return Ok(branch);
        }

        let mut depth = 0;
        loop {
            if depth == TreeHasher::<H>::depth() {
                return Err(SmtError::MalformedNode(branch.path_nodes.swap_remove(depth)));
            }
            let node_hash = &branch.path_nodes[depth];
            let (left, right) = self.parse_node(node_hash, &current)?;
            let (child, side) = if is_right(path, depth) { (right, left) } else { (left, right) };
            let (child, side) = (child.to_vec(), side.to_vec());
            branch.side_nodes.push(side);
            branch.path_nodes.push(child);
            depth += 1;

            let child = &branch.path_nodes[depth];
            if self.hasher.is_placeholder(child) {
                break;
            }
            current = self.store.get_node(child)?;
            if self.hasher.is_leaf(&current) {
                branch.leaf_data = Some(current);
                break;
            }
        }

        if with_sibling_data {
            if let Some(side) = branch.side_nodes.last() {
                if !self.hasher.is_placeholder(side) {
                    branch.sibling_data = Some(self.store.get_node(side)?);
                }
            }
        }

        branch.side_nodes.reverse();
        branch.path_nodes.reverse();
        Ok(branch)
    }

    /// Compute the root after binding `path` to `value`, queueing new nodes.
    /// Returns `None` when the path is already bound to `value`.
    fn update_with_side_nodes(
        &self,
        path: &[u8],
        value: &[u8],
        branch: &Branch,
        pending: &mut PendingWrites,
    ) -> Result<Option<Vec<u8>>, SmtError> {
        let depth = TreeHasher::<H>::depth();
        let (mut current_hash, current_data) = self.hasher.digest_leaf(path, value);
        pending.nodes.put(current_hash.clone(), current_data);

        // Bits shared with the leaf currently at our position; a full match
        // means we replace it or fill an empty subtree
        let old_node = &branch.path_nodes[0];
        let common_prefix = match &branch.leaf_data {
            Some(data) => {
                let (old_path, old_value) = self.parse_leaf(old_node, data)?;
                if old_path == path && old_value == value {
                    return Ok(None);
                }
                count_common_prefix(path, old_path)
            }
            None => depth,
        };

        // Split: both leaves hang off a new node at the depth their paths diverge
        if common_prefix != depth {
            let (hash, data) = if is_right(path, common_prefix) {
                self.hasher.digest_node(old_node, &current_hash)
            } else {
                self.hasher.digest_node(&current_hash, old_node)
            };
            pending.nodes.put(hash.clone(), data);
            current_hash = hash;
        }

        let offset = depth - branch.side_nodes.len();
        for i in 0..depth {
            let level = depth - 1 - i;
            let side_node = match i.checked_sub(offset) {
                Some(index) => branch.side_nodes[index].as_slice(),
                // Between the split point and the old leaf's depth every sibling is empty
                None if common_prefix != depth && common_prefix > level => self.hasher.placeholder(),
                None => continue,
            };

            let (hash, data) = if is_right(path, level) {
                self.hasher.digest_node(side_node, &current_hash)
            } else {
                self.hasher.digest_node(&current_hash, side_node)
            };
            pending.nodes.put(hash.clone(), data);
            current_hash = hash;
        }

        pending.values.put(path.to_vec(), value.to_vec());
        Ok(Some(current_hash))
    }

    /// Compute the root after unbinding `path`, queueing new nodes.
    /// Returns `None` when the path is not bound.
    fn delete_with_side_nodes(
        &self,
        path: &[u8],
        branch: &Branch,
        pending: &mut PendingWrites,
    ) -> Result<Option<Vec<u8>>, SmtError> {
        let Some(data) = &branch.leaf_data else {
            return Ok(None);
        };
        let (leaf_path, _) = self.parse_leaf(&branch.path_nodes[0], data)?;
        if leaf_path != path {
            return Ok(None);
        }

        // Hash of the subtree carried upward; `None` while it is empty
        let mut current: Option<Vec<u8>> = None;
        // Whether `current` may still move up (empty, or a lone leaf)
        let mut bubbling = true;
        let side_nodes = &branch.side_nodes;

        for (i, side_node) in side_nodes.iter().enumerate() {
            let level = side_nodes.len() - 1 - i;
            if bubbling {
                if self.hasher.is_placeholder(side_node) {
                    continue;
                }
                if current.is_none() {
                    let sibling = self.store.get_node(side_node)?;
                    if self.hasher.is_leaf(&sibling) {
                        // A lone leaf sibling takes the place of its parent
                        current = Some(side_node.clone());
                        continue;
                    }
                    current = Some(self.hasher.placeholder().to_vec());
                }
                bubbling = false;
            }

            let carried = current.as_deref().unwrap_or_else(|| self.hasher.placeholder());
            let (hash, data) = if is_right(path, level) {
                self.hasher.digest_node(side_node, carried)
            } else {
                self.hasher.digest_node(carried, side_node)
            };
            pending.nodes.put(hash.clone(), data);
            current = Some(hash);
        }

        Ok(Some(current.unwrap_or_else(|| self.hasher.placeholder().to_vec())))
    }

    fn parse_leaf<'a>(&self, hash: &[u8], data: &'a [u8]) -> Result<(&'a [u8], &'a [u8]), SmtError> {
        self.hasher.parse_leaf(data).ok_or_else(|| SmtError::MalformedNode(hash.to_vec()))
    }

    fn parse_node<'a>(&self, hash: &[u8], data: &'a [u8]) -> Result<(&'a [u8], &'a [u8]), SmtError> {
        self.hasher.parse_node(data).ok_or_else(|| SmtError::MalformedNode(hash.to_vec()))
    }
}

impl<H: Hasher, NS: MapStore, VS: MapStore> KeyValueTree for SparseMerkleTree<H, NS, VS> {
    fn root(&self) -> &[u8] {
        Self::root(self)
    }

    fn get(&self, key: &[u8]) -> Result<Value, SmtError> {
        Self::get(self, key)
    }

    fn update(&mut self, key: &[u8], value: &[u8]) -> Result<(), SmtError> {
        Self::update(self, key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), SmtError> {
        Self::delete(self, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        hasher::{Keccak256Hasher, Sha256Hasher},
        store::MemoryStore,
        verifier::verify_proof,
    };
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::collections::HashMap;

    type Tree = SparseMerkleTree<Keccak256Hasher, MemoryStore, MemoryStore>;

    fn empty_tree() -> Tree {
        Tree::new(MemoryStore::new(), MemoryStore::new(), Keccak256Hasher)
    }

    #[test]
    fn test_empty_tree() {
        let tree = empty_tree();
        assert_eq!(tree.root(), [0u8; 32]);
        assert_eq!(tree.get(b"key").unwrap(), Value::Absent);
        assert!(!tree.has(b"key").unwrap());
    }

    #[test]
    fn test_update_and_get() {
        let mut tree = empty_tree();

        tree.update(b"testKey", b"testValue").unwrap();
        assert_eq!(tree.get(b"testKey").unwrap(), Value::Present(b"testValue".to_vec()));
        assert_eq!(tree.get(b"foo").unwrap(), Value::Absent);

        tree.update(b"testKey", b"testValue2").unwrap();
        assert_eq!(tree.get(b"testKey").unwrap(), Value::Present(b"testValue2".to_vec()));

        tree.update(b"foo", b"testValue").unwrap();
        assert_eq!(tree.get(b"foo").unwrap(), Value::Present(b"testValue".to_vec()));
        assert_eq!(tree.get(b"testKey").unwrap(), Value::Present(b"testValue2".to_vec()));
    }

    #[test]
    fn test_single_leaf_is_root() {
        let mut tree = empty_tree();
        tree.update(b"key", b"value").unwrap();

        let path = tree.hasher().path(b"key");
        let (leaf_hash, _) = tree.hasher().digest_leaf(&path, b"value");
        assert_eq!(tree.root(), leaf_hash);
    }

    #[test]
    fn test_root_independent_of_insertion_order() {
        let entries: Vec<(Vec<u8>, Vec<u8>)> =
            (0..32u8).map(|i| (vec![b'k', i], vec![b'v', i])).collect();

        let mut forward = empty_tree();
        for (key, value) in &entries {
            forward.update(key, value).unwrap();
        }
        let mut backward = empty_tree();
        for (key, value) in entries.iter().rev() {
            backward.update(key, value).unwrap();
        }

        assert_eq!(forward.root(), backward.root());
    }

    #[test]
    fn test_same_value_is_noop() {
        let mut tree = empty_tree();
        tree.update(b"key", b"value").unwrap();
        let root = tree.root().to_vec();
        let nodes = tree.store().nodes().len();

        tree.update(b"key", b"value").unwrap();
        assert_eq!(tree.root(), root);
        assert_eq!(tree.store().nodes().len(), nodes);
    }

    #[test]
    fn test_empty_value_is_present() {
        let mut tree = empty_tree();
        tree.update(b"key", b"").unwrap();
        assert_eq!(tree.get(b"key").unwrap(), Value::Present(vec![]));
        assert_ne!(tree.root(), [0u8; 32]);
    }

    #[test]
    fn test_delete_restores_previous_root() {
        let mut tree = empty_tree();
        tree.update(b"a", b"1").unwrap();
        tree.update(b"b", b"2").unwrap();
        let root_ab = tree.root().to_vec();

        tree.update(b"c", b"3").unwrap();
        tree.delete(b"c").unwrap();
        assert_eq!(tree.root(), root_ab);
        assert_eq!(tree.get(b"c").unwrap(), Value::Absent);

        tree.delete(b"b").unwrap();
        tree.delete(b"a").unwrap();
        assert_eq!(tree.root(), [0u8; 32]);
    }

    #[test]
    fn test_delete_absent_is_noop() {
        let mut tree = empty_tree();
        tree.delete(b"nothing").unwrap();
        assert_eq!(tree.root(), [0u8; 32]);

        tree.update(b"a", b"1").unwrap();
        let root = tree.root().to_vec();
        tree.delete(b"nothing").unwrap();
        assert_eq!(tree.root(), root);
    }

    #[test]
    fn test_apply() {
        let mut tree = empty_tree();
        tree.apply(b"a", &Value::Present(b"1".to_vec())).unwrap();
        assert!(tree.has(b"a").unwrap());
        tree.apply(b"a", &Value::Absent).unwrap();
        assert!(!tree.has(b"a").unwrap());
    }

    #[test]
    fn test_proofs_verify() {
        let mut tree = SparseMerkleTree::new(MemoryStore::new(), MemoryStore::new(), Sha256Hasher);
        for i in 0..64u8 {
            tree.update(&[i], &[i, i]).unwrap();
        }

        for i in 0..64u8 {
            let proof = tree.prove(&[i]).unwrap();
            assert!(proof.non_membership_leaf().is_none());
            assert!(verify_proof(&proof, tree.root(), &[i], &Value::Present(vec![i, i]), tree.hasher()));
            assert!(!verify_proof(&proof, tree.root(), &[i], &Value::Absent, tree.hasher()));
        }
        for i in 64..128u8 {
            let proof = tree.prove(&[i]).unwrap();
            assert!(verify_proof(&proof, tree.root(), &[i], &Value::Absent, tree.hasher()));
        }
    }

    #[test]
    fn test_prove_for_previous_root() {
        let mut tree = empty_tree();
        tree.update(b"a", b"1").unwrap();
        tree.update(b"b", b"2").unwrap();
        let old_root = tree.root().to_vec();
        tree.update(b"a", b"changed").unwrap();

        let proof = tree.prove_for_root(b"a", &old_root).unwrap();
        let value = Value::Present(b"1".to_vec());
        assert!(verify_proof(&proof, &old_root, b"a", &value, tree.hasher()));
        assert!(!verify_proof(&proof, tree.root(), b"a", &value, tree.hasher()));
    }

    #[test]
    fn test_updatable_proof_carries_sibling() {
        let mut tree = empty_tree();
        tree.update(b"a", b"1").unwrap();
        tree.update(b"b", b"2").unwrap();

        let proof = tree.prove_updatable(b"a").unwrap();
        let sibling = proof.sibling_data().unwrap();
        assert_eq!(tree.hasher().digest(sibling), proof.side_nodes()[0]);
        assert!(tree.prove(b"a").unwrap().sibling_data().is_none());
    }

    #[test]
    fn test_missing_node_fails_closed() {
        let mut tree = empty_tree();
        tree.update(b"a", b"1").unwrap();
        tree.update(b"b", b"2").unwrap();
        let root = tree.root().to_vec();

        let hollow = Tree::import(MemoryStore::new(), MemoryStore::new(), Keccak256Hasher, root.clone());
        assert!(matches!(hollow.get(b"a"), Err(SmtError::NodeNotFound(hash)) if hash == root));
        assert!(hollow.prove(b"a").unwrap_err().is_not_found());
    }

    #[test]
    fn test_randomized_against_map() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut tree = empty_tree();
        let mut model: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();

        for _ in 0..500 {
            let key = vec![rng.gen_range(0..40u8)];
            if rng.gen_bool(0.3) {
                tree.delete(&key).unwrap();
                model.remove(&key);
            } else {
                let value = vec![rng.gen::<u8>(); rng.gen_range(0..4)];
                tree.update(&key, &value).unwrap();
                model.insert(key, value);
            }
        }

        for k in 0..40u8 {
            assert_eq!(tree.get(&[k]).unwrap(), Value::from(model.get([k].as_slice()).cloned()));
        }

        // The same contents built from scratch commit to the same root
        let mut rebuilt = empty_tree();
        for (key, value) in &model {
            rebuilt.update(key, value).unwrap();
        }
        assert_eq!(tree.root(), rebuilt.root());
    }
}
