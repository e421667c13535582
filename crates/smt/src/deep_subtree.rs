//! Deep Sparse Merkle Subtree
//!
//! A tree that starts with empty stores bound to a known root and is filled by
//! importing verified branches. Once every node on a key's path is imported the
//! key can be read, updated and (given sibling data) deleted exactly as in the
//! full tree, producing the same roots. Any path that was never imported fails
//! with [`SmtError::NodeNotFound`] instead of reading as empty.

use tracing::{debug, trace};

use crate::{
    error::{SmtError, VerifyError},
    hasher::{Hasher, TreeHasher},
    proof::{SparseCompactMerkleProof, SparseMerkleProof},
    store::{MapStore, PendingWrites, TreeStore},
    tree::{KeyValueTree, SparseMerkleTree},
    value::Value,
    verifier::verify_proof_with_updates,
};

/// A sparse Merkle tree holding only the branches imported into it
#[derive(Clone, Debug)]
pub struct DeepSparseMerkleSubTree<H, NS, VS> {
    tree: SparseMerkleTree<H, NS, VS>,
}

impl<H: Hasher, NS: MapStore, VS: MapStore> DeepSparseMerkleSubTree<H, NS, VS> {
    /// Create a subtree committing to `root` over (normally empty) stores
    pub fn new(nodes: NS, values: VS, hasher: H, root: Vec<u8>) -> Self {
        Self { tree: SparseMerkleTree::import(nodes, values, hasher, root) }
    }

    /// Verify `proof` for `key` bound to `value` against the current root and
    /// import every node it reveals.
    ///
    /// The root is unchanged. On [`SmtError::BadProof`] the stores are left
    /// untouched. A [`Value::Absent`] claim imports the non-membership branch,
    /// after which reading `key` returns [`Value::Absent`].
    pub fn add_branch(
        &mut self,
        proof: &SparseMerkleProof<H>,
        key: &[u8],
        value: &Value,
    ) -> Result<(), SmtError> {
        let updates = verify_proof_with_updates(proof, self.tree.root(), key, value, self.tree.hasher())
            .map_err(|err| self.reject(key, err))?;

        let hasher = self.tree.hasher();
        let mut pending = PendingWrites::default();
        if let Value::Present(value) = value {
            pending.values.put(hasher.path(key), value.clone());
        }
        for update in updates {
            pending.nodes.put(update.hash, update.data);
        }
        if let Some(sibling) = proof.sibling_data() {
            pending.nodes.put(hasher.digest(sibling), sibling.to_vec());
        }

        let imported = pending.nodes.len();
        self.tree.store_mut().commit(pending)?;
        debug!(
            target: "smt::deep",
            key = %hex::encode(key),
            present = value.is_present(),
            nodes = imported,
            "imported branch"
        );
        Ok(())
    }

    /// [`add_branch`](Self::add_branch) for a compact proof
    pub fn add_compact_branch(
        &mut self,
        proof: &SparseCompactMerkleProof<H>,
        key: &[u8],
        value: &Value,
    ) -> Result<(), SmtError> {
        let proof = proof
            .decompact()
            .map_err(|err| self.reject(key, VerifyError::Malformed(err)))?;
        self.add_branch(&proof, key, value)
    }

    fn reject(&self, key: &[u8], err: VerifyError) -> SmtError {
        debug!(
            target: "smt::deep",
            key = %hex::encode(key),
            root = %hex::encode(self.tree.root()),
            %err,
            "rejected branch"
        );
        SmtError::BadProof(err)
    }

    /// Current root digest
    pub fn root(&self) -> &[u8] {
        self.tree.root()
    }

    /// Hashing rules of this subtree
    pub const fn hasher(&self) -> &TreeHasher<H> {
        self.tree.hasher()
    }

    /// Backing stores
    pub const fn store(&self) -> &TreeStore<NS, VS> {
        self.tree.store()
    }

    /// Value bound to `key`; fails with [`SmtError::NodeNotFound`] off the imported paths
    pub fn get(&self, key: &[u8]) -> Result<Value, SmtError> {
        self.tree.get(key)
    }

    /// Whether `key` is bound to a value
    pub fn has(&self, key: &[u8]) -> Result<bool, SmtError> {
        self.tree.has(key)
    }

    /// Bind `key` to `value` and advance the root
    pub fn update(&mut self, key: &[u8], value: &[u8]) -> Result<(), SmtError> {
        self.tree.update(key, value)?;
        trace!(target: "smt::deep", root = %hex::encode(self.tree.root()), "advanced root");
        Ok(())
    }

    /// Unbind `key` and advance the root. Needs the key's branch imported with
    /// sibling data when the key has a sibling.
    pub fn delete(&mut self, key: &[u8]) -> Result<(), SmtError> {
        self.tree.delete(key)?;
        trace!(target: "smt::deep", root = %hex::encode(self.tree.root()), "advanced root");
        Ok(())
    }

    /// Proof for an imported `key` against the current root
    pub fn prove(&self, key: &[u8]) -> Result<SparseMerkleProof<H>, SmtError> {
        self.tree.prove(key)
    }

    /// The underlying tree
    pub fn into_tree(self) -> SparseMerkleTree<H, NS, VS> {
        self.tree
    }
}

impl<H: Hasher, NS: MapStore, VS: MapStore> KeyValueTree for DeepSparseMerkleSubTree<H, NS, VS> {
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
