//! Proof verification
//!
//! Verification recomputes the hash chain from the key's leaf position up to
//! the root. Besides the verdict it reports every node it synthesized on the
//! way, which is exactly what a [`DeepSparseMerkleSubTree`] needs to persist to
//! make the branch traversable locally.
//!
//! [`DeepSparseMerkleSubTree`]: crate::DeepSparseMerkleSubTree

use crate::{
    error::VerifyError,
    hasher::{Hasher, TreeHasher},
    path::{count_common_prefix, is_right},
    proof::{SparseCompactMerkleProof, SparseMerkleProof},
    value::Value,
};

/// A node synthesized during verification
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeUpdate {
    /// Digest of the node, its storage key
    pub hash: Vec<u8>,
    /// Preimage of the node
    pub data: Vec<u8>,
}

/// Verify `proof` for `key` bound to `value` against `root`.
///
/// On success returns the nodes recomputed along the branch, leaf first and
/// root last. A [`Value::Absent`] claim checks non-membership. The function is
/// pure: it never touches a store.
pub fn verify_proof_with_updates<H: Hasher>(
    proof: &SparseMerkleProof<H>,
    root: &[u8],
    key: &[u8],
    value: &Value,
    hasher: &TreeHasher<H>,
) -> Result<Vec<NodeUpdate>, VerifyError> {
    proof.sanity_check(hasher)?;

    let path = hasher.path(key);
    let side_nodes = proof.side_nodes();
    let mut updates = Vec::with_capacity(side_nodes.len() + 1);

    let mut current_hash = match value {
        Value::Present(value) => {
            if proof.non_membership_leaf().is_some() {
                return Err(VerifyError::UnexpectedLeafData);
            }
            let (hash, data) = hasher.digest_leaf(&path, value);
            updates.push(NodeUpdate { hash: hash.clone(), data });
            hash
        }
        Value::Absent => match proof.non_membership_leaf() {
            // The path ends in an empty subtree
            None => hasher.placeholder().to_vec(),
            // The path ends in a leaf of another key, which must share every
            // bit the proof walks through and still differ from ours
            Some(leaf) => {
                if leaf.path == path || count_common_prefix(&leaf.path, &path) < side_nodes.len() {
                    return Err(VerifyError::ConflictingLeaf);
                }
                let (hash, data) = hasher.digest_leaf(&leaf.path, &leaf.value);
                updates.push(NodeUpdate { hash: hash.clone(), data });
                hash
            }
        },
    };

    for (i, side_node) in side_nodes.iter().enumerate() {
        let depth = side_nodes.len() - 1 - i;
        let (hash, data) = if is_right(&path, depth) {
            hasher.digest_node(side_node, &current_hash)
        } else {
            hasher.digest_node(&current_hash, side_node)
        };
        updates.push(NodeUpdate { hash: hash.clone(), data });
        current_hash = hash;
    }

    if current_hash != root {
        return Err(VerifyError::RootMismatch);
    }
    Ok(updates)
}

/// Whether `proof` shows `key` bound to `value` under `root`
pub fn verify_proof<H: Hasher>(
    proof: &SparseMerkleProof<H>,
    root: &[u8],
    key: &[u8],
    value: &Value,
    hasher: &TreeHasher<H>,
) -> bool {
    verify_proof_with_updates(proof, root, key, value, hasher).is_ok()
}

/// Whether the compact `proof` shows `key` bound to `value` under `root`
pub fn verify_compact_proof<H: Hasher>(
    proof: &SparseCompactMerkleProof<H>,
    root: &[u8],
    key: &[u8],
    value: &Value,
    hasher: &TreeHasher<H>,
) -> bool {
    proof
        .decompact()
        .is_ok_and(|proof| verify_proof(&proof, root, key, value, hasher))
}
