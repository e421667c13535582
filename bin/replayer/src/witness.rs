//! Witness loading and replay
//!
//! A witness carries the pre-state root, one proof per key the transition
//! touches and the writes to apply. Replaying it over an empty deep subtree
//! yields the post-state root without access to the full state.

use std::{fs, path::Path};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use xlayer_smt::{
    DeepSparseMerkleSubTree, Hasher, HexBytes, MemoryStore, ProofWire, SparseMerkleProof, Value,
};

/// Proof material for one key under the pre-state root
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct BranchWitness {
    /// Key as hex
    pub(crate) key: HexBytes,
    /// Value under the pre-state root, absent for a non-membership proof
    #[serde(default)]
    pub(crate) value: Option<HexBytes>,
    /// Branch proof
    pub(crate) proof: ProofWire,
}

/// One write of the transition
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct UpdateWitness {
    /// Key as hex
    pub(crate) key: HexBytes,
    /// New value, absent to delete the key
    #[serde(default)]
    pub(crate) value: Option<HexBytes>,
}

/// State transition witness
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct Witness {
    /// Pre-state root
    pub(crate) root: HexBytes,
    /// Branches for every key read or written
    pub(crate) branches: Vec<BranchWitness>,
    /// Writes, applied in order
    #[serde(default)]
    pub(crate) updates: Vec<UpdateWitness>,
    /// Claimed post-state root
    #[serde(default)]
    pub(crate) expected_root: Option<HexBytes>,
}

impl Witness {
    /// Read a witness from a JSON file
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read witness {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("invalid witness {}", path.display()))
    }
}

/// Import every branch of `witness`, apply its writes and return the post-state root.
///
/// Fails if any branch does not verify against the pre-state root, if a write
/// touches a key without an imported branch, or if the result differs from the
/// claimed post-state root.
pub(crate) fn replay<H: Hasher>(witness: &Witness, hasher: H) -> Result<Vec<u8>> {
    let mut subtree = DeepSparseMerkleSubTree::new(
        MemoryStore::new(),
        MemoryStore::new(),
        hasher,
        witness.root.0.clone(),
    );

    for (index, branch) in witness.branches.iter().enumerate() {
        let key = hex::encode(&branch.key);
        let proof = SparseMerkleProof::<H>::try_from(branch.proof.clone())
            .with_context(|| format!("malformed proof for branch {index} (key {key})"))?;
        let value = Value::from(branch.value.clone().map(Vec::from));
        subtree
            .add_branch(&proof, branch.key.as_ref(), &value)
            .with_context(|| format!("branch {index} (key {key}) rejected"))?;
    }
    info!(branches = witness.branches.len(), "imported witness branches");

    for update in &witness.updates {
        let key = update.key.as_ref();
        let applied = match &update.value {
            Some(value) => subtree.update(key, value.as_ref()),
            None => subtree.delete(key),
        };
        applied.with_context(|| format!("failed to apply write to key {}", hex::encode(key)))?;
        debug!(key = %hex::encode(key), root = %hex::encode(subtree.root()), "applied write");
    }

    let root = subtree.root().to_vec();
    if let Some(expected) = &witness.expected_root {
        ensure!(
            root == expected.0,
            "post-state root mismatch: computed {}, claimed {}",
            hex::encode(&root),
            hex::encode(expected)
        );
    }
    info!(updates = witness.updates.len(), root = %hex::encode(&root), "replayed witness");
    Ok(root)
}
