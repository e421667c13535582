//! Sparse Merkle Tree (SMT) with deep subtrees
//!
//! A [`SparseMerkleTree`] commits to a key-value map under a single root. A
//! [`DeepSparseMerkleSubTree`] holds only the branches it was given: it is bound
//! to a known root, imports verified proofs with
//! [`add_branch`](DeepSparseMerkleSubTree::add_branch), and from then on reads
//! and writes the imported keys as the full tree would. This is what a fraud
//! proof verifier needs to re-execute a state transition over a handful of keys
//! without holding the whole state.
//!
//! Key features:
//! - Shortcut leaves: a leaf sits at the shallowest depth that isolates its path
//! - Pluggable hashing ([`Keccak256Hasher`], [`Sha256Hasher`]) and storage ([`MapStore`])
//! - Fail closed: reading an unimported path is [`SmtError::NodeNotFound`], never a default

mod deep_subtree;
mod error;
mod hasher;
mod path;
mod proof;
mod store;
mod tree;
mod value;
mod verifier;

pub use deep_subtree::DeepSparseMerkleSubTree;
pub use error::{ProofError, SmtError, StoreError, VerifyError};
pub use hasher::{Hasher, Keccak256Hasher, Sha256Hasher, TreeHasher, LEAF_PREFIX, NODE_PREFIX};
pub use proof::{
    CompactProofWire, HexBytes, LeafData, ProofWire, SparseCompactMerkleProof, SparseMerkleProof,
};
pub use store::{MapStore, MemoryStore, TreeStore, WriteBatch};
pub use tree::{KeyValueTree, SparseMerkleTree};
pub use value::Value;
pub use verifier::{verify_compact_proof, verify_proof, verify_proof_with_updates, NodeUpdate};
