//! Error types

use thiserror::Error;

/// Failure reported by a [`MapStore`](crate::MapStore) backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend rejected a read or a write
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Structural defect in a proof, detected when the proof is constructed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofError {
    /// More side nodes than the tree has levels
    #[error("proof has {count} side nodes but the tree depth is {depth}")]
    TooManySideNodes {
        /// Side nodes supplied
        count: usize,
        /// Tree depth
        depth: usize,
    },
    /// A side node is not a digest of the hasher's width
    #[error("side node {index} is {len} bytes, expected {expected}")]
    SideNodeWidth {
        /// Position of the side node in the proof
        index: usize,
        /// Actual length
        len: usize,
        /// Digest width
        expected: usize,
    },
    /// The non-membership leaf path is not a digest of the hasher's width
    #[error("non-membership leaf path is {len} bytes, expected {expected}")]
    LeafPathWidth {
        /// Actual length
        len: usize,
        /// Digest width
        expected: usize,
    },
    /// Sibling data was supplied for a proof without side nodes
    #[error("sibling data supplied without side nodes")]
    SiblingWithoutSideNodes,
    /// Sibling data does not hash to the lowest side node
    #[error("sibling data does not hash to the lowest side node")]
    SiblingMismatch,
    /// Compact proof bit mask has the wrong length or stray bits
    #[error("bit mask does not describe {num_side_nodes} side nodes")]
    BitMask {
        /// Side node count declared by the proof
        num_side_nodes: usize,
    },
    /// Compact proof lists a different number of side nodes than its bit mask implies
    #[error("compact proof lists {actual} side nodes, bit mask implies {expected}")]
    SideNodeCount {
        /// Side nodes listed
        actual: usize,
        /// Side nodes implied by the bit mask
        expected: usize,
    },
}

/// Reason a proof failed verification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// The proof is structurally invalid
    #[error("malformed proof: {0}")]
    Malformed(#[from] ProofError),
    /// A membership claim carried non-membership leaf data
    #[error("membership proof carries non-membership leaf data")]
    UnexpectedLeafData,
    /// The non-membership leaf is the key's own leaf or sits off the key's path
    #[error("non-membership leaf does not diverge from the key's path below the proof depth")]
    ConflictingLeaf,
    /// The recomputed root differs from the expected root
    #[error("recomputed root does not match")]
    RootMismatch,
}

/// Errors returned by tree operations
#[derive(Debug, Error)]
pub enum SmtError {
    /// A branch failed verification against the tree's root
    #[error("bad proof: {0}")]
    BadProof(#[from] VerifyError),
    /// A node on the traversed path is not in the node store
    #[error("node {} not found", hex::encode(.0))]
    NodeNotFound(Vec<u8>),
    /// A leaf exists but its value is not in the value store
    #[error("value for path {} not found", hex::encode(.0))]
    ValueNotFound(Vec<u8>),
    /// A stored preimage does not parse as a node
    #[error("node {} has a malformed preimage", hex::encode(.0))]
    MalformedNode(Vec<u8>),
    /// The underlying store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SmtError {
    /// Whether this error means the traversed path was never imported
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NodeNotFound(_) | Self::ValueNotFound(_))
    }
}
