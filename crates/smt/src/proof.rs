//! SMT proofs and their wire forms
//!
//! A proof lists the side nodes met on the way from the root down to the
//! key's leaf, ordered leaf-level first: `side_nodes[0]` is the sibling of the
//! leaf and the last entry is a child of the root. Its length is the depth at
//! which the path ends, which is usually far less than the full tree depth
//! because leaves sit at the shallowest depth that isolates them.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::{
    error::ProofError,
    hasher::{Hasher, TreeHasher},
    path::{is_right, set_bit},
};

/// Byte string carried as hex on the wire
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HexBytes(#[serde(with = "hex::serde")] pub Vec<u8>);

impl From<Vec<u8>> for HexBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<HexBytes> for Vec<u8> {
    fn from(bytes: HexBytes) -> Self {
        bytes.0
    }
}

impl AsRef<[u8]> for HexBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Path and value of the unrelated leaf that occupies a key's position in a
/// non-membership proof
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafData {
    /// Path of the occupying leaf
    #[serde(with = "hex::serde")]
    pub path: Vec<u8>,
    /// Value of the occupying leaf
    #[serde(with = "hex::serde")]
    pub value: Vec<u8>,
}

/// Membership or non-membership proof for one key against one root
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SparseMerkleProof<H> {
    side_nodes: Vec<Vec<u8>>,
    non_membership_leaf: Option<LeafData>,
    sibling_data: Option<Vec<u8>>,
    _hasher: PhantomData<H>,
}

impl<H: Hasher> SparseMerkleProof<H> {
    /// Build a proof, rejecting it if it is structurally invalid for `H`
    pub fn new(
        side_nodes: Vec<Vec<u8>>,
        non_membership_leaf: Option<LeafData>,
        sibling_data: Option<Vec<u8>>,
    ) -> Result<Self, ProofError> {
        let proof = Self::new_unchecked(side_nodes, non_membership_leaf, sibling_data);
        proof.sanity_check(&TreeHasher::new(H::default()))?;
        Ok(proof)
    }

    pub(crate) fn new_unchecked(
        side_nodes: Vec<Vec<u8>>,
        non_membership_leaf: Option<LeafData>,
        sibling_data: Option<Vec<u8>>,
    ) -> Self {
        Self {
            side_nodes,
            non_membership_leaf,
            sibling_data,
            _hasher: PhantomData,
        }
    }

    /// Side nodes, leaf level first
    pub fn side_nodes(&self) -> &[Vec<u8>] {
        &self.side_nodes
    }

    /// Leaf occupying the key's position, for non-membership proofs
    pub const fn non_membership_leaf(&self) -> Option<&LeafData> {
        self.non_membership_leaf.as_ref()
    }

    /// Preimage of the lowest side node, if this proof is updatable
    pub fn sibling_data(&self) -> Option<&[u8]> {
        self.sibling_data.as_deref()
    }

    /// Whether the proof carries enough data to delete the key afterwards
    pub const fn is_updatable(&self) -> bool {
        self.sibling_data.is_some()
    }

    /// Structural checks that keep a hostile proof from misdirecting verification
    pub(crate) fn sanity_check(&self, hasher: &TreeHasher<H>) -> Result<(), ProofError> {
        let depth = TreeHasher::<H>::depth();
        let size = TreeHasher::<H>::path_size();

        if self.side_nodes.len() > depth {
            return Err(ProofError::TooManySideNodes { count: self.side_nodes.len(), depth });
        }
        if let Some((index, node)) =
            self.side_nodes.iter().enumerate().find(|(_, node)| node.len() != size)
        {
            return Err(ProofError::SideNodeWidth { index, len: node.len(), expected: size });
        }
        if let Some(leaf) = &self.non_membership_leaf {
            if leaf.path.len() != size {
                return Err(ProofError::LeafPathWidth { len: leaf.path.len(), expected: size });
            }
        }
        if let Some(sibling) = &self.sibling_data {
            let lowest = self.side_nodes.first().ok_or(ProofError::SiblingWithoutSideNodes)?;
            if hasher.digest(sibling) != *lowest {
                return Err(ProofError::SiblingMismatch);
            }
        }
        Ok(())
    }

    /// Drop placeholder side nodes, recording their positions in a bit mask
    pub fn compact(&self) -> SparseCompactMerkleProof<H> {
        let mut bit_mask = vec![0u8; self.side_nodes.len().div_ceil(8)];
        let mut side_nodes = Vec::new();
        for (i, node) in self.side_nodes.iter().enumerate() {
            if node.iter().all(|byte| *byte == 0) {
                set_bit(&mut bit_mask, i);
            } else {
                side_nodes.push(node.clone());
            }
        }

        SparseCompactMerkleProof {
            side_nodes,
            non_membership_leaf: self.non_membership_leaf.clone(),
            bit_mask,
            num_side_nodes: self.side_nodes.len(),
            sibling_data: self.sibling_data.clone(),
            _hasher: PhantomData,
        }
    }
}

/// A [`SparseMerkleProof`] with its placeholder side nodes omitted
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SparseCompactMerkleProof<H> {
    side_nodes: Vec<Vec<u8>>,
    non_membership_leaf: Option<LeafData>,
    bit_mask: Vec<u8>,
    num_side_nodes: usize,
    sibling_data: Option<Vec<u8>>,
    _hasher: PhantomData<H>,
}

impl<H: Hasher> SparseCompactMerkleProof<H> {
    /// Build a compact proof, rejecting it if it does not decompact cleanly
    pub fn new(
        side_nodes: Vec<Vec<u8>>,
        non_membership_leaf: Option<LeafData>,
        bit_mask: Vec<u8>,
        num_side_nodes: usize,
        sibling_data: Option<Vec<u8>>,
    ) -> Result<Self, ProofError> {
        let proof = Self {
            side_nodes,
            non_membership_leaf,
            bit_mask,
            num_side_nodes,
            sibling_data,
            _hasher: PhantomData,
        };
        proof.decompact()?;
        Ok(proof)
    }

    /// Non-placeholder side nodes, leaf level first
    pub fn side_nodes(&self) -> &[Vec<u8>] {
        &self.side_nodes
    }

    /// Bit `i` is set when side node `i` of the full proof is a placeholder
    pub fn bit_mask(&self) -> &[u8] {
        &self.bit_mask
    }

    /// Side node count of the full proof
    pub const fn num_side_nodes(&self) -> usize {
        self.num_side_nodes
    }

    /// Restore the omitted placeholders
    pub fn decompact(&self) -> Result<SparseMerkleProof<H>, ProofError> {
        let depth = TreeHasher::<H>::depth();
        let size = TreeHasher::<H>::path_size();
        let num_side_nodes = self.num_side_nodes;

        if num_side_nodes > depth {
            return Err(ProofError::TooManySideNodes { count: num_side_nodes, depth });
        }
        if self.bit_mask.len() != num_side_nodes.div_ceil(8)
            || (num_side_nodes..self.bit_mask.len() * 8).any(|i| is_right(&self.bit_mask, i))
        {
            return Err(ProofError::BitMask { num_side_nodes });
        }

        let placeholders = (0..num_side_nodes).filter(|i| is_right(&self.bit_mask, *i)).count();
        let expected = num_side_nodes - placeholders;
        if self.side_nodes.len() != expected {
            return Err(ProofError::SideNodeCount { actual: self.side_nodes.len(), expected });
        }

        let mut listed = self.side_nodes.iter();
        let side_nodes = (0..num_side_nodes)
            .map(|i| {
                if is_right(&self.bit_mask, i) {
                    vec![0u8; size]
                } else {
                    listed.next().cloned().unwrap_or_default()
                }
            })
            .collect();

        SparseMerkleProof::new(side_nodes, self.non_membership_leaf.clone(), self.sibling_data.clone())
    }
}

/// Serialized shape of a [`SparseMerkleProof`]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofWire {
    /// Side nodes, leaf level first
    pub side_nodes: Vec<HexBytes>,
    /// Occupying leaf of a non-membership proof
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_membership_leaf_data: Option<LeafData>,
    /// Preimage of the lowest side node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sibling_data: Option<HexBytes>,
}

impl<H: Hasher> TryFrom<ProofWire> for SparseMerkleProof<H> {
    type Error = ProofError;

    fn try_from(wire: ProofWire) -> Result<Self, Self::Error> {
        Self::new(
            wire.side_nodes.into_iter().map(Vec::from).collect(),
            wire.non_membership_leaf_data,
            wire.sibling_data.map(Vec::from),
        )
    }
}

impl<H> From<SparseMerkleProof<H>> for ProofWire {
    fn from(proof: SparseMerkleProof<H>) -> Self {
        Self {
            side_nodes: proof.side_nodes.into_iter().map(HexBytes).collect(),
            non_membership_leaf_data: proof.non_membership_leaf,
            sibling_data: proof.sibling_data.map(HexBytes),
        }
    }
}

/// Serialized shape of a [`SparseCompactMerkleProof`]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactProofWire {
    /// Non-placeholder side nodes, leaf level first
    pub side_nodes: Vec<HexBytes>,
    /// Occupying leaf of a non-membership proof
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_membership_leaf_data: Option<LeafData>,
    /// Placeholder positions
    pub bit_mask: HexBytes,
    /// Side node count of the full proof
    pub num_side_nodes: usize,
    /// Preimage of the lowest side node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sibling_data: Option<HexBytes>,
}

impl<H: Hasher> TryFrom<CompactProofWire> for SparseCompactMerkleProof<H> {
    type Error = ProofError;

    fn try_from(wire: CompactProofWire) -> Result<Self, Self::Error> {
        Self::new(
            wire.side_nodes.into_iter().map(Vec::from).collect(),
            wire.non_membership_leaf_data,
            wire.bit_mask.into(),
            wire.num_side_nodes,
            wire.sibling_data.map(Vec::from),
        )
    }
}

impl<H> From<SparseCompactMerkleProof<H>> for CompactProofWire {
    fn from(proof: SparseCompactMerkleProof<H>) -> Self {
        Self {
            side_nodes: proof.side_nodes.into_iter().map(HexBytes).collect(),
            non_membership_leaf_data: proof.non_membership_leaf,
            bit_mask: HexBytes(proof.bit_mask),
            num_side_nodes: proof.num_side_nodes,
            sibling_data: proof.sibling_data.map(HexBytes),
        }
    }
}
