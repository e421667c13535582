//! Hash engines and the tree hashing rules built on top of them

use std::fmt::Debug;

use sha2::{Digest, Sha256};
use tiny_keccak::{Hasher as _, Keccak};

/// Prefix of every leaf node preimage
pub const LEAF_PREFIX: u8 = 0x00;

/// Prefix of every internal node preimage
pub const NODE_PREFIX: u8 = 0x01;

/// A cryptographic hash function producing fixed-length digests.
///
/// Implementations are stateless and may be shared freely between trees.
pub trait Hasher: Clone + Debug + Default + Send + Sync + 'static {
    /// Digest length in bytes. The tree depth is `8 * OUTPUT_SIZE`.
    const OUTPUT_SIZE: usize;

    /// Hash `data` into a digest of exactly [`Self::OUTPUT_SIZE`] bytes.
    fn digest(&self, data: &[u8]) -> Vec<u8>;
}

/// Keccak256 hasher
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Keccak256Hasher;

impl Hasher for Keccak256Hasher {
    const OUTPUT_SIZE: usize = 32;

    fn digest(&self, data: &[u8]) -> Vec<u8> {
        let mut hasher = Keccak::v256();
        hasher.update(data);
        let mut output = [0u8; 32];
        hasher.finalize(&mut output);
        output.to_vec()
    }
}

/// SHA-256 hasher
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sha256Hasher;

impl Hasher for Sha256Hasher {
    const OUTPUT_SIZE: usize = 32;

    fn digest(&self, data: &[u8]) -> Vec<u8> {
        Sha256::digest(data).to_vec()
    }
}

/// Applies the tree's hashing rules on top of a [`Hasher`].
///
/// Leaves hash `LEAF_PREFIX ‖ path ‖ value`, internal nodes hash
/// `NODE_PREFIX ‖ left ‖ right`, and an empty subtree is represented by an
/// all-zero digest (the placeholder).
#[derive(Clone, Debug)]
pub struct TreeHasher<H> {
    hasher: H,
    placeholder: Vec<u8>,
}

impl<H: Hasher> TreeHasher<H> {
    /// Wrap a hash engine
    pub fn new(hasher: H) -> Self {
        Self {
            hasher,
            placeholder: vec![0u8; H::OUTPUT_SIZE],
        }
    }

    /// Number of levels between the root and the deepest possible leaf
    pub const fn depth() -> usize {
        H::OUTPUT_SIZE * 8
    }

    /// Width in bytes of every digest and path
    pub const fn path_size() -> usize {
        H::OUTPUT_SIZE
    }

    /// Hash arbitrary bytes
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        self.hasher.digest(data)
    }

    /// Derive the bit path of a key
    pub fn path(&self, key: &[u8]) -> Vec<u8> {
        self.hasher.digest(key)
    }

    /// Hash of an empty subtree
    pub fn placeholder(&self) -> &[u8] {
        &self.placeholder
    }

    /// Whether `hash` is the empty-subtree placeholder
    pub fn is_placeholder(&self, hash: &[u8]) -> bool {
        hash == self.placeholder.as_slice()
    }

    /// Hash a leaf, returning its digest and preimage
    pub fn digest_leaf(&self, path: &[u8], value: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut data = Vec::with_capacity(1 + path.len() + value.len());
        data.push(LEAF_PREFIX);
        data.extend_from_slice(path);
        data.extend_from_slice(value);
        (self.hasher.digest(&data), data)
    }

    /// Hash an internal node, returning its digest and preimage
    pub fn digest_node(&self, left: &[u8], right: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut data = Vec::with_capacity(1 + left.len() + right.len());
        data.push(NODE_PREFIX);
        data.extend_from_slice(left);
        data.extend_from_slice(right);
        (self.hasher.digest(&data), data)
    }

    /// Whether a node preimage encodes a leaf
    pub fn is_leaf(&self, data: &[u8]) -> bool {
        data.first() == Some(&LEAF_PREFIX)
    }

    /// Split a leaf preimage into `(path, value)`
    pub fn parse_leaf<'a>(&self, data: &'a [u8]) -> Option<(&'a [u8], &'a [u8])> {
        let size = Self::path_size();
        if !self.is_leaf(data) || data.len() < 1 + size {
            return None;
        }
        Some((&data[1..1 + size], &data[1 + size..]))
    }

    /// Split an internal node preimage into `(left, right)`
    pub fn parse_node<'a>(&self, data: &'a [u8]) -> Option<(&'a [u8], &'a [u8])> {
        let size = Self::path_size();
        if data.first() != Some(&NODE_PREFIX) || data.len() != 1 + 2 * size {
            return None;
        }
        Some((&data[1..1 + size], &data[1 + size..]))
    }
}

impl<H: Hasher> Default for TreeHasher<H> {
    fn default() -> Self {
        Self::new(H::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_width() {
        assert_eq!(Keccak256Hasher.digest(b"abc").len(), Keccak256Hasher::OUTPUT_SIZE);
        assert_eq!(Sha256Hasher.digest(b"abc").len(), Sha256Hasher::OUTPUT_SIZE);
        assert_ne!(Keccak256Hasher.digest(b"abc"), Sha256Hasher.digest(b"abc"));
    }

    #[test]
    fn test_keccak_empty_input() {
        // keccak256("")
        assert_eq!(
            hex::encode(Keccak256Hasher.digest(&[])),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_leaf_round_trip() {
        let th = TreeHasher::new(Sha256Hasher);
        let path = th.path(b"key");
        let (hash, data) = th.digest_leaf(&path, b"value");

        assert!(th.is_leaf(&data));
        assert_eq!(th.digest(&data), hash);
        let (parsed_path, parsed_value) = th.parse_leaf(&data).unwrap();
        assert_eq!(parsed_path, path.as_slice());
        assert_eq!(parsed_value, b"value");
        assert!(th.parse_node(&data).is_none());
    }

    #[test]
    fn test_node_round_trip() {
        let th = TreeHasher::new(Keccak256Hasher);
        let left = [1u8; 32];
        let right = [2u8; 32];
        let (hash, data) = th.digest_node(&left, &right);

        assert!(!th.is_leaf(&data));
        assert_ne!(hash, th.placeholder());
        let (l, r) = th.parse_node(&data).unwrap();
        assert_eq!(l, left);
        assert_eq!(r, right);
        assert!(th.parse_leaf(&data).is_none());
    }

    #[test]
    fn test_default_placeholder_is_zero_digest() {
        assert_eq!(TreeHasher::<Keccak256Hasher>::default().placeholder(), [0u8; 32]);
        assert_eq!(TreeHasher::<Sha256Hasher>::default().placeholder(), [0u8; 32]);

        let th = TreeHasher::<Keccak256Hasher>::default();
        assert!(th.is_placeholder(TreeHasher::new(Keccak256Hasher).placeholder()));
    }

    #[test]
    fn test_parse_rejects_truncated() {
        let th = TreeHasher::new(Keccak256Hasher);
        assert!(th.parse_leaf(&[LEAF_PREFIX, 1, 2]).is_none());
        assert!(th.parse_node(&[NODE_PREFIX; 40]).is_none());
        assert!(th.parse_node(&[]).is_none());
    }

    #[test]
    fn test_depth() {
        assert_eq!(TreeHasher::<Keccak256Hasher>::depth(), 256);
    }
}
