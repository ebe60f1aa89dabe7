//! The binary hash tree of transaction identifiers.
//!
//! Layers are built bottom-up by hashing pairs of nodes with SHA-256d;
//! odd layers duplicate their last node. The root binds the block header
//! to the full transaction list, and a branch (the sibling hashes along
//! the path from a leaf to the root) lets a lightweight holder prove one
//! transaction's membership.

use std::{fmt, io, iter::FromIterator};

use serde::{Deserialize, Serialize};

#[cfg(any(test, feature = "proptest-impl"))]
use proptest_derive::Arbitrary;

use crate::serialization::sha256d;
use crate::transaction;
use crate::{SerializationError, WrenDeserialize, WrenSerialize};

/// The root of the transaction merkle tree.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(Arbitrary))]
pub struct Root(pub [u8; 32]);

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut reversed_bytes = self.0;
        reversed_bytes.reverse();
        f.write_str(&hex::encode(&reversed_bytes))
    }
}

impl fmt::Debug for Root {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut reversed_bytes = self.0;
        reversed_bytes.reverse();
        f.debug_tuple("merkle::Root")
            .field(&hex::encode(&reversed_bytes))
            .finish()
    }
}

impl std::str::FromStr for Root {
    type Err = SerializationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0; 32];
        if hex::decode_to_slice(s, &mut bytes[..]).is_err() {
            Err(SerializationError::Parse("hex decoding error"))
        } else {
            bytes.reverse();
            Ok(Root(bytes))
        }
    }
}

impl WrenSerialize for Root {
    fn wren_serialize<W: io::Write>(&self, target: W) -> Result<(), io::Error> {
        self.0.wren_serialize(target)
    }
}

impl WrenDeserialize for Root {
    fn wren_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(Root(<[u8; 32]>::wren_deserialize(&mut reader)?))
    }
}

fn hash_pair(left: &transaction::Hash, right: &transaction::Hash) -> transaction::Hash {
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(&left.0);
    data[32..].copy_from_slice(&right.0);
    transaction::Hash(sha256d::digest(&data))
}

/// Build the full tree as a flat vector of layers: leaves first, then each
/// parent layer, ending with the root. `vec[j..j+size]` is one layer.
fn build_tree(leaves: &[transaction::Hash]) -> Vec<transaction::Hash> {
    let mut tree = leaves.to_vec();
    let mut j = 0;
    let mut size = leaves.len();
    while size > 1 {
        let mut i = 0;
        while i < size {
            let i2 = std::cmp::min(i + 1, size - 1);
            let parent = hash_pair(&tree[j + i], &tree[j + i2]);
            tree.push(parent);
            i += 2;
        }
        j += size;
        size = (size + 1) / 2;
    }
    tree
}

impl FromIterator<transaction::Hash> for Root {
    fn from_iter<I>(hashes: I) -> Self
    where
        I: IntoIterator<Item = transaction::Hash>,
    {
        let leaves: Vec<transaction::Hash> = hashes.into_iter().collect();
        if leaves.is_empty() {
            return Root([0; 32]);
        }
        let tree = build_tree(&leaves);
        Root(tree.last().expect("non-empty leaves produce a root").0)
    }
}

/// The sibling hashes along the path from leaf `index` to the root.
pub fn branch(leaves: &[transaction::Hash], mut index: usize) -> Vec<transaction::Hash> {
    if leaves.is_empty() || index >= leaves.len() {
        return Vec::new();
    }
    let tree = build_tree(leaves);
    let mut result = Vec::new();
    let mut j = 0;
    let mut size = leaves.len();
    while size > 1 {
        let i = std::cmp::min(index ^ 1, size - 1);
        result.push(tree[j + i]);
        index >>= 1;
        j += size;
        size = (size + 1) / 2;
    }
    result
}

/// Fold a leaf up its branch, returning the root it commits to.
pub fn branch_root(
    leaf: transaction::Hash,
    branch: &[transaction::Hash],
    mut index: usize,
) -> Root {
    let mut hash = leaf;
    for otherside in branch {
        if index & 1 != 0 {
            hash = hash_pair(otherside, &hash);
        } else {
            hash = hash_pair(&hash, otherside);
        }
        index >>= 1;
    }
    Root(hash.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(byte: u8) -> transaction::Hash {
        transaction::Hash([byte; 32])
    }

    #[test]
    fn single_leaf_is_root() {
        let root: Root = vec![leaf(7)].into_iter().collect();
        assert_eq!(root.0, leaf(7).0);
    }

    #[test]
    fn odd_layer_duplicates_last() {
        // With three leaves, the last leaf pairs with itself.
        let leaves = vec![leaf(1), leaf(2), leaf(3)];
        let ab = hash_pair(&leaf(1), &leaf(2));
        let cc = hash_pair(&leaf(3), &leaf(3));
        let expected = hash_pair(&ab, &cc);

        let root: Root = leaves.into_iter().collect();
        assert_eq!(root.0, expected.0);
    }

    #[test]
    fn every_branch_commits_to_the_root() {
        for n in 1..=8 {
            let leaves: Vec<_> = (0..n).map(|i| leaf(i as u8)).collect();
            let root: Root = leaves.iter().cloned().collect();
            for i in 0..n {
                let branch = branch(&leaves, i);
                assert_eq!(
                    branch_root(leaves[i], &branch, i),
                    root,
                    "branch {} of {} must fold to the root",
                    i,
                    n
                );
            }
        }
    }

    #[test]
    fn tampered_branch_fails() {
        let leaves: Vec<_> = (0..4).map(|i| leaf(i as u8)).collect();
        let root: Root = leaves.iter().cloned().collect();
        let mut branch = branch(&leaves, 2);
        branch[0].0[0] ^= 1;
        assert_ne!(branch_root(leaves[2], &branch, 2), root);
    }
}
