//! Blocks and block-related structures (heights, headers, etc.)
#![allow(clippy::unit_arg)]

mod hash;
mod header;
mod height;
mod serialize;

pub mod merkle;

#[cfg(any(test, feature = "proptest-impl"))]
mod arbitrary;
#[cfg(test)]
mod tests;

use std::{convert::TryInto, fmt, io, sync::Arc};

use serde::{Deserialize, Serialize};
use wren_serde_derive::WrenSerialize;

use crate::compactint::CompactInt;
use crate::{fmt::DisplayToDebug, transaction::Transaction};
use crate::{SerializationError, WrenDeserialize, WrenSerialize};

pub use hash::Hash;
pub use header::{BlockTimeError, Header};
pub use height::Height;
pub use serialize::MAX_BLOCK_BYTES;

/// A Wren block, containing a header and a list of transactions.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, WrenSerialize)]
pub struct Block {
    /// The block header, containing block metadata.
    pub header: Header,
    /// The block transactions.
    pub transactions: Vec<Arc<Transaction>>,
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("hash", &DisplayToDebug(self.hash()))
            .field("transactions", &self.transactions.len())
            .finish()
    }
}

impl Block {
    /// Compute the hash of this block.
    pub fn hash(&self) -> Hash {
        Hash::from(self)
    }

    /// The first transaction, if it is a coinbase transaction.
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions
            .get(0)
            .filter(|tx| tx.is_coinbase())
            .map(|tx| tx.as_ref())
    }

    /// Recompute the merkle root of this block's transactions.
    pub fn merkle_root(&self) -> merkle::Root {
        self.transactions.iter().map(|tx| tx.hash()).collect()
    }

    /// The serialized length of this block, in bytes.
    pub fn serialized_size(&self) -> usize {
        let mut size = Header::len() + CompactInt::size(self.transactions.len());
        for tx in self.transactions.iter() {
            size += tx.serialized_size();
        }
        size
    }

    /// True for the record that `erase` writes over a dead block file entry.
    pub fn is_null(&self) -> bool {
        self.header.difficulty_threshold.bits() == 0 && self.transactions.is_empty()
    }

    /// A null block used to overwrite erased block file records.
    pub fn null() -> Block {
        Block {
            header: Header::null(),
            transactions: Vec::new(),
        }
    }
}

impl WrenDeserialize for Block {
    fn wren_deserialize<R: io::Read>(reader: R) -> Result<Self, SerializationError> {
        let mut reader = reader.take(MAX_BLOCK_BYTES);
        let header = Header::wren_deserialize(&mut reader)?;

        let tx_count = CompactInt::wren_deserialize(&mut reader)?.value();
        // Sanity check the claimed count: every transaction needs at least
        // one 36-byte input reference, so huge counts cannot be honest.
        if tx_count > MAX_BLOCK_BYTES / (36 * 4) {
            return Err(SerializationError::Parse(
                "block claims more transactions than could fit in its size cap",
            ));
        }
        let mut transactions =
            Vec::with_capacity(tx_count.try_into().expect("count fits after cap check"));
        for _ in 0..tx_count {
            transactions.push(<Arc<Transaction>>::wren_deserialize(&mut reader)?);
        }

        Ok(Block {
            header,
            transactions,
        })
    }
}

impl<'a> From<&'a Block> for Hash {
    fn from(block: &'a Block) -> Hash {
        (&block.header).into()
    }
}

/// Check that a merkle branch links `leaf` at position `index` to `root`.
pub fn check_merkle_branch(
    leaf: crate::transaction::Hash,
    branch: &[crate::transaction::Hash],
    index: usize,
    root: merkle::Root,
) -> bool {
    merkle::branch_root(leaf, branch, index) == root
}
