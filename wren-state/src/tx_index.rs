//! The per-transaction index records that make up the spent-output
//! (UTXO) view.

use serde::{Deserialize, Serialize};
use wren_serde_derive::{WrenDeserialize, WrenSerialize};

use wren_chain::{SerializationError, WrenDeserialize, WrenSerialize};

/// The location of a serialized transaction inside the block files:
/// which file, where its block's record starts, and where the
/// transaction itself starts.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, WrenSerialize, WrenDeserialize)]
pub struct DiskTxPos {
    pub file: u32,
    pub block_pos: u32,
    pub tx_pos: u32,
}

impl DiskTxPos {
    pub fn new(file: u32, block_pos: u32, tx_pos: u32) -> DiskTxPos {
        DiskTxPos {
            file,
            block_pos,
            tx_pos,
        }
    }

    /// The sentinel meaning "not on disk"; a spent-vector entry holding
    /// it marks the output unspent.
    pub fn null() -> DiskTxPos {
        DiskTxPos {
            file: std::u32::MAX,
            block_pos: 0,
            tx_pos: 0,
        }
    }

    pub fn is_null(&self) -> bool {
        self.file == std::u32::MAX
    }
}

impl std::fmt::Display for DiskTxPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else {
            write!(
                f,
                "(file={}, block_pos={}, tx_pos={})",
                self.file, self.block_pos, self.tx_pos
            )
        }
    }
}

/// A chain-index record holding the disk location of a transaction and
/// the locations of the transactions that spend its outputs.
///
/// The spent vector is really only used as a flag, but having the
/// location of each spender is very helpful for debugging.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, WrenSerialize, WrenDeserialize)]
pub struct TxIndex {
    /// Where this transaction lives on disk.
    pub pos: DiskTxPos,
    /// One entry per output: the spender's location, or the null
    /// sentinel while the output is unspent. Invariant: the length
    /// equals the transaction's output count.
    pub spent: Vec<DiskTxPos>,
}

impl TxIndex {
    /// A fresh record for a transaction with `outputs` outputs, all
    /// unspent.
    pub fn new(pos: DiskTxPos, outputs: usize) -> TxIndex {
        TxIndex {
            pos,
            spent: vec![DiskTxPos::null(); outputs],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let index = TxIndex {
            pos: DiskTxPos::new(1, 8, 89),
            spent: vec![DiskTxPos::null(), DiskTxPos::new(2, 8, 150)],
        };
        let bytes = index.wren_serialize_to_vec().unwrap();
        let other = TxIndex::wren_deserialize(&bytes[..]).unwrap();
        assert_eq!(index, other);
    }

    #[test]
    fn null_sentinel() {
        assert!(DiskTxPos::null().is_null());
        assert!(!DiskTxPos::new(0, 0, 0).is_null());
        let index = TxIndex::new(DiskTxPos::new(0, 8, 89), 3);
        assert_eq!(index.spent.len(), 3);
        assert!(index.spent.iter().all(DiskTxPos::is_null));
    }
}
