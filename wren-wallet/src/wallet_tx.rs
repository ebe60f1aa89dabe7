//! Wallet transaction records.

use std::io;

use chrono::{DateTime, Utc};

use wren_chain::block::{self, merkle, Block};
use wren_chain::serialization::{SerializationError, WrenDeserialize, WrenSerialize};
use wren_chain::transaction::{self, Transaction};
use wren_consensus::parameters::COINBASE_MATURITY;
use wren_consensus::Chain;

/// A transaction plus the merkle branch linking it to a block, so that a
/// holder can verify inclusion without the whole chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleTx {
    pub tx: Transaction,
    /// The containing block, or zero when not (yet) mined.
    pub hash_block: block::Hash,
    pub merkle_branch: Vec<transaction::Hash>,
    /// Position of the transaction in its block, or -1.
    pub index: i32,
}

impl MerkleTx {
    pub fn new(tx: Transaction) -> MerkleTx {
        MerkleTx {
            tx,
            hash_block: block::Hash::zero(),
            merkle_branch: Vec::new(),
            index: -1,
        }
    }

    /// Fill in the containing block and branch. Returns the transaction
    /// index in the block, or -1 if it isn't there.
    pub fn set_merkle_branch(&mut self, block: &Block) -> i32 {
        let txid = self.tx.hash();
        let hashes: Vec<transaction::Hash> =
            block.transactions.iter().map(|tx| tx.hash()).collect();
        match hashes.iter().position(|hash| *hash == txid) {
            Some(index) => {
                self.hash_block = block.hash();
                self.merkle_branch = merkle::branch(&hashes, index);
                self.index = index as i32;
                self.index
            }
            None => {
                self.hash_block = block::Hash::zero();
                self.merkle_branch.clear();
                self.index = -1;
                -1
            }
        }
    }

    /// Verify the stored branch against a claimed merkle root.
    pub fn branch_commits_to(&self, root: merkle::Root) -> bool {
        if self.index < 0 {
            return false;
        }
        block::check_merkle_branch(
            self.tx.hash(),
            &self.merkle_branch,
            self.index as usize,
            root,
        )
    }

    /// Confirmations of the containing block, or 0 when off the main
    /// chain.
    pub fn depth_in_main_chain(&self, chain: &Chain) -> u32 {
        if self.hash_block.is_zero() {
            return 0;
        }
        chain.depth_in_main_chain(&self.hash_block).unwrap_or(0)
    }

    pub fn is_in_main_chain(&self, chain: &Chain) -> bool {
        self.depth_in_main_chain(chain) > 0
    }

    /// How many more confirmations before a coinbase's value is
    /// spendable. Zero for ordinary transactions.
    pub fn blocks_to_maturity(&self, chain: &Chain) -> u32 {
        if !self.tx.is_coinbase() {
            return 0;
        }
        COINBASE_MATURITY.saturating_sub(self.depth_in_main_chain(chain))
    }
}

impl WrenSerialize for MerkleTx {
    fn wren_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        self.tx.wren_serialize(&mut writer)?;
        self.hash_block.wren_serialize(&mut writer)?;
        self.merkle_branch.wren_serialize(&mut writer)?;
        self.index.wren_serialize(&mut writer)
    }
}

impl WrenDeserialize for MerkleTx {
    fn wren_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(MerkleTx {
            tx: Transaction::wren_deserialize(&mut reader)?,
            hash_block: block::Hash::wren_deserialize(&mut reader)?,
            merkle_branch: Vec::<transaction::Hash>::wren_deserialize(&mut reader)?,
            index: i32::wren_deserialize(&mut reader)?,
        })
    }
}

/// A transaction with the additional bookkeeping only its owner cares
/// about, including the supporting previous transactions needed to link
/// it to the chain without a full scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletTx {
    pub merkle: MerkleTx,
    /// Unrecorded ancestors a third party would need for verification.
    pub vtx_prev: Vec<MerkleTx>,
    pub time_received: DateTime<Utc>,
    /// Whether this wallet created the transaction.
    pub from_me: bool,
    /// Whether the owned outputs of this transaction have been consumed
    /// by a later spend.
    pub spent: bool,
}

impl WalletTx {
    pub fn new(tx: Transaction) -> WalletTx {
        WalletTx {
            merkle: MerkleTx::new(tx),
            vtx_prev: Vec::new(),
            time_received: Utc::now(),
            from_me: false,
            spent: false,
        }
    }

    pub fn tx(&self) -> &Transaction {
        &self.merkle.tx
    }

    pub fn txid(&self) -> transaction::Hash {
        self.merkle.tx.hash()
    }
}

impl WrenSerialize for WalletTx {
    fn wren_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        self.merkle.wren_serialize(&mut writer)?;
        self.vtx_prev.wren_serialize(&mut writer)?;
        self.time_received.wren_serialize(&mut writer)?;
        self.from_me.wren_serialize(&mut writer)?;
        self.spent.wren_serialize(&mut writer)
    }
}

impl WrenDeserialize for WalletTx {
    fn wren_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(WalletTx {
            merkle: MerkleTx::wren_deserialize(&mut reader)?,
            vtx_prev: Vec::<MerkleTx>::wren_deserialize(&mut reader)?,
            time_received: <DateTime<Utc>>::wren_deserialize(&mut reader)?,
            from_me: bool::wren_deserialize(&mut reader)?,
            spent: bool::wren_deserialize(&mut reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use wren_chain::parameters::{genesis_block, Network};

    use super::*;

    #[test]
    fn merkle_branch_links_to_the_block() {
        wren_test::init();

        let block = genesis_block(Network::Regtest);
        let mut merkle_tx = MerkleTx::new(Transaction::clone(&block.transactions[0]));

        assert_eq!(merkle_tx.set_merkle_branch(&block), 0);
        assert!(merkle_tx.branch_commits_to(block.header.merkle_root));
        assert!(!merkle_tx.branch_commits_to(merkle::Root([7; 32])));

        // A transaction missing from the block gets no branch.
        let foreign = Transaction::clone(&genesis_block(Network::Mainnet).transactions[0]);
        let mut absent = MerkleTx::new(foreign);
        assert_eq!(absent.set_merkle_branch(&block), -1);
        assert!(absent.hash_block.is_zero());
    }

    #[test]
    fn wallet_tx_roundtrip() {
        wren_test::init();

        let block = genesis_block(Network::Regtest);
        let mut wtx = WalletTx::new(Transaction::clone(&block.transactions[0]));
        wtx.merkle.set_merkle_branch(&block);
        wtx.from_me = true;

        let bytes = wtx.wren_serialize_to_vec().unwrap();
        let other = WalletTx::wren_deserialize(&bytes[..]).unwrap();
        assert_eq!(wtx.txid(), other.txid());
        assert_eq!(other.merkle.index, 0);
        assert_eq!(other.from_me, true);
        assert_eq!(other.spent, false);
    }
}
