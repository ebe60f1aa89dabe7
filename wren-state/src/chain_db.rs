//! The typed surface of the chain-index table.
//!
//! One table holds every persisted chain record, keyed by a type prefix:
//!
//! | Key | Value |
//! |---|---|
//! | `("tx", txid)` | [`TxIndex`] |
//! | `("blockindex", blockhash)` | [`DiskBlockIndex`] |
//! | `"hashBestChain"` | 32-byte hash |
//! | `"version"` | i32 |

use tracing::debug;

use wren_chain::block;
use wren_chain::transaction::{self, Transaction};
use wren_chain::WrenDeserialize;

use crate::block_index::DiskBlockIndex;
use crate::store::{Env, StoreError, Table};
use crate::tx_index::{DiskTxPos, TxIndex};

/// The record format version written to fresh chain databases.
pub const DB_VERSION: i32 = 1;

const TX_PREFIX: &str = "tx";
const BLOCK_INDEX_PREFIX: &str = "blockindex";
const BEST_CHAIN_KEY: &str = "hashBestChain";
const VERSION_KEY: &str = "version";

/// A handle on the chain-index table.
#[derive(Debug)]
pub struct ChainDb {
    table: Table,
}

fn tx_key(txid: &transaction::Hash) -> (String, transaction::Hash) {
    (TX_PREFIX.to_string(), *txid)
}

fn block_index_key(hash: &block::Hash) -> (String, block::Hash) {
    (BLOCK_INDEX_PREFIX.to_string(), *hash)
}

impl ChainDb {
    /// Open the chain-index table, stamping the record version on first
    /// creation.
    pub fn open(env: &Env) -> Result<ChainDb, StoreError> {
        let mut table = env.open_table("blkindex")?;
        table.write_if_absent(&VERSION_KEY.to_string(), &DB_VERSION)?;
        Ok(ChainDb { table })
    }

    pub fn read_version(&self) -> Result<Option<i32>, StoreError> {
        self.table.read(&VERSION_KEY.to_string())
    }

    pub fn read_tx_index(&self, txid: &transaction::Hash) -> Result<Option<TxIndex>, StoreError> {
        self.table.read(&tx_key(txid))
    }

    pub fn update_tx_index(
        &mut self,
        txid: &transaction::Hash,
        tx_index: &TxIndex,
    ) -> Result<(), StoreError> {
        self.table.write(&tx_key(txid), tx_index)
    }

    /// Seed the index entry for a newly connected transaction.
    ///
    /// Always overwrites any prior entry; callers rely on this being
    /// idempotent.
    pub fn add_tx_index(&mut self, tx: &Transaction, pos: &DiskTxPos) -> Result<(), StoreError> {
        let tx_index = TxIndex::new(*pos, tx.outputs.len());
        self.table.write(&tx_key(&tx.hash()), &tx_index)
    }

    pub fn erase_tx_index(&mut self, tx: &Transaction) -> Result<(), StoreError> {
        self.table.erase(&tx_key(&tx.hash()))
    }

    pub fn contains_tx(&self, txid: &transaction::Hash) -> Result<bool, StoreError> {
        self.table.exists(&tx_key(txid))
    }

    pub fn write_block_index(&mut self, record: &DiskBlockIndex) -> Result<(), StoreError> {
        self.table.write(&block_index_key(&record.hash()), record)
    }

    pub fn erase_block_index(&mut self, hash: &block::Hash) -> Result<(), StoreError> {
        self.table.erase(&block_index_key(hash))
    }

    pub fn read_hash_best_chain(&self) -> Result<Option<block::Hash>, StoreError> {
        self.table.read(&BEST_CHAIN_KEY.to_string())
    }

    pub fn write_hash_best_chain(&mut self, hash: &block::Hash) -> Result<(), StoreError> {
        self.table.write(&BEST_CHAIN_KEY.to_string(), hash)
    }

    /// Scan every persisted block-index record via a positioned cursor.
    pub fn read_block_index_records(&self) -> Result<Vec<DiskBlockIndex>, StoreError> {
        let start = block_index_key(&block::Hash::zero());
        let prefix = wren_chain::WrenSerialize::wren_serialize_to_vec(
            &BLOCK_INDEX_PREFIX.to_string(),
        )?;

        let mut records = Vec::new();
        for entry in self.table.cursor_from(&start)? {
            let (key, value) = entry?;
            if !key.starts_with(&prefix) {
                break;
            }
            records.push(DiskBlockIndex::wren_deserialize(&value[..])?);
        }
        debug!(count = records.len(), "scanned block index records");
        Ok(records)
    }

    /// Open a nested write scope over the chain table.
    pub fn txn_begin(&mut self) {
        self.table.txn_begin()
    }

    pub fn txn_commit(&mut self) -> Result<(), StoreError> {
        self.table.txn_commit()
    }

    pub fn txn_abort(&mut self) -> Result<(), StoreError> {
        self.table.txn_abort()
    }

    pub fn in_scope(&self) -> bool {
        self.table.in_scope()
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use wren_chain::parameters::{genesis_block, Network};

    use crate::block_index::{BlockIndex, BLOCK_INDEX_VERSION};
    use crate::Config;

    use super::*;

    fn test_db() -> (TempDir, ChainDb) {
        let dir = TempDir::new("wren-chain-db-test").unwrap();
        let config = Config {
            cache_dir: dir.path().to_path_buf(),
            ephemeral: false,
        };
        let env = Env::open(&config, Network::Regtest).unwrap();
        let db = ChainDb::open(&env).unwrap();
        (dir, db)
    }

    #[test]
    fn version_is_stamped_once() {
        let (_dir, db) = test_db();
        assert_eq!(db.read_version().unwrap(), Some(DB_VERSION));
    }

    #[test]
    fn tx_index_lifecycle() {
        let (_dir, mut db) = test_db();
        let genesis = genesis_block(Network::Regtest);
        let coinbase = &genesis.transactions[0];

        assert!(!db.contains_tx(&coinbase.hash()).unwrap());

        let pos = DiskTxPos::new(0, 8, 89);
        db.add_tx_index(coinbase, &pos).unwrap();
        assert!(db.contains_tx(&coinbase.hash()).unwrap());

        let index = db.read_tx_index(&coinbase.hash()).unwrap().unwrap();
        assert_eq!(index.pos, pos);
        assert_eq!(index.spent.len(), coinbase.outputs.len());

        // Re-adding resets the record; the operation is idempotent.
        let mut spent = index.clone();
        spent.spent[0] = DiskTxPos::new(1, 8, 89);
        db.update_tx_index(&coinbase.hash(), &spent).unwrap();
        db.add_tx_index(coinbase, &pos).unwrap();
        let fresh = db.read_tx_index(&coinbase.hash()).unwrap().unwrap();
        assert!(fresh.spent[0].is_null());

        db.erase_tx_index(coinbase).unwrap();
        assert!(!db.contains_tx(&coinbase.hash()).unwrap());
    }

    #[test]
    fn block_index_scan_sees_only_block_records() {
        let (_dir, mut db) = test_db();
        let genesis = genesis_block(Network::Regtest);

        // Neighboring key types must not leak into the scan.
        db.add_tx_index(&genesis.transactions[0], &DiskTxPos::new(0, 8, 89))
            .unwrap();
        db.write_hash_best_chain(&genesis.hash()).unwrap();

        let mut index = BlockIndex::new();
        let id = index.insert(genesis.header, 0, 8).unwrap();
        db.write_block_index(&index.to_disk(id)).unwrap();

        let records = db.read_block_index_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].version, BLOCK_INDEX_VERSION);
        assert_eq!(records[0].hash(), genesis.hash());

        assert_eq!(db.read_hash_best_chain().unwrap(), Some(genesis.hash()));
    }
}
