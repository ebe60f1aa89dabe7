//! The pool of validated, unconfirmed transactions.
//!
//! Admission logic lives on [`crate::Chain`], which owns the pool; this
//! module is the container: transactions keyed by txid, plus a reverse
//! `prevout → spending txid` index that makes conflict checks cheap.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use wren_chain::transaction::{self, Transaction};
use wren_chain::transparent::OutPoint;

#[derive(Debug, Default)]
pub struct Mempool {
    txs: HashMap<transaction::Hash, Arc<Transaction>>,
    by_prevout: HashMap<OutPoint, transaction::Hash>,
    /// Bumped on every change, so the miner and relay collaborators can
    /// cheaply notice new work.
    updates: u64,
}

impl Mempool {
    pub fn new() -> Mempool {
        Mempool::default()
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    pub fn contains(&self, txid: &transaction::Hash) -> bool {
        self.txs.contains_key(txid)
    }

    pub fn get(&self, txid: &transaction::Hash) -> Option<&Arc<Transaction>> {
        self.txs.get(txid)
    }

    /// The pool transaction already spending `outpoint`, if any.
    pub fn conflict(&self, outpoint: &OutPoint) -> Option<&transaction::Hash> {
        self.by_prevout.get(outpoint)
    }

    pub fn transactions(&self) -> impl Iterator<Item = &Arc<Transaction>> {
        self.txs.values()
    }

    /// How many times the pool has changed since startup.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Insert a transaction the caller has already validated (or chosen
    /// to trust, as with transactions resurrected by a reorg).
    pub fn insert(&mut self, tx: Arc<Transaction>) {
        let txid = tx.hash();
        for input in tx.inputs.iter() {
            if let Some(outpoint) = input.outpoint() {
                self.by_prevout.insert(outpoint, txid);
            }
        }
        self.txs.insert(txid, tx);
        self.updates += 1;
        trace!(%txid, pool_size = self.txs.len(), "mempool insert");
    }

    /// Remove a transaction (because it was mined or displaced).
    pub fn remove(&mut self, txid: &transaction::Hash) -> Option<Arc<Transaction>> {
        let tx = self.txs.remove(txid)?;
        for input in tx.inputs.iter() {
            if let Some(outpoint) = input.outpoint() {
                if self.by_prevout.get(&outpoint) == Some(txid) {
                    self.by_prevout.remove(&outpoint);
                }
            }
        }
        self.updates += 1;
        trace!(%txid, pool_size = self.txs.len(), "mempool remove");
        Some(tx)
    }
}

#[cfg(test)]
mod tests {
    use wren_chain::transaction::LockTime;
    use wren_chain::transparent::{Input, Script};

    use super::*;

    fn spend(outpoint: OutPoint) -> Arc<Transaction> {
        Arc::new(Transaction::new(
            1,
            vec![Input::PrevOut {
                outpoint,
                unlock_script: Script::new(vec![]),
                sequence: std::u32::MAX,
            }],
            vec![wren_chain::transparent::Output {
                value: std::convert::TryFrom::try_from(1i64).unwrap(),
                lock_script: Script::new(vec![]),
            }],
            LockTime::unlocked(),
        ))
    }

    #[test]
    fn reverse_index_tracks_inserts_and_removes() {
        let outpoint = OutPoint {
            hash: transaction::Hash([1; 32]),
            index: 0,
        };
        let tx = spend(outpoint);
        let txid = tx.hash();

        let mut pool = Mempool::new();
        pool.insert(tx);
        assert!(pool.contains(&txid));
        assert_eq!(pool.conflict(&outpoint), Some(&txid));

        pool.remove(&txid);
        assert!(!pool.contains(&txid));
        assert_eq!(pool.conflict(&outpoint), None);
        assert_eq!(pool.updates(), 2);
    }
}
