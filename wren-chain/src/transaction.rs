//! Transactions and transaction-related structures.

use serde::{Deserialize, Serialize};
use wren_serde_derive::WrenSerialize;

use crate::amount::{self, Amount, NonNegative};
use crate::block::Height;
use crate::{cached::Cached, compactint::CompactInt};
use crate::{transparent, WrenSerialize};

mod hash;
mod lock_time;
mod serialize;

#[cfg(any(test, feature = "proptest-impl"))]
mod arbitrary;
#[cfg(test)]
mod tests;

pub use hash::Hash;
pub use lock_time::LockTime;
pub use serialize::MAX_TX_SIZE;

/// A Wren transaction.
///
/// A transaction is an encoded data structure that facilitates the transfer
/// of value between two public key addresses. Everything is designed to
/// ensure that transactions can be created, propagated on the network,
/// validated, and finally added to the global ledger of transactions (the
/// blockchain).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, WrenSerialize)]
pub struct Transaction {
    /// The transaction version.
    pub version: i32,
    /// The transaction inputs.
    pub inputs: Vec<transparent::Input>,
    /// The transaction outputs.
    pub outputs: Vec<transparent::Output>,
    /// The transaction lock time.
    pub lock_time: LockTime,
    hash: Cached<Hash>,
}

impl Transaction {
    pub fn new(
        version: i32,
        inputs: Vec<transparent::Input>,
        outputs: Vec<transparent::Output>,
        lock_time: LockTime,
    ) -> Transaction {
        Transaction {
            version,
            inputs,
            outputs,
            lock_time,
            hash: Cached::new(),
        }
    }

    /// Get the hash of this transaction.
    pub fn hash(&self) -> Hash {
        // If we have a cached version, just return that
        if let Some(hash) = self.hash.value() {
            return hash;
        }
        // Otherwise, serialize the tx to calculate and return the hash
        Hash::from(self)
    }

    pub fn contains_coinbase_input(&self) -> bool {
        self.inputs
            .iter()
            .any(|input| matches!(input, transparent::Input::Coinbase { .. }))
    }

    /// Returns `true` if this transaction is a coinbase transaction.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1
            && matches!(
                self.inputs.get(0),
                Some(transparent::Input::Coinbase { .. })
            )
    }

    /// A transaction is final once its lock time is in the past or every
    /// input has opted out of replacement.
    pub fn is_final(&self, height: Height) -> bool {
        if self.lock_time == LockTime::unlocked() || self.lock_time.0 < height.0 {
            return true;
        }
        self.inputs.iter().all(|input| input.is_final())
    }

    /// The sum of this transaction's output values.
    pub fn value_out(&self) -> Result<Amount<NonNegative>, amount::Error> {
        Amount::sum(self.outputs.iter().map(|output| output.value))
    }

    /// Returns the serialized length (in bytes) of this transaction.
    pub fn serialized_size(&self) -> usize {
        let mut size = 4 + CompactInt::size(self.inputs.len());
        for input in self.inputs.iter() {
            size += input.serialized_size();
        }
        size += CompactInt::size(self.outputs.len());
        for output in self.outputs.iter() {
            size += output.serialized_size();
        }
        size + 4
    }
}
