//! Transaction inputs, outputs, and the script/key material that locks
//! and unlocks them.
#![allow(clippy::unit_arg)]

mod address;
mod keys;
mod script;
mod serialize;

#[cfg(any(test, feature = "proptest-impl"))]
mod arbitrary;

pub use address::Address;
pub use keys::{hash160, pubkey_hash, verify_signature, KeyError, KeyPair};
pub use script::Script;

use serde::{Deserialize, Serialize};
use wren_serde_derive::WrenSerialize;

#[cfg(any(test, feature = "proptest-impl"))]
use proptest_derive::Arbitrary;

use crate::amount::{Amount, NonNegative};
use crate::compactint::CompactInt;
use crate::{transaction, WrenSerialize};

/// Arbitrary data inserted by miners into a coinbase transaction.
///
/// Invariant: between 2 and 100 bytes in an accepted block; the stateless
/// transaction check enforces the bound.
#[derive(Clone, Eq, PartialEq, Hash, Serialize, Deserialize, WrenSerialize)]
pub struct CoinbaseData(pub(crate) Vec<u8>);

impl CoinbaseData {
    pub fn new(data: Vec<u8>) -> CoinbaseData {
        CoinbaseData(data)
    }

    pub fn serialized_size(&self) -> usize {
        CompactInt::size(self.0.len()) + self.0.len()
    }
}

impl AsRef<[u8]> for CoinbaseData {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl std::fmt::Debug for CoinbaseData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let escaped = String::from_utf8(
            self.0
                .iter()
                .cloned()
                .flat_map(std::ascii::escape_default)
                .collect(),
        )
        .expect("ascii::escape_default produces utf8");
        f.debug_tuple("CoinbaseData").field(&escaped).finish()
    }
}

/// OutPoint
///
/// A particular transaction output reference.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, WrenSerialize)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(Arbitrary))]
pub struct OutPoint {
    /// References the transaction that contains the UTXO being spent.
    pub hash: transaction::Hash,

    /// Identifies which UTXO from that transaction is referenced; the
    /// first output is 0, etc.
    pub index: u32,
}

impl OutPoint {
    #[inline]
    pub const fn len() -> usize {
        36
    }

    /// The null reference carried by a coinbase input.
    pub fn null() -> OutPoint {
        OutPoint {
            hash: transaction::Hash([0; 32]),
            index: std::u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.hash.0 == [0; 32] && self.index == std::u32::MAX
    }
}

/// An input to a transaction.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Input {
    /// A reference to an output of a previous transaction.
    PrevOut {
        /// The previous output transaction reference.
        outpoint: OutPoint,
        /// The script that authorizes spending `outpoint`.
        unlock_script: Script,
        /// The sequence number for the input.
        sequence: u32,
    },
    /// New coins created by the block reward.
    Coinbase {
        /// Free data inserted by miners.
        data: CoinbaseData,
        /// The sequence number for the input.
        sequence: u32,
    },
}

impl Input {
    /// The sequence number of this input; `u32::MAX` marks it final.
    pub fn sequence(&self) -> u32 {
        match self {
            Input::PrevOut { sequence, .. } | Input::Coinbase { sequence, .. } => *sequence,
        }
    }

    pub fn is_final(&self) -> bool {
        self.sequence() == std::u32::MAX
    }

    /// The output this input consumes, unless it is a coinbase input.
    pub fn outpoint(&self) -> Option<OutPoint> {
        match self {
            Input::PrevOut { outpoint, .. } => Some(*outpoint),
            Input::Coinbase { .. } => None,
        }
    }

    /// Returns the serialized length (in bytes) of this input.
    pub fn serialized_size(&self) -> usize {
        match self {
            Input::PrevOut { unlock_script, .. } => {
                OutPoint::len() + unlock_script.serialized_size() + 4
            }
            Input::Coinbase { data, .. } => OutPoint::len() + data.serialized_size() + 4,
        }
    }
}

/// An output of a transaction.
///
/// The most fundamental building block of a transaction is a transaction
/// output -- the coins you own in your "wallet" are in fact a subset of
/// unspent transaction outputs (or "UTXO"s) of the global UTXO set.
///
/// UTXOs are indivisible, discrete units of value which can only be
/// consumed in their entirety. Thus, if I want to send you 1 coin and I
/// only own one UTXO worth 2 coins, I would construct a transaction that
/// spends my UTXO and sends 1 coin to you and 1 coin back to me (just like
/// receiving change).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, WrenSerialize)]
pub struct Output {
    /// Transaction value.
    pub value: Amount<NonNegative>,

    /// The lock script defines the conditions under which this output can
    /// be spent.
    pub lock_script: Script,
}

impl Output {
    /// Returns the serialized length (in bytes) of this output.
    pub fn serialized_size(&self) -> usize {
        8 + self.lock_script.serialized_size()
    }
}
