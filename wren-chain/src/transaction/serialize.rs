//! Deserialization of transactions, with txid caching.

use std::{io, sync::Arc};

use crate::cached::Cached;
use crate::serialization::{SerializationError, WrenDeserialize, WrenSerialize};

use super::{Hash, LockTime, Transaction};
use crate::transparent;

/// The maximum size of a transaction, in bytes.
pub const MAX_TX_SIZE: u64 = 1_000_000;

/// Deserializes a transaction, calculating and caching its txid.
impl WrenDeserialize for Transaction {
    fn wren_deserialize<R: std::io::Read>(src: R) -> Result<Self, SerializationError> {
        // Cap reads at one whole transaction to protect against DOS attacks.
        let mut src = src.take(MAX_TX_SIZE);
        let version = i32::wren_deserialize(&mut src)?;
        let inputs = <Vec<transparent::Input>>::wren_deserialize(&mut src)?;
        let outputs = <Vec<transparent::Output>>::wren_deserialize(&mut src)?;
        let lock_time = LockTime::wren_deserialize(&mut src)?;
        let mut tx = Transaction {
            version,
            inputs,
            outputs,
            lock_time,
            hash: Cached::new(),
        };
        // Calculate and cache the txid.
        let own_hash = Hash::from(&tx);
        tx.hash = Cached::from(own_hash);
        Ok(tx)
    }
}

impl<T> WrenDeserialize for Arc<T>
where
    T: WrenDeserialize,
{
    fn wren_deserialize<R: io::Read>(reader: R) -> Result<Self, SerializationError> {
        Ok(Arc::new(T::wren_deserialize(reader)?))
    }
}

impl<T> WrenSerialize for Arc<T>
where
    T: WrenSerialize,
{
    fn wren_serialize<W: io::Write>(&self, writer: W) -> Result<(), io::Error> {
        T::wren_serialize(self, writer)
    }
}
