use serde::{Deserialize, Serialize};

#[cfg(any(test, feature = "proptest-impl"))]
use proptest_derive::Arbitrary;

use crate::{SerializationError, WrenDeserialize, WrenSerialize};

/// A transaction lock time: the earliest chain height at which the
/// transaction may be mined. Zero means the transaction is never locked.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(Arbitrary))]
pub struct LockTime(pub u32);

impl LockTime {
    /// The lock time of transactions that take effect immediately.
    pub fn unlocked() -> LockTime {
        LockTime(0)
    }
}

impl WrenSerialize for LockTime {
    fn wren_serialize<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error> {
        self.0.wren_serialize(target)
    }
}

impl WrenDeserialize for LockTime {
    fn wren_deserialize<R: std::io::Read>(reader: R) -> Result<Self, SerializationError> {
        Ok(LockTime(u32::wren_deserialize(reader)?))
    }
}
