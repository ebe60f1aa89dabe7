//! Canonical serialization of inputs and outputs.
//!
//! A coinbase input is encoded as an input whose previous output reference
//! is the null outpoint; the deserializer uses that marker to pick the
//! variant.

use std::io;

use crate::serialization::{SerializationError, WrenDeserialize, WrenSerialize};

use super::{CoinbaseData, Input, OutPoint, Output, Script};

impl WrenSerialize for Input {
    fn wren_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        match self {
            Input::PrevOut {
                outpoint,
                unlock_script,
                sequence,
            } => {
                outpoint.wren_serialize(&mut writer)?;
                unlock_script.wren_serialize(&mut writer)?;
                sequence.wren_serialize(&mut writer)?;
            }
            Input::Coinbase { data, sequence } => {
                OutPoint::null().wren_serialize(&mut writer)?;
                data.wren_serialize(&mut writer)?;
                sequence.wren_serialize(&mut writer)?;
            }
        }
        Ok(())
    }
}

impl WrenDeserialize for OutPoint {
    fn wren_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(OutPoint {
            hash: crate::transaction::Hash::wren_deserialize(&mut reader)?,
            index: u32::wren_deserialize(&mut reader)?,
        })
    }
}

impl WrenDeserialize for Input {
    fn wren_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let outpoint = OutPoint::wren_deserialize(&mut reader)?;
        if outpoint.is_null() {
            // Coinbase data shares the length-prefixed byte-string shape
            // of a script.
            let data = Script::wren_deserialize(&mut reader)?.0;
            let sequence = u32::wren_deserialize(&mut reader)?;
            Ok(Input::Coinbase {
                data: CoinbaseData(data),
                sequence,
            })
        } else {
            let unlock_script = Script::wren_deserialize(&mut reader)?;
            let sequence = u32::wren_deserialize(&mut reader)?;
            Ok(Input::PrevOut {
                outpoint,
                unlock_script,
                sequence,
            })
        }
    }
}

impl WrenDeserialize for Output {
    fn wren_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(Output {
            value: crate::amount::Amount::wren_deserialize(&mut reader)?,
            lock_script: Script::wren_deserialize(&mut reader)?,
        })
    }
}
