#![allow(clippy::unit_arg)]
use std::{
    fmt,
    io::{self, Read},
};

use serde::{Deserialize, Serialize};

use crate::{
    compactint::CompactInt,
    serialization::{SerializationError, WrenDeserialize, WrenSerialize},
};

/// An encoding of a Wren script.
#[derive(Clone, Default, Eq, PartialEq, Serialize, Deserialize, Hash)]
#[cfg_attr(
    any(test, feature = "proptest-impl"),
    derive(proptest_derive::Arbitrary)
)]
pub struct Script(pub Vec<u8>);

impl Script {
    pub fn new(bytes: Vec<u8>) -> Script {
        Script(bytes)
    }

    pub fn serialized_size(&self) -> usize {
        CompactInt::size(self.0.len()) + self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl AsRef<[u8]> for Script {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Script")
            .field(&hex::encode(&self.0))
            .finish()
    }
}

impl WrenSerialize for Script {
    fn wren_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        CompactInt::from(self.0.len()).wren_serialize(&mut writer)?;
        writer.write_all(&self.0[..])?;
        Ok(())
    }
}

impl WrenDeserialize for Script {
    fn wren_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let len = CompactInt::wren_deserialize(&mut reader)?.value();
        let mut bytes = Vec::new();
        (&mut reader).take(len).read_to_end(&mut bytes)?;
        if bytes.len() as u64 != len {
            return Err(SerializationError::Parse("script shorter than its prefix"));
        }
        Ok(Script(bytes))
    }
}

#[cfg(test)]
mod proptests {
    use std::io::Cursor;

    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn script_roundtrip(script in any::<Script>()) {
            wren_test::init();

            let mut bytes = Cursor::new(Vec::new());
            script.wren_serialize(&mut bytes)?;

            bytes.set_position(0);
            let other_script = Script::wren_deserialize(&mut bytes)?;

            prop_assert_eq![script, other_script];
        }
    }
}
