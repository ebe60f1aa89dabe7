//! The variable-length integer prefix used by the canonical encoding for
//! lengths: one byte below 253, otherwise a marker byte (253/254/255)
//! followed by 2, 4, or 8 little-endian bytes.

use byteorder::{LittleEndian, WriteBytesExt};

use crate::{SerializationError, WrenDeserialize, WrenSerialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactInt(u64);

impl CompactInt {
    pub fn new() -> CompactInt {
        CompactInt(0)
    }

    pub fn from(value: usize) -> CompactInt {
        CompactInt(value as u64)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// The encoded size, in bytes, of `value`'s length prefix.
    pub fn size(value: usize) -> usize {
        if value < 253 {
            1
        } else if value <= std::u16::MAX as usize {
            3
        } else if value <= std::u32::MAX as usize {
            5
        } else {
            9
        }
    }
}

impl Default for CompactInt {
    fn default() -> Self {
        CompactInt::new()
    }
}

impl WrenSerialize for CompactInt {
    fn wren_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        if self.value() < 253 {
            target.write_all(&[self.value() as u8])
        } else if self.value() <= std::u16::MAX as u64 {
            target.write_all(&[253])?;
            target.write_u16::<LittleEndian>(self.value() as u16)
        } else if self.value() <= std::u32::MAX as u64 {
            target.write_all(&[254])?;
            target.write_u32::<LittleEndian>(self.value() as u32)
        } else {
            target.write_all(&[255])?;
            target.write_u64::<LittleEndian>(self.value())
        }
    }
}

impl WrenDeserialize for CompactInt {
    fn wren_deserialize<R: std::io::Read>(
        mut target: R,
    ) -> Result<CompactInt, SerializationError> {
        let first = u8::wren_deserialize(&mut target)?;
        if first < 253 {
            Ok(CompactInt::from(first as usize))
        } else if first == 253 {
            Ok(CompactInt::from(
                u16::wren_deserialize(&mut target)? as usize
            ))
        } else if first == 254 {
            Ok(CompactInt::from(
                u32::wren_deserialize(&mut target)? as usize
            ))
        } else {
            Ok(CompactInt(u64::wren_deserialize(&mut target)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: u64) {
        let int = CompactInt(value);
        let bytes = int.wren_serialize_to_vec().unwrap();
        assert_eq!(bytes.len(), CompactInt::size(value as usize));
        let other = CompactInt::wren_deserialize(&bytes[..]).unwrap();
        assert_eq!(int, other);
    }

    #[test]
    fn boundary_values_roundtrip() {
        for &value in &[
            0,
            1,
            252,
            253,
            254,
            0xffff,
            0x10000,
            0xffff_ffff,
            0x1_0000_0000,
            u64::MAX,
        ] {
            roundtrip(value);
        }
    }

    #[test]
    fn known_encodings() {
        assert_eq!(CompactInt(0xfc).wren_serialize_to_vec().unwrap(), vec![0xfc]);
        assert_eq!(
            CompactInt(0xfd).wren_serialize_to_vec().unwrap(),
            vec![253, 0xfd, 0x00]
        );
        assert_eq!(
            CompactInt(0x10000).wren_serialize_to_vec().unwrap(),
            vec![254, 0x00, 0x00, 0x01, 0x00]
        );
    }
}
