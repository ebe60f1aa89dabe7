//! Consensus-critical serialization.
//!
//! This module contains the `WrenSerialize` and `WrenDeserialize` traits,
//! analogs of the Serde `Serialize` and `Deserialize` traits but intended
//! for the consensus-critical canonical format: little-endian fixed-width
//! integers, variable-length integer prefixes for lengths, length-prefixed
//! byte strings, and composite records concatenated in declared order.

mod deserialize;
mod error;

pub mod sha256d;

use std::convert::TryFrom;
use std::net::IpAddr;

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use chrono::{DateTime, Utc};

pub use deserialize::{WrenDeserialize, WrenDeserializeInto};
pub use error::SerializationError;

use crate::compactint::CompactInt;

pub trait WrenSerialize {
    fn wren_serialize<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error>;

    fn wren_serialize_to_vec(&self) -> Result<Vec<u8>, std::io::Error> {
        let mut data = Vec::new();
        self.wren_serialize(&mut data)?;
        Ok(data)
    }
}

impl WrenSerialize for bool {
    fn wren_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(&[*self as u8])
    }
}

impl WrenSerialize for u16 {
    fn wren_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_u16::<LittleEndian>(*self)
    }
}

impl WrenSerialize for u32 {
    fn wren_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_u32::<LittleEndian>(*self)
    }
}

impl WrenSerialize for u64 {
    fn wren_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_u64::<LittleEndian>(*self)
    }
}

impl WrenSerialize for i32 {
    fn wren_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_i32::<LittleEndian>(*self)
    }
}

impl WrenSerialize for i64 {
    fn wren_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_i64::<LittleEndian>(*self)
    }
}

impl WrenSerialize for DateTime<Utc> {
    fn wren_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        // u32 times are valid until 2106; the block time checks reject
        // anything a saturated timestamp could smuggle past this cast.
        let time_u32 = u32::try_from(self.timestamp()).unwrap_or(std::u32::MAX);
        target.write_u32::<LittleEndian>(time_u32)
    }
}

impl WrenSerialize for std::net::Ipv6Addr {
    fn wren_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(&self.octets())
    }
}

impl WrenSerialize for std::net::IpAddr {
    fn wren_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        match self {
            IpAddr::V4(addr) => addr.to_ipv6_mapped().wren_serialize(&mut target),
            IpAddr::V6(addr) => addr.wren_serialize(&mut target),
        }
    }
}

impl WrenSerialize for std::net::SocketAddr {
    fn wren_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        self.ip().wren_serialize(&mut target)?;
        target.write_u16::<BigEndian>(self.port())
    }
}

impl WrenSerialize for &[u8] {
    fn wren_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(self)
    }
}

impl WrenSerialize for [u8; 4] {
    fn wren_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(self)
    }
}

impl WrenSerialize for [u8; 16] {
    fn wren_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(self)
    }
}

impl WrenSerialize for [u8; 20] {
    fn wren_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(self)
    }
}

impl WrenSerialize for [u8; 32] {
    fn wren_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(self)
    }
}

impl WrenSerialize for Vec<u8> {
    fn wren_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        CompactInt::from(self.len()).wren_serialize(&mut target)?;
        target.write_all(self)?;
        Ok(())
    }
}

impl<T> WrenSerialize for Vec<T>
where
    T: WrenSerialize,
{
    fn wren_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        CompactInt::from(self.len()).wren_serialize(&mut target)?;
        for item in self.iter() {
            item.wren_serialize(&mut target)?
        }
        Ok(())
    }
}

impl<T, U> WrenSerialize for (T, U)
where
    T: WrenSerialize,
    U: WrenSerialize,
{
    fn wren_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        self.0.wren_serialize(&mut target)?;
        self.1.wren_serialize(&mut target)?;
        Ok(())
    }
}

impl WrenSerialize for String {
    fn wren_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        CompactInt::from(self.len()).wren_serialize(&mut target)?;
        target.write_all(self.as_bytes())?;
        Ok(())
    }
}

impl<T: WrenSerialize> WrenSerialize for Option<T> {
    fn wren_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        match self {
            Some(contents) => contents.wren_serialize(&mut target),
            None => Ok(()),
        }
    }
}
