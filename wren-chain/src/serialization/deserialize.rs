use std::net::{Ipv6Addr, SocketAddr};
use std::{
    io::{self, Read},
    net::IpAddr::{V4, V6},
};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use chrono::{DateTime, TimeZone, Utc};

use crate::compactint::CompactInt;

use super::SerializationError;

type Result<R> = std::result::Result<R, SerializationError>;

pub trait WrenDeserialize {
    fn wren_deserialize<R: io::Read>(reader: R) -> Result<Self>
    where
        Self: Sized;
}

/// Helper for deserializing more succinctly via type inference
pub trait WrenDeserializeInto {
    /// Deserialize based on type inference
    fn wren_deserialize_into<T>(self) -> Result<T>
    where
        T: WrenDeserialize;
}

impl<R: io::Read> WrenDeserializeInto for R {
    fn wren_deserialize_into<T>(self) -> Result<T>
    where
        T: WrenDeserialize,
    {
        T::wren_deserialize(self)
    }
}

impl WrenDeserialize for bool {
    fn wren_deserialize<R: io::Read>(mut reader: R) -> Result<bool> {
        let value = reader.read_u8()?;
        match value {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(SerializationError::Parse("Invalid bool")),
        }
    }
}

impl WrenDeserialize for u8 {
    fn wren_deserialize<R: io::Read>(mut reader: R) -> Result<u8> {
        Ok(reader.read_u8()?)
    }
}

impl WrenDeserialize for u16 {
    fn wren_deserialize<R: io::Read>(mut reader: R) -> Result<u16> {
        Ok(reader.read_u16::<LittleEndian>()?)
    }
}

impl WrenDeserialize for u32 {
    fn wren_deserialize<R: io::Read>(mut reader: R) -> Result<u32> {
        Ok(reader.read_u32::<LittleEndian>()?)
    }
}

impl WrenDeserialize for u64 {
    fn wren_deserialize<R: io::Read>(mut reader: R) -> Result<u64> {
        Ok(reader.read_u64::<LittleEndian>()?)
    }
}

impl WrenDeserialize for i32 {
    fn wren_deserialize<R: io::Read>(mut reader: R) -> Result<i32> {
        Ok(reader.read_i32::<LittleEndian>()?)
    }
}

impl WrenDeserialize for i64 {
    fn wren_deserialize<R: io::Read>(mut reader: R) -> Result<i64> {
        Ok(reader.read_i64::<LittleEndian>()?)
    }
}

impl WrenDeserialize for DateTime<Utc> {
    fn wren_deserialize<R: io::Read>(mut reader: R) -> Result<DateTime<Utc>> {
        Ok(Utc.timestamp(reader.read_u32::<LittleEndian>()? as i64, 0))
    }
}

impl<T> WrenDeserialize for Vec<T>
where
    T: WrenDeserialize,
{
    fn wren_deserialize<R: io::Read>(mut reader: R) -> Result<Vec<T>> {
        let len = CompactInt::wren_deserialize(&mut reader)?.value() as usize;
        // Limit preallocation since a blind reserve from an attacker-chosen
        // length is a DOS vulnerability.
        let blind_alloc_limit = 1024;
        let mut result: Vec<T> = Vec::with_capacity(std::cmp::min(len, blind_alloc_limit));
        for _ in 0..len {
            result.push(T::wren_deserialize(&mut reader)?);
        }
        Ok(result)
    }
}

impl WrenDeserialize for String {
    fn wren_deserialize<R: io::Read>(mut reader: R) -> Result<String> {
        let len = CompactInt::wren_deserialize(&mut reader)?.value();
        let mut buf = Vec::new();
        (&mut reader).take(len).read_to_end(&mut buf)?;
        if buf.len() as u64 != len {
            return Err(SerializationError::Parse("string shorter than its prefix"));
        }
        String::from_utf8(buf).map_err(|_| SerializationError::Parse("invalid utf-8"))
    }
}

impl WrenDeserialize for SocketAddr {
    fn wren_deserialize<R: io::Read>(mut reader: R) -> Result<SocketAddr> {
        let octets = <[u8; 16]>::wren_deserialize(&mut reader)?;
        let v6_addr = Ipv6Addr::from(octets);

        let addr = match v6_addr.to_ipv4() {
            Some(v4_addr) => V4(v4_addr),
            None => V6(v6_addr),
        };
        Ok(SocketAddr::from((addr, reader.read_u16::<BigEndian>()?)))
    }
}

impl<T: Sized + WrenDeserialize> WrenDeserialize for Option<T> {
    fn wren_deserialize<R: io::Read>(reader: R) -> Result<Option<T>> {
        Ok(Some(T::wren_deserialize(reader)?))
    }
}

impl<T, U> WrenDeserialize for (T, U)
where
    T: WrenDeserialize,
    U: WrenDeserialize,
{
    fn wren_deserialize<R: io::Read>(mut reader: R) -> Result<(T, U)> {
        Ok((
            T::wren_deserialize(&mut reader)?,
            U::wren_deserialize(&mut reader)?,
        ))
    }
}

macro_rules! impl_deserializable_byte_array {
    ($size:expr) => {
        impl WrenDeserialize for [u8; $size] {
            fn wren_deserialize<R: io::Read>(mut reader: R) -> Result<[u8; $size]> {
                let mut result = [0u8; $size];
                reader.read_exact(&mut result)?;
                Ok(result)
            }
        }
    };
}

impl_deserializable_byte_array!(4);
impl_deserializable_byte_array!(16);
impl_deserializable_byte_array!(20);
impl_deserializable_byte_array!(32);
