use std::io::Write;

use bytes::Buf;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use wren_serde_derive::WrenSerialize;

use crate::{
    cached::Cached, serialization::sha256d, work::difficulty::CompactDifficulty,
    SerializationError, WrenDeserialize, WrenSerialize,
};

use super::{merkle, Hash, Height};

/// A block header, containing metadata about a block.
///
/// How are blocks chained together? They are chained together via the
/// backwards reference (previous header hash) present in the block
/// header. Each block points backwards to its parent, all the way
/// back to the genesis block (the first block in the blockchain).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, WrenSerialize)]
pub struct Header {
    /// The block's version field.
    pub version: u32,

    /// The hash of the previous block, used to create a chain of blocks back
    /// to the genesis block.
    ///
    /// This ensures no previous block can be changed without also changing
    /// this block's header.
    pub previous_block_hash: Hash,

    /// The root of the transaction Merkle tree, binding the block header to
    /// the transactions in the block.
    pub merkle_root: merkle::Root,

    /// The block timestamp is a Unix epoch time (UTC) when the miner
    /// started hashing the header (according to the miner).
    pub time: DateTime<Utc>,

    /// An encoded version of the target threshold this block's header
    /// hash must be less than or equal to, in compact "nBits" format.
    pub difficulty_threshold: CompactDifficulty,

    /// An arbitrary field that miners can change to modify the header
    /// hash in order to produce a hash less than or equal to the
    /// target threshold.
    pub nonce: u32,

    /// For efficiency, we cache the hash of this block after computing it
    /// the first time. This field is not part of the consensus
    /// serialization.
    hash: Cached<Hash>,
}

#[derive(Error, Debug)]
pub enum BlockTimeError {
    #[error("invalid time {0:?} in block header {1:?} {2:?}: block time is more than 2 hours in the future ({3:?}). Hint: check your machine's date, time, and time zone.")]
    InvalidBlockTime(DateTime<Utc>, Height, Hash, DateTime<Utc>),
}

impl Header {
    /// Returns length of a serialized header in bytes.
    pub const fn len() -> usize {
        80
    }

    pub fn new(
        version: u32,
        previous_block_hash: Hash,
        merkle_root: merkle::Root,
        time: DateTime<Utc>,
        difficulty_threshold: CompactDifficulty,
        nonce: u32,
    ) -> Header {
        Header {
            version,
            previous_block_hash,
            merkle_root,
            time,
            difficulty_threshold,
            nonce,
            hash: Cached::new(),
        }
    }

    /// The header written over an erased block file record.
    pub fn null() -> Header {
        Header::new(
            0,
            Hash::zero(),
            merkle::Root([0; 32]),
            Utc.timestamp(0, 0),
            CompactDifficulty::from_bits(0),
            0,
        )
    }

    /// The hash of this header, if already computed.
    pub(super) fn cached_hash(&self) -> Option<Hash> {
        self.hash.value()
    }

    /// Compute (or fetch) the hash of this header.
    pub fn hash(&self) -> Hash {
        Hash::from(self)
    }

    /// Checks that the header time is not more than two hours in the
    /// future, according to the node's local clock (`now`).
    ///
    /// This is a non-deterministic rule, as clocks vary over time, and
    /// between different nodes. A block rejected by this rule at one
    /// moment may be accepted later.
    pub fn time_is_valid_at(
        &self,
        now: DateTime<Utc>,
        height: &Height,
        hash: &Hash,
    ) -> Result<(), BlockTimeError> {
        let two_hours_in_the_future = now
            .checked_add_signed(Duration::hours(2))
            .expect("calculating 2 hours in the future does not overflow");
        if self.time <= two_hours_in_the_future {
            Ok(())
        } else {
            Err(BlockTimeError::InvalidBlockTime(
                self.time,
                *height,
                *hash,
                two_hours_in_the_future,
            ))
        }
    }

    /// Deserializes a block header from a Buf object, allowing more
    /// efficient block hash calculation than the vanilla deserializer.
    pub fn deserialize_from_buf<B: Buf>(mut src: B) -> Result<Self, SerializationError> {
        if src.remaining() < Header::len() {
            return Err(SerializationError::Parse("Not enough bytes in block header"));
        }
        // Hash the next 80 bytes (the header). This avoids needing to
        // reserialize and hash later.
        let src = src.copy_to_bytes(Header::len());
        let mut hash_writer = sha256d::Writer::default();
        hash_writer
            .write_all(&src[..])
            .expect("Sha256dWriter is infallible");
        let own_hash = Hash::from_bytes_exact(hash_writer.finish());

        let mut src = std::io::Cursor::new(src);
        Ok(Header {
            version: u32::wren_deserialize(&mut src)?,
            previous_block_hash: Hash::wren_deserialize(&mut src)?,
            merkle_root: merkle::Root::wren_deserialize(&mut src)?,
            time: <DateTime<Utc>>::wren_deserialize(&mut src)?,
            difficulty_threshold: CompactDifficulty::wren_deserialize(&mut src)?,
            nonce: u32::wren_deserialize(&mut src)?,
            hash: Cached::from(own_hash),
        })
    }
}

impl WrenDeserialize for Header {
    fn wren_deserialize<R: std::io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let mut bytes = [0u8; 80];
        reader.read_exact(&mut bytes)?;
        Header::deserialize_from_buf(&bytes[..])
    }
}
