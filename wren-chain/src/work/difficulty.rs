//! Block difficulty data structures and calculations.
//!
//! The block difficulty "target threshold" is stored in the block header as
//! a 32-bit `CompactDifficulty`. The `block::Hash` must be less than or
//! equal to the `ExpandedDifficulty` threshold, when both are interpreted
//! as 256-bit integers in little-endian byte order.

use std::{cmp::Ordering, fmt};

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::{block, parameters::Network, SerializationError, WrenDeserialize, WrenSerialize};

/// The proof-of-work limit for mainnet and testnet, as a compact value.
pub const POW_LIMIT_BITS: u32 = 0x1d00_ffff;

/// The proof-of-work limit used by the regression-test network. Nearly
/// every hash satisfies it, so blocks can be mined inside tests.
pub const POW_LIMIT_BITS_REGTEST: u32 = 0x207f_ffff;

/// A 32-bit "compact bits" value, which represents the difficulty
/// threshold for a block header in a custom floating-point format.
///
/// Larger threshold values represent *less* work.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct CompactDifficulty(u32);

impl CompactDifficulty {
    /// The exponent offset for the mantissa of the floating-point format.
    const OFFSET: i32 = 3;

    /// Wrap raw header bits.
    pub fn from_bits(bits: u32) -> CompactDifficulty {
        CompactDifficulty(bits)
    }

    /// The raw header bits.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Calculate the ExpandedDifficulty for a compact representation.
    ///
    /// Returns None for negative, zero, and overflowing values, all of
    /// which are invalid in block headers.
    pub fn to_expanded(self) -> Option<ExpandedDifficulty> {
        let exponent = self.0 >> 24;
        let mantissa = self.0 & 0x007f_ffff;

        if mantissa == 0 || self.0 & 0x0080_0000 != 0 {
            return None;
        }

        // Overflowing values only fit in a u256 when the mantissa's
        // leading byte still lands inside the 32-byte window.
        let overflow = exponent > 34
            || (mantissa > 0xff && exponent > 33)
            || (mantissa > 0xffff && exponent > 32);
        if overflow {
            return None;
        }

        let result = if exponent as i32 <= Self::OFFSET {
            U256::from(mantissa >> (8 * (Self::OFFSET - exponent as i32)))
        } else {
            U256::from(mantissa) << (8 * (exponent as i32 - Self::OFFSET))
        };

        if result.is_zero() {
            None
        } else {
            Some(ExpandedDifficulty(result))
        }
    }

    /// The work represented by this difficulty: the expected number of hash
    /// evaluations needed to find a block meeting the threshold.
    pub fn to_work(self) -> Option<U256> {
        let target = self.to_expanded()?.0;
        // 2^256 / (target + 1), computed without a 257-bit intermediate.
        Some((!target / (target + 1)) + 1)
    }
}

impl fmt::Debug for CompactDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("CompactDifficulty")
            .field(&format_args!("{:#010x}", self.0))
            .finish()
    }
}

impl WrenSerialize for CompactDifficulty {
    fn wren_serialize<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error> {
        self.0.wren_serialize(target)
    }
}

impl WrenDeserialize for CompactDifficulty {
    fn wren_deserialize<R: std::io::Read>(reader: R) -> Result<Self, SerializationError> {
        Ok(CompactDifficulty(u32::wren_deserialize(reader)?))
    }
}

/// A 256-bit unsigned "expanded difficulty" value.
///
/// Valid block hashes are less than or equal to this threshold.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub struct ExpandedDifficulty(U256);

impl ExpandedDifficulty {
    /// The threshold the chain's compact `bits` may never exceed.
    pub fn target_difficulty_limit(network: Network) -> ExpandedDifficulty {
        match network {
            Network::Mainnet | Network::Testnet => ExpandedDifficulty(U256::MAX >> 32),
            Network::Regtest => CompactDifficulty(POW_LIMIT_BITS_REGTEST)
                .to_expanded()
                .expect("regtest limit bits are valid"),
        }
    }

    /// The limit as raw header bits for `network`.
    pub fn limit_bits(network: Network) -> CompactDifficulty {
        match network {
            Network::Mainnet | Network::Testnet => CompactDifficulty(POW_LIMIT_BITS),
            Network::Regtest => CompactDifficulty(POW_LIMIT_BITS_REGTEST),
        }
    }

    /// Calculate the CompactDifficulty for an expanded difficulty,
    /// truncating the mantissa to the format's precision.
    pub fn to_compact(self) -> CompactDifficulty {
        let size = (self.0.bits() + 7) / 8;
        let mut compact = if size <= 3 {
            self.0.low_u32() << (8 * (3 - size))
        } else {
            (self.0 >> (8 * (size - 3))).low_u32()
        };
        let mut size = size as u32;
        if compact & 0x0080_0000 != 0 {
            compact >>= 8;
            size += 1;
        }
        CompactDifficulty(compact | (size << 24))
    }

    /// The inner 256-bit value.
    pub fn to_u256(self) -> U256 {
        self.0
    }

    /// Construct from a raw 256-bit value.
    pub fn from_u256(value: U256) -> ExpandedDifficulty {
        ExpandedDifficulty(value)
    }
}

impl fmt::Debug for ExpandedDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut buf = [0u8; 32];
        self.0.to_big_endian(&mut buf);
        f.debug_tuple("ExpandedDifficulty")
            .field(&hex::encode(&buf))
            .finish()
    }
}

impl From<block::Hash> for ExpandedDifficulty {
    fn from(hash: block::Hash) -> Self {
        ExpandedDifficulty(U256::from_little_endian(&hash.0))
    }
}

impl PartialEq<block::Hash> for ExpandedDifficulty {
    fn eq(&self, other: &block::Hash) -> bool {
        other.eq(self)
    }
}

impl PartialOrd<block::Hash> for ExpandedDifficulty {
    /// The comparisons are u256 integer comparisons. Greater values
    /// represent *less* work.
    fn partial_cmp(&self, other: &block::Hash) -> Option<Ordering> {
        Some(other.partial_cmp(self)?.reverse())
    }
}

impl PartialEq<ExpandedDifficulty> for block::Hash {
    fn eq(&self, other: &ExpandedDifficulty) -> bool {
        U256::from_little_endian(&self.0) == other.0
    }
}

impl PartialOrd<ExpandedDifficulty> for block::Hash {
    fn partial_cmp(&self, other: &ExpandedDifficulty) -> Option<Ordering> {
        U256::from_little_endian(&self.0).partial_cmp(&other.0)
    }
}

#[cfg(any(test, feature = "proptest-impl"))]
use proptest::prelude::*;

#[cfg(any(test, feature = "proptest-impl"))]
impl Arbitrary for CompactDifficulty {
    type Parameters = ();

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        any::<u32>().prop_map(CompactDifficulty).boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pow_limit_roundtrips_through_compact() {
        for &bits in &[POW_LIMIT_BITS, POW_LIMIT_BITS_REGTEST] {
            let compact = CompactDifficulty::from_bits(bits);
            let expanded = compact.to_expanded().expect("limit bits are valid");
            assert_eq!(expanded.to_compact(), compact);
        }
    }

    #[test]
    fn mainnet_limit_bits_expand_within_limit() {
        let expanded = CompactDifficulty::from_bits(POW_LIMIT_BITS)
            .to_expanded()
            .unwrap();
        assert!(expanded <= ExpandedDifficulty::target_difficulty_limit(Network::Mainnet));
    }

    #[test]
    fn invalid_compact_values() {
        // zero mantissa
        assert!(CompactDifficulty::from_bits(0x1d00_0000).to_expanded().is_none());
        // negative flag set
        assert!(CompactDifficulty::from_bits(0x1d80_0001).to_expanded().is_none());
        // overflowing exponent
        assert!(CompactDifficulty::from_bits(0xff00_ffff).to_expanded().is_none());
    }

    #[test]
    fn hash_comparisons() {
        let threshold = CompactDifficulty::from_bits(POW_LIMIT_BITS_REGTEST)
            .to_expanded()
            .unwrap();

        let zero_hash = block::Hash([0; 32]);
        assert!(zero_hash < threshold);

        let mut high = [0xffu8; 32];
        high[31] = 0xff;
        let high_hash = block::Hash(high);
        assert!(high_hash > threshold);
    }

    #[test]
    fn work_is_monotonic_in_difficulty() {
        let easy = CompactDifficulty::from_bits(POW_LIMIT_BITS_REGTEST)
            .to_work()
            .unwrap();
        let hard = CompactDifficulty::from_bits(POW_LIMIT_BITS).to_work().unwrap();
        assert!(hard > easy);
    }
}
