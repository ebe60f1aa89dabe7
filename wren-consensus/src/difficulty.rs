//! The difficulty retarget rule.

use primitive_types::U256;
use tracing::debug;

use wren_chain::parameters::Network;
use wren_chain::work::difficulty::{CompactDifficulty, ExpandedDifficulty};
use wren_state::{BlockIndex, NodeId};

use crate::parameters::{POW_TARGET_TIMESPAN, RETARGET_INTERVAL};

/// The difficulty bits required of the block that extends `tip`.
///
/// Every [`RETARGET_INTERVAL`] blocks the target is rescaled by the
/// ratio of the last window's actual duration to the desired duration,
/// clamped to a factor of four in either direction, and capped at the
/// proof-of-work limit. Between retargets the bits carry over unchanged.
/// The regression-test network never retargets.
pub fn next_required_bits(
    index: &BlockIndex,
    tip: NodeId,
    network: Network,
) -> CompactDifficulty {
    if network == Network::Regtest {
        return ExpandedDifficulty::limit_bits(network);
    }

    let tip_node = index.get(tip);
    let next_height = tip_node.height.0 + 1;

    // Only change the difficulty on retarget boundaries.
    if next_height % RETARGET_INTERVAL != 0 {
        return tip_node.header.difficulty_threshold;
    }

    // Walk back to the first block of the closing window.
    let mut first = tip;
    for _ in 0..RETARGET_INTERVAL - 1 {
        match index.get(first).prev {
            Some(prev) => first = prev,
            None => break,
        }
    }
    let first_node = index.get(first);

    let mut actual_timespan =
        (tip_node.header.time - first_node.header.time).num_seconds();
    if actual_timespan < POW_TARGET_TIMESPAN / 4 {
        actual_timespan = POW_TARGET_TIMESPAN / 4;
    }
    if actual_timespan > POW_TARGET_TIMESPAN * 4 {
        actual_timespan = POW_TARGET_TIMESPAN * 4;
    }

    let old_target = match tip_node.header.difficulty_threshold.to_expanded() {
        Some(target) => target.to_u256(),
        None => return ExpandedDifficulty::limit_bits(network),
    };

    // The limit times the clamp factor still fits a U256, so multiply
    // before dividing to keep precision.
    let mut new_target =
        old_target * U256::from(actual_timespan as u64) / U256::from(POW_TARGET_TIMESPAN as u64);
    let limit = ExpandedDifficulty::target_difficulty_limit(network).to_u256();
    if new_target > limit {
        new_target = limit;
    }

    let bits = ExpandedDifficulty::from_u256(new_target).to_compact();
    debug!(
        height = next_height,
        actual_timespan,
        old_bits = ?tip_node.header.difficulty_threshold,
        new_bits = ?bits,
        "difficulty retarget"
    );
    bits
}

#[cfg(test)]
mod tests {
    use wren_chain::block::{merkle, Header};
    use wren_chain::parameters::genesis_block;
    use wren_chain::work::difficulty::POW_LIMIT_BITS;

    use super::*;

    // Build an index whose nodes carry `spacing`-second gaps, long
    // enough to cross one retarget boundary.
    fn chain_with_spacing(spacing: i64, length: u32) -> (BlockIndex, NodeId) {
        let mut index = BlockIndex::new();
        let genesis = genesis_block(Network::Mainnet);
        let mut tip = index.insert(genesis.header, 0, 8).unwrap();
        let base_time = genesis.header.time;
        for i in 1..=length {
            let header = Header::new(
                1,
                index.get(tip).hash,
                merkle::Root([(i % 251) as u8; 32]),
                base_time + chrono::Duration::seconds(spacing * i64::from(i)),
                CompactDifficulty::from_bits(POW_LIMIT_BITS),
                i,
            );
            tip = index.insert(header, 0, 8).unwrap();
        }
        (index, tip)
    }

    #[test]
    fn bits_carry_over_between_retargets() {
        let (index, tip) = chain_with_spacing(600, 100);
        assert_eq!(
            next_required_bits(&index, tip, Network::Mainnet),
            CompactDifficulty::from_bits(POW_LIMIT_BITS)
        );
    }

    #[test]
    fn on_schedule_window_keeps_target() {
        // 2015 blocks after genesis: the next block is the 2016th and
        // triggers a retarget over a perfectly paced window.
        let (index, tip) = chain_with_spacing(600, RETARGET_INTERVAL - 1);
        let bits = next_required_bits(&index, tip, Network::Mainnet);
        let old = CompactDifficulty::from_bits(POW_LIMIT_BITS)
            .to_expanded()
            .unwrap()
            .to_u256();
        let new = bits.to_expanded().unwrap().to_u256();
        // On-schedule blocks leave the target where it was (up to
        // compact-format truncation).
        assert!(new <= old);
        assert!(new >= old - (old >> 8));
    }

    #[test]
    fn fast_window_makes_target_harder() {
        let (index, tip) = chain_with_spacing(60, RETARGET_INTERVAL - 1);
        let bits = next_required_bits(&index, tip, Network::Mainnet);
        let old = CompactDifficulty::from_bits(POW_LIMIT_BITS)
            .to_expanded()
            .unwrap()
            .to_u256();
        let new = bits.to_expanded().unwrap().to_u256();
        // Ten-times-too-fast clamps at one quarter of the old target.
        assert!(new < old);
        assert!(new >= old / 4 - (old >> 10));
    }

    #[test]
    fn slow_window_stays_at_the_limit() {
        // Blocks at four-hour spacing want an easier target, but the
        // limit caps it.
        let (index, tip) = chain_with_spacing(4 * 60 * 60, RETARGET_INTERVAL - 1);
        let bits = next_required_bits(&index, tip, Network::Mainnet);
        let limit = ExpandedDifficulty::target_difficulty_limit(Network::Mainnet).to_u256();
        assert!(bits.to_expanded().unwrap().to_u256() <= limit);
    }

    #[test]
    fn regtest_never_retargets() {
        let mut index = BlockIndex::new();
        let genesis = genesis_block(Network::Regtest);
        let tip = index.insert(genesis.header, 0, 8).unwrap();
        assert_eq!(
            next_required_bits(&index, tip, Network::Regtest),
            ExpandedDifficulty::limit_bits(Network::Regtest)
        );
    }
}
