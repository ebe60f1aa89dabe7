//! The in-memory tree of block headers.
//!
//! The chain is a tree rooted at the fixed genesis block: every node
//! points back at its parent, and any node may have several children.
//! `next` links select the unique path through the current best chain;
//! a node off the best chain has `next == None`. Nodes live in an arena
//! and refer to each other by arena id, with a hash map resolving block
//! hashes to ids.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use tracing::trace;
use wren_serde_derive::{WrenDeserialize, WrenSerialize};

use wren_chain::block::{self, Header, Height};
use wren_chain::parameters::genesis_hash;
use wren_chain::parameters::Network;
use wren_chain::work::difficulty::CompactDifficulty;
use wren_chain::{SerializationError, WrenDeserialize, WrenSerialize};

/// How many trailing blocks feed the median-time-past rule.
pub const MEDIAN_TIME_SPAN: usize = 11;

/// An arena index of a block-index node.
pub type NodeId = usize;

/// The persisted form of a block-index node, with parent and child given
/// by hash; the in-memory links are rebuilt by lookup at load time.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, WrenSerialize, WrenDeserialize)]
pub struct DiskBlockIndex {
    /// Record format version.
    pub version: i32,
    /// The next block on the best chain, or zero.
    pub hash_next: block::Hash,
    /// Which block file holds the block.
    pub file: u32,
    /// Offset of the block bytes within that file.
    pub block_pos: u32,
    /// Height of this block above genesis.
    pub height: u32,
    // Cached header fields.
    pub block_version: u32,
    pub hash_prev: block::Hash,
    pub merkle_root: block::merkle::Root,
    pub time: DateTime<Utc>,
    pub bits: CompactDifficulty,
    pub nonce: u32,
}

/// The record format version written with every block-index record.
pub const BLOCK_INDEX_VERSION: i32 = 1;

impl DiskBlockIndex {
    /// Reassemble the block header this record caches.
    pub fn header(&self) -> Header {
        Header::new(
            self.block_version,
            self.hash_prev,
            self.merkle_root,
            self.time,
            self.bits,
            self.nonce,
        )
    }

    /// The hash of the indexed block.
    pub fn hash(&self) -> block::Hash {
        self.header().hash()
    }
}

/// One node of the in-memory block index.
#[derive(Clone, Debug)]
pub struct IndexNode {
    pub hash: block::Hash,
    pub prev: Option<NodeId>,
    pub next: Option<NodeId>,
    pub file: u32,
    pub block_pos: u32,
    pub height: Height,
    /// Cached header fields.
    pub header: Header,
    /// Total work of the chain ending in this block.
    pub chain_work: U256,
}

impl IndexNode {
    fn to_disk(&self, index: &BlockIndex) -> DiskBlockIndex {
        DiskBlockIndex {
            version: BLOCK_INDEX_VERSION,
            hash_next: self
                .next
                .map(|id| index.nodes[id].hash)
                .unwrap_or_else(block::Hash::zero),
            file: self.file,
            block_pos: self.block_pos,
            height: self.height.0,
            block_version: self.header.version,
            hash_prev: self.header.previous_block_hash,
            merkle_root: self.header.merkle_root,
            time: self.header.time,
            bits: self.header.difficulty_threshold,
            nonce: self.header.nonce,
        }
    }
}

/// The in-memory block index: every known block header, its links, and
/// the best-chain pointer.
#[derive(Debug, Default)]
pub struct BlockIndex {
    nodes: Vec<IndexNode>,
    by_hash: HashMap<block::Hash, NodeId>,
    genesis: Option<NodeId>,
    best: Option<NodeId>,
}

impl BlockIndex {
    pub fn new() -> BlockIndex {
        BlockIndex::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, hash: &block::Hash) -> bool {
        self.by_hash.contains_key(hash)
    }

    pub fn get(&self, id: NodeId) -> &IndexNode {
        &self.nodes[id]
    }

    pub fn lookup(&self, hash: &block::Hash) -> Option<NodeId> {
        self.by_hash.get(hash).copied()
    }

    pub fn genesis(&self) -> Option<NodeId> {
        self.genesis
    }

    pub fn best(&self) -> Option<NodeId> {
        self.best
    }

    pub fn best_height(&self) -> Option<Height> {
        self.best.map(|id| self.nodes[id].height)
    }

    pub fn best_work(&self) -> U256 {
        self.best.map(|id| self.nodes[id].chain_work).unwrap_or_default()
    }

    /// Insert an already-validated header, linking it to its parent.
    ///
    /// Returns `None` if the parent is unknown (and the header is not
    /// the genesis header) or the difficulty bits don't decode.
    pub fn insert(&mut self, header: Header, file: u32, block_pos: u32) -> Option<NodeId> {
        let hash = header.hash();
        if let Some(&existing) = self.by_hash.get(&hash) {
            return Some(existing);
        }

        let work = header.difficulty_threshold.to_work()?;
        let (prev, height, parent_work) = if header.previous_block_hash.is_zero() {
            (None, Height(0), U256::zero())
        } else {
            let parent = *self.by_hash.get(&header.previous_block_hash)?;
            let parent_node = &self.nodes[parent];
            (
                Some(parent),
                parent_node.height.next(),
                parent_node.chain_work,
            )
        };

        let id = self.nodes.len();
        self.nodes.push(IndexNode {
            hash,
            prev,
            next: None,
            file,
            block_pos,
            height,
            header,
            chain_work: parent_work + work,
        });
        self.by_hash.insert(hash, id);
        if prev.is_none() && self.genesis.is_none() {
            self.genesis = Some(id);
        }
        trace!(%hash, height = height.0, "indexed block");
        Some(id)
    }

    /// Point the best-chain tip at `id`.
    pub fn set_best(&mut self, id: NodeId) {
        self.best = Some(id);
    }

    /// Set (or clear) the forward best-chain link of `id`.
    pub fn set_next(&mut self, id: NodeId, next: Option<NodeId>) {
        self.nodes[id].next = next;
    }

    /// A block is on the main chain iff it has a forward link or is the
    /// tip itself.
    pub fn is_in_main_chain(&self, id: NodeId) -> bool {
        self.nodes[id].next.is_some() || self.best == Some(id)
    }

    /// The persisted record for `id`.
    pub fn to_disk(&self, id: NodeId) -> DiskBlockIndex {
        self.nodes[id].to_disk(self)
    }

    /// The median of the previous `MEDIAN_TIME_SPAN` block times ending
    /// at `id` (inclusive).
    pub fn median_time_past(&self, id: NodeId) -> DateTime<Utc> {
        let mut times = Vec::with_capacity(MEDIAN_TIME_SPAN);
        let mut cursor = Some(id);
        while let Some(node_id) = cursor {
            if times.len() == MEDIAN_TIME_SPAN {
                break;
            }
            let node = &self.nodes[node_id];
            times.push(node.header.time);
            cursor = node.prev;
        }
        times.sort();
        times[times.len() / 2]
    }

    /// Walk back from `id` to its ancestor at `height`.
    pub fn ancestor_at(&self, id: NodeId, height: Height) -> Option<NodeId> {
        let mut cursor = id;
        if self.nodes[cursor].height < height {
            return None;
        }
        while self.nodes[cursor].height > height {
            cursor = self.nodes[cursor].prev?;
        }
        Some(cursor)
    }

    /// The lowest common ancestor of two nodes.
    pub fn find_fork(&self, a: NodeId, b: NodeId) -> NodeId {
        let mut a = a;
        let mut b = b;
        while self.nodes[a].height > self.nodes[b].height {
            a = self.nodes[a].prev.expect("node deeper than the fork has a parent");
        }
        while self.nodes[b].height > self.nodes[a].height {
            b = self.nodes[b].prev.expect("node deeper than the fork has a parent");
        }
        while a != b {
            a = self.nodes[a].prev.expect("distinct chains meet at genesis");
            b = self.nodes[b].prev.expect("distinct chains meet at genesis");
        }
        a
    }

    /// The path from (exclusive) `fork` up to (inclusive) `tip`, in
    /// ascending height order.
    pub fn path_from_fork(&self, fork: NodeId, tip: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut cursor = tip;
        while cursor != fork {
            path.push(cursor);
            cursor = self.nodes[cursor]
                .prev
                .expect("tip descends from the fork");
        }
        path.reverse();
        path
    }

    /// A locator for `id`: its hash, then hashes at exponentially
    /// growing strides back, ending with the genesis hash.
    pub fn locator(&self, id: NodeId, network: Network) -> Vec<block::Hash> {
        let mut have = Vec::new();
        let mut step = 1usize;
        let mut cursor = Some(id);
        while let Some(node_id) = cursor {
            have.push(self.nodes[node_id].hash);
            // Exponentially larger steps back.
            let mut next = Some(node_id);
            for _ in 0..step {
                next = next.and_then(|n| self.nodes[n].prev);
                if next.is_none() {
                    break;
                }
            }
            cursor = next;
            if have.len() > 10 {
                step *= 2;
            }
        }
        let genesis = genesis_hash(network);
        if have.last() != Some(&genesis) {
            have.push(genesis);
        }
        have
    }

    /// Rebuild the index from its persisted records, wiring parent and
    /// next links by hash lookup and recomputing cumulative work.
    ///
    /// Dangling parent references mean the store is corrupt, which is
    /// unrecoverable at this layer.
    pub fn from_disk(records: Vec<DiskBlockIndex>, network: Network) -> BlockIndex {
        let mut index = BlockIndex::new();
        let genesis = genesis_hash(network);

        for record in records.iter() {
            let hash = record.hash();
            let id = index.nodes.len();
            index.nodes.push(IndexNode {
                hash,
                prev: None,
                next: None,
                file: record.file,
                block_pos: record.block_pos,
                height: Height(record.height),
                header: record.header(),
                chain_work: U256::zero(),
            });
            index.by_hash.insert(hash, id);
            if hash == genesis {
                index.genesis = Some(id);
            }
        }

        for (id, record) in records.iter().enumerate() {
            if !record.hash_prev.is_zero() {
                let prev = *index
                    .by_hash
                    .get(&record.hash_prev)
                    .expect("block index parent missing: store is corrupt");
                index.nodes[id].prev = Some(prev);
            }
            if !record.hash_next.is_zero() {
                let next = *index
                    .by_hash
                    .get(&record.hash_next)
                    .expect("block index child missing: store is corrupt");
                index.nodes[id].next = Some(next);
            }
        }

        // Accumulate work in height order so parents are done first.
        let mut order: Vec<NodeId> = (0..index.nodes.len()).collect();
        order.sort_by_key(|&id| index.nodes[id].height);
        for id in order {
            let work = index.nodes[id]
                .header
                .difficulty_threshold
                .to_work()
                .expect("persisted blocks have valid difficulty bits");
            let parent_work = index.nodes[id]
                .prev
                .map(|prev| index.nodes[prev].chain_work)
                .unwrap_or_default();
            index.nodes[id].chain_work = parent_work + work;
        }

        index
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use wren_chain::parameters::genesis_block;
    use wren_chain::work::difficulty::POW_LIMIT_BITS_REGTEST;

    use super::*;

    fn child_header(index: &BlockIndex, parent: NodeId, seconds: u32) -> Header {
        Header::new(
            1,
            index.get(parent).hash,
            block::merkle::Root([seconds as u8; 32]),
            Utc.timestamp(1296688602 + i64::from(seconds), 0),
            CompactDifficulty::from_bits(POW_LIMIT_BITS_REGTEST),
            0,
        )
    }

    fn index_with_chain(length: u32) -> (BlockIndex, Vec<NodeId>) {
        let mut index = BlockIndex::new();
        let genesis = genesis_block(Network::Regtest);
        let mut ids = vec![index.insert(genesis.header, 0, 8).unwrap()];
        for i in 0..length {
            let header = child_header(&index, *ids.last().unwrap(), i + 1);
            ids.push(index.insert(header, 0, 8).unwrap());
        }
        (index, ids)
    }

    #[test]
    fn heights_and_work_accumulate() {
        let (index, ids) = index_with_chain(3);
        assert_eq!(index.get(ids[0]).height, Height(0));
        assert_eq!(index.get(ids[3]).height, Height(3));
        assert!(index.get(ids[3]).chain_work > index.get(ids[2]).chain_work);
        assert_eq!(index.genesis(), Some(ids[0]));
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let mut index = BlockIndex::new();
        let orphan = Header::new(
            1,
            block::Hash([9; 32]),
            block::merkle::Root([0; 32]),
            Utc.timestamp(0, 0),
            CompactDifficulty::from_bits(POW_LIMIT_BITS_REGTEST),
            0,
        );
        assert_eq!(index.insert(orphan, 0, 8), None);
    }

    #[test]
    fn median_time_past_is_the_middle_time() {
        let (index, ids) = index_with_chain(12);
        // Times are strictly increasing, so the median of the last 11 is
        // the 6th-newest time.
        let mtp = index.median_time_past(*ids.last().unwrap());
        let expected = index.get(ids[ids.len() - 6]).header.time;
        assert_eq!(mtp, expected);

        // Median-time is non-decreasing along the chain.
        let earlier = index.median_time_past(ids[ids.len() - 2]);
        assert!(earlier <= mtp);
    }

    #[test]
    fn fork_finding() {
        let (mut index, ids) = index_with_chain(3);
        // A side chain of two blocks from ids[1].
        let side1 = index.insert(child_header(&index, ids[1], 100), 0, 8).unwrap();
        let side2 = index.insert(child_header(&index, side1, 101), 0, 8).unwrap();

        assert_eq!(index.find_fork(ids[3], side2), ids[1]);
        assert_eq!(index.path_from_fork(ids[1], side2), vec![side1, side2]);
        assert_eq!(index.path_from_fork(ids[1], ids[3]), vec![ids[2], ids[3]]);
    }

    #[test]
    fn locator_starts_at_tip_and_ends_at_genesis() {
        let (index, ids) = index_with_chain(30);
        let tip = *ids.last().unwrap();
        let locator = index.locator(tip, Network::Regtest);
        assert_eq!(locator.first(), Some(&index.get(tip).hash));
        assert_eq!(locator.last(), Some(&index.get(ids[0]).hash));
        // Much shorter than the chain itself.
        assert!(locator.len() < ids.len());
    }

    #[test]
    fn disk_roundtrip_rebuilds_links() {
        let (mut index, ids) = index_with_chain(5);
        // Wire the main chain's next pointers and the best tip.
        for pair in ids.windows(2) {
            index.set_next(pair[0], Some(pair[1]));
        }
        index.set_best(*ids.last().unwrap());

        let records: Vec<DiskBlockIndex> = ids.iter().map(|&id| index.to_disk(id)).collect();
        let rebuilt = BlockIndex::from_disk(records, Network::Regtest);

        assert_eq!(rebuilt.len(), index.len());
        let best = rebuilt
            .lookup(&index.get(*ids.last().unwrap()).hash)
            .expect("tip survives the roundtrip");
        assert_eq!(rebuilt.get(best).height, Height(5));
        assert_eq!(
            rebuilt.get(best).chain_work,
            index.get(*ids.last().unwrap()).chain_work
        );
        // Next links were rebuilt from the records.
        let genesis = rebuilt.genesis().unwrap();
        assert!(rebuilt.is_in_main_chain(genesis) || rebuilt.get(genesis).next.is_some());
    }
}
