//! Genesis consensus parameters for each Wren network.

use std::convert::TryFrom;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use lazy_static::lazy_static;

use crate::amount::{Amount, COIN};
use crate::block::{self, Block, Header};
use crate::parameters::Network;
use crate::transaction::{LockTime, Transaction};
use crate::transparent::{CoinbaseData, Input, Output, Script};
use crate::work::difficulty::{CompactDifficulty, POW_LIMIT_BITS, POW_LIMIT_BITS_REGTEST};

/// The previous block hash for the genesis block.
///
/// All networks use the null value for the parent of the genesis block.
pub const GENESIS_PREVIOUS_BLOCK_HASH: block::Hash = block::Hash([0; 32]);

/// The coinbase input payload of the genesis block: the difficulty bits,
/// a counter, and the famous newspaper headline.
const GENESIS_COINBASE_DATA: &str =
    "04ffff001d0104455468652054696d65732030332f4a616e2f32303039204368616e63656c6c6f72206f6e206272696e6b206f66207365636f6e64206261696c6f757420666f722062616e6b73";

/// The single genesis output's pay-to-pubkey lock script.
const GENESIS_OUTPUT_SCRIPT: &str =
    "4104678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb649f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5fac";

fn genesis_coinbase() -> Transaction {
    Transaction::new(
        1,
        vec![Input::Coinbase {
            data: CoinbaseData::new(
                hex::decode(GENESIS_COINBASE_DATA).expect("hard-coded data decodes"),
            ),
            sequence: std::u32::MAX,
        }],
        vec![Output {
            value: Amount::try_from(50 * COIN).expect("50 coin is in range"),
            lock_script: Script::new(
                hex::decode(GENESIS_OUTPUT_SCRIPT).expect("hard-coded script decodes"),
            ),
        }],
        LockTime::unlocked(),
    )
}

fn assemble_genesis(time: u32, bits: u32, nonce: u32) -> Block {
    let coinbase = genesis_coinbase();
    let merkle_root = std::iter::once(coinbase.hash()).collect();
    Block {
        header: Header::new(
            1,
            GENESIS_PREVIOUS_BLOCK_HASH,
            merkle_root,
            Utc.timestamp(time as i64, 0),
            CompactDifficulty::from_bits(bits),
            nonce,
        ),
        transactions: vec![Arc::new(coinbase)],
    }
}

lazy_static! {
    /// The regtest genesis block.
    ///
    /// Its hash is not a protocol constant, so the nonce is searched here,
    /// starting from zero. The regtest limit passes roughly half of all
    /// hashes, making the search instant and deterministic.
    static ref REGTEST_GENESIS: Block = {
        let target = CompactDifficulty::from_bits(POW_LIMIT_BITS_REGTEST)
            .to_expanded()
            .expect("regtest limit bits are valid");
        let mut nonce = 0u32;
        loop {
            let candidate = assemble_genesis(1296688602, POW_LIMIT_BITS_REGTEST, nonce);
            if candidate.hash() <= target {
                break candidate;
            }
            nonce = nonce.checked_add(1).expect("a regtest nonce is found early");
        }
    };
}

/// Returns the genesis block for `network`.
pub fn genesis_block(network: Network) -> Block {
    match network {
        Network::Mainnet => assemble_genesis(1231006505, POW_LIMIT_BITS, 2083236893),
        Network::Testnet => assemble_genesis(1296688602, POW_LIMIT_BITS, 414098458),
        Network::Regtest => REGTEST_GENESIS.clone(),
    }
}

/// Returns the hash for the genesis block in `network`.
pub fn genesis_hash(network: Network) -> block::Hash {
    match network {
        Network::Mainnet => "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
            .parse()
            .expect("hard-coded hash parses"),
        Network::Testnet => "000000000933ea01ad0ee984209779baaec3ced90fa3f408719526f8d77f4943"
            .parse()
            .expect("hard-coded hash parses"),
        Network::Regtest => REGTEST_GENESIS.hash(),
    }
}
