//! Consensus constants: maturity, subsidy schedule, fee policy, and the
//! difficulty retarget cadence.

use wren_chain::amount::COIN;
use wren_chain::block::Height;

/// Confirmations a coinbase output needs before it can be spent.
pub const COINBASE_MATURITY: u32 = 100;

/// The largest block subsidy, used before the first halving.
pub const MAX_BLOCK_SUBSIDY: u64 = (50 * COIN) as u64;

/// The subsidy halves every time the chain grows by this many blocks.
pub const HALVING_INTERVAL: Height = Height(210_000);

/// Desired seconds between blocks.
pub const POW_TARGET_SPACING: i64 = 10 * 60;

/// Blocks between difficulty retargets.
pub const RETARGET_INTERVAL: u32 = 2016;

/// Desired seconds per retarget window.
pub const POW_TARGET_TIMESPAN: i64 = RETARGET_INTERVAL as i64 * POW_TARGET_SPACING;

/// Bytes of each block that may carry fee-free transactions, at the
/// miner's discretion.
pub const FREE_BLOCK_BYTES: usize = 10_000;
