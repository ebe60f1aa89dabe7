//! Consensus check functions

use std::collections::HashSet;

use wren_chain::block::{Block, Hash, Height, MAX_BLOCK_BYTES};
use wren_chain::parameters::Network;
use wren_chain::transaction;
use wren_chain::work::difficulty::ExpandedDifficulty;

use crate::error::*;
use crate::transaction::check as tx_check;

/// Returns `Ok(())` if there is exactly one coinbase transaction in
/// `block`, and that coinbase transaction is the first transaction in the
/// block.
///
/// The first (and only the first) transaction in a block is a coinbase
/// transaction, which collects and spends the miner subsidy and the
/// transaction fees paid by transactions included in this block.
pub fn coinbase_is_first(block: &Block) -> Result<(), BlockError> {
    let first = block.transactions.get(0).ok_or(BlockError::NoTransactions)?;
    let mut rest = block.transactions.iter().skip(1);
    if !first.is_coinbase() {
        return Err(TransactionError::CoinbasePosition.into());
    }
    if rest.any(|tx| tx.contains_coinbase_input()) {
        return Err(TransactionError::CoinbaseInputFound.into());
    }

    Ok(())
}

/// Returns `Ok(())` if `hash` passes:
///   - the target difficulty limit for `network`, and
///   - the difficulty filter,
/// based on the fields in `header`.
///
/// The comparisons are u256 integer comparisons; greater values
/// represent *less* work.
pub fn difficulty_is_valid(
    header: &wren_chain::block::Header,
    network: Network,
    hash: &Hash,
) -> Result<(), BlockError> {
    let difficulty_threshold = header
        .difficulty_threshold
        .to_expanded()
        .ok_or(BlockError::BadPow)?;

    // The limit check doesn't depend on any previous blocks.
    if difficulty_threshold > ExpandedDifficulty::target_difficulty_limit(network) {
        return Err(BlockError::TargetDifficultyLimit);
    }

    // The difficulty filter is also context-free.
    if hash > &difficulty_threshold {
        return Err(BlockError::BadPow);
    }

    Ok(())
}

/// Check Merkle root validity.
///
/// `transaction_hashes` is a precomputed list of transaction hashes.
pub fn merkle_root_validity(
    block: &Block,
    transaction_hashes: &[transaction::Hash],
) -> Result<(), BlockError> {
    let merkle_root = transaction_hashes.iter().cloned().collect();

    if block.header.merkle_root != merkle_root {
        return Err(BlockError::BadMerkleRoot {
            actual: merkle_root,
            expected: block.header.merkle_root,
        });
    }

    // The transaction Merkle tree is malleable: blocks with duplicate
    // transactions can hash to the same root as blocks without them.
    // Duplicate transactions imply a double-spend, so reject them here
    // as defense in depth.
    if transaction_hashes.len() != transaction_hashes.iter().collect::<HashSet<_>>().len() {
        return Err(BlockError::DuplicateTransaction);
    }

    Ok(())
}

/// All the checks on a block that need no chain context.
pub fn check_block(block: &Block, network: Network) -> Result<(), BlockError> {
    coinbase_is_first(block)?;

    if block.serialized_size() as u64 > MAX_BLOCK_BYTES {
        return Err(BlockError::Oversized);
    }

    for tx in block.transactions.iter() {
        tx_check::check_transaction(tx)?;
    }

    let hashes: Vec<transaction::Hash> =
        block.transactions.iter().map(|tx| tx.hash()).collect();
    merkle_root_validity(block, &hashes)?;

    difficulty_is_valid(&block.header, network, &block.hash())?;

    Ok(())
}

/// The coinbase's total output value may not exceed the subsidy at
/// `height` plus the fees collected from the block's transactions.
pub fn subsidy_is_valid(
    block: &Block,
    height: Height,
    fees: wren_chain::amount::Amount<wren_chain::amount::NonNegative>,
) -> Result<(), BlockError> {
    let coinbase = block.coinbase().ok_or(SubsidyError::NoCoinbase)?;
    let claimed = coinbase
        .value_out()
        .map_err(TransactionError::Amount)?;
    let allowed = crate::subsidy::block_subsidy(height)
        .and_then(|subsidy| subsidy.checked_add(fees))
        .map_err(TransactionError::Amount)?;
    if claimed > allowed {
        return Err(SubsidyError::ExcessiveCoinbaseValue.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wren_chain::parameters::genesis_block;

    use super::*;

    #[test]
    fn genesis_blocks_pass_stateless_checks() {
        wren_test::init();

        for &network in &[Network::Mainnet, Network::Testnet, Network::Regtest] {
            check_block(&genesis_block(network), network).expect("genesis is valid");
        }
    }

    #[test]
    fn tampered_merkle_root_is_rejected() {
        wren_test::init();

        let mut block = genesis_block(Network::Regtest);
        block.header = wren_chain::block::Header::new(
            block.header.version,
            block.header.previous_block_hash,
            wren_chain::block::merkle::Root([0xaa; 32]),
            block.header.time,
            block.header.difficulty_threshold,
            block.header.nonce,
        );
        assert!(matches!(
            check_block(&block, Network::Regtest),
            Err(BlockError::BadMerkleRoot { .. })
        ));
    }

    #[test]
    fn duplicate_transactions_are_rejected() {
        wren_test::init();

        let mut block = genesis_block(Network::Regtest);
        let coinbase = Arc::clone(&block.transactions[0]);
        block.transactions.push(coinbase);
        let err = check_block(&block, Network::Regtest).unwrap_err();
        // A duplicated coinbase trips the coinbase-position rule first.
        assert!(matches!(
            err,
            BlockError::Transaction(TransactionError::CoinbaseInputFound)
        ));
    }

    #[test]
    fn mainnet_pow_filter_holds_for_genesis_only_variants() {
        wren_test::init();

        let block = genesis_block(Network::Mainnet);
        // The real genesis passes.
        difficulty_is_valid(&block.header, Network::Mainnet, &block.hash()).unwrap();

        // A nonce tweak makes the hash miss the mainnet target.
        let tweaked = wren_chain::block::Header::new(
            block.header.version,
            block.header.previous_block_hash,
            block.header.merkle_root,
            block.header.time,
            block.header.difficulty_threshold,
            block.header.nonce + 1,
        );
        assert!(matches!(
            difficulty_is_valid(&tweaked, Network::Mainnet, &tweaked.hash()),
            Err(BlockError::BadPow)
        ));
    }
}
