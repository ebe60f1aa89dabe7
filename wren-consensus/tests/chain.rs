//! End-to-end chain state machine tests: genesis bootstrap, block
//! acceptance, mempool admission, reorganization, and restart recovery.

use std::convert::TryFrom;
use std::sync::Arc;

use chrono::Duration;
use tempdir::TempDir;

use wren_chain::amount::{Amount, CENT, COIN};
use wren_chain::block::{merkle, Block, Header, Height};
use wren_chain::parameters::{genesis_block, genesis_hash, Network};
use wren_chain::transaction::{LockTime, Transaction};
use wren_chain::transparent::{CoinbaseData, Input, OutPoint, Output, Script};
use wren_chain::work::difficulty::{CompactDifficulty, POW_LIMIT_BITS_REGTEST};
use wren_consensus::{BlockError, BlockOutcome, Chain, SubsidyError, TransactionError};
use wren_state::{BlockFiles, Config, Env};

const NET: Network = Network::Regtest;

fn test_config(dir: &TempDir) -> Config {
    Config {
        cache_dir: dir.path().to_path_buf(),
        ephemeral: false,
    }
}

fn open_chain(config: &Config) -> (Env, Chain) {
    let env = Env::open(config, NET).unwrap();
    let chain = Chain::open(&env, config, NET).unwrap();
    (env, chain)
}

/// A lock script anyone can satisfy with an empty unlock script (a bare
/// OP_1), so value tests don't need keys.
fn anyone_can_spend() -> Script {
    Script::new(vec![0x51])
}

/// A coinbase whose data encodes the height and a branch salt, keeping
/// txids unique across competing branches at the same height.
fn coinbase(height: Height, value: i64, salt: u8) -> Arc<Transaction> {
    let mut data = height.0.to_le_bytes().to_vec();
    data.push(salt);
    Arc::new(Transaction::new(
        1,
        vec![Input::Coinbase {
            data: CoinbaseData::new(data),
            sequence: std::u32::MAX,
        }],
        vec![Output {
            value: Amount::try_from(value).unwrap(),
            lock_script: anyone_can_spend(),
        }],
        LockTime::unlocked(),
    ))
}

/// Mine a regtest child of `parent`: assemble the transactions under a
/// fresh coinbase, then search the (tiny) nonce space.
fn mine_child(
    parent: &Block,
    parent_height: u32,
    txs: Vec<Arc<Transaction>>,
    salt: u8,
    reward: i64,
) -> Arc<Block> {
    let height = Height(parent_height + 1);
    let mut transactions = vec![coinbase(height, reward, salt)];
    transactions.extend(txs);

    let root: merkle::Root = transactions.iter().map(|tx| tx.hash()).collect();
    let time = parent.header.time + Duration::seconds(1);
    let bits = CompactDifficulty::from_bits(POW_LIMIT_BITS_REGTEST);
    let target = bits.to_expanded().unwrap();

    let mut nonce = 0u32;
    loop {
        let header = Header::new(1, parent.hash(), root, time, bits, nonce);
        if header.hash() <= target {
            return Arc::new(Block {
                header,
                transactions,
            });
        }
        nonce += 1;
    }
}

/// Extend the chain by `count` empty blocks, returning the blocks mined.
fn mine_chain(chain: &mut Chain, parent: &Block, parent_height: u32, count: u32) -> Vec<Arc<Block>> {
    let mut blocks = Vec::new();
    let mut tip = Arc::new(parent.clone());
    let mut height = parent_height;
    for _ in 0..count {
        let block = mine_child(&tip, height, vec![], 0, 50 * COIN);
        assert_eq!(
            chain.process_block(Arc::clone(&block)).unwrap(),
            BlockOutcome::Accepted
        );
        height += 1;
        tip = Arc::clone(&block);
        blocks.push(block);
    }
    blocks
}

/// An unsigned spend of `outpoint` (which must be locked by
/// [`anyone_can_spend`]) paying `values` out.
fn spend(outpoint: OutPoint, values: &[i64]) -> Arc<Transaction> {
    let outputs = values
        .iter()
        .map(|value| Output {
            value: Amount::try_from(*value).unwrap(),
            lock_script: anyone_can_spend(),
        })
        .collect();
    Arc::new(Transaction::new(
        1,
        vec![Input::PrevOut {
            outpoint,
            unlock_script: Script::new(vec![]),
            sequence: std::u32::MAX,
        }],
        outputs,
        LockTime::unlocked(),
    ))
}

#[test]
fn genesis_load() {
    wren_test::init();
    let dir = TempDir::new("wren-chain-test").unwrap();
    let config = test_config(&dir);

    {
        let (env, chain) = open_chain(&config);
        assert_eq!(chain.best_height(), Height(0));
        assert_eq!(chain.best_hash(), genesis_hash(NET));
        drop(chain);
        env.flush(true);
    }

    // A second start loads the persisted index and recovers the same tip
    // from hashBestChain.
    let (_env, chain) = open_chain(&config);
    assert_eq!(chain.best_height(), Height(0));
    assert_eq!(chain.best_hash(), genesis_hash(NET));
}

#[test]
fn single_block_extension() {
    wren_test::init();
    let dir = TempDir::new("wren-chain-test").unwrap();
    let config = test_config(&dir);
    let (_env, mut chain) = open_chain(&config);

    let genesis = genesis_block(NET);
    let b1 = mine_child(&genesis, 0, vec![], 0, 50 * COIN);
    assert_eq!(
        chain.process_block(Arc::clone(&b1)).unwrap(),
        BlockOutcome::Accepted
    );

    assert_eq!(chain.best_height(), Height(1));
    assert_eq!(chain.best_hash(), b1.hash());
    assert_eq!(chain.depth_in_main_chain(&b1.hash()), Some(1));
    assert_eq!(chain.depth_in_main_chain(&genesis.hash()), Some(2));

    // The coinbase seeded one unspent row in the UTXO index.
    let coinbase_id = b1.transactions[0].hash();
    let tx_index = chain.tx_index(&coinbase_id).expect("coinbase is indexed");
    assert_eq!(tx_index.spent.len(), 1);
    assert!(tx_index.spent[0].is_null());

    // The block body reads back from the block files.
    assert_eq!(chain.read_block(&b1.hash()).unwrap(), *b1);
}

#[test]
fn duplicate_blocks_are_already_have() {
    wren_test::init();
    let dir = TempDir::new("wren-chain-test").unwrap();
    let config = test_config(&dir);
    let (_env, mut chain) = open_chain(&config);

    let b1 = mine_child(&genesis_block(NET), 0, vec![], 0, 50 * COIN);
    assert_eq!(
        chain.process_block(Arc::clone(&b1)).unwrap(),
        BlockOutcome::Accepted
    );
    assert_eq!(
        chain.process_block(b1).unwrap(),
        BlockOutcome::AlreadyHave
    );
}

#[test]
fn orphans_wait_for_their_parent() {
    wren_test::init();
    let dir = TempDir::new("wren-chain-test").unwrap();
    let config = test_config(&dir);
    let (_env, mut chain) = open_chain(&config);

    let genesis = genesis_block(NET);
    let b1 = mine_child(&genesis, 0, vec![], 0, 50 * COIN);
    let b2 = mine_child(&b1, 1, vec![], 0, 50 * COIN);

    // The child arrives first and is parked.
    assert_eq!(
        chain.process_block(Arc::clone(&b2)).unwrap(),
        BlockOutcome::Orphan
    );
    assert_eq!(chain.best_height(), Height(0));

    // The parent arrives; both connect.
    assert_eq!(
        chain.process_block(Arc::clone(&b1)).unwrap(),
        BlockOutcome::Accepted
    );
    assert_eq!(chain.best_height(), Height(2));
    assert_eq!(chain.best_hash(), b2.hash());
}

#[test]
fn excessive_coinbase_value_is_rejected_and_remembered() {
    wren_test::init();
    let dir = TempDir::new("wren-chain-test").unwrap();
    let config = test_config(&dir);
    let (_env, mut chain) = open_chain(&config);

    let genesis = genesis_block(NET);
    let greedy = mine_child(&genesis, 0, vec![], 0, 51 * COIN);

    match chain.process_block(Arc::clone(&greedy)) {
        Err(BlockError::Subsidy(SubsidyError::ExcessiveCoinbaseValue)) => {}
        other => panic!("expected a subsidy rejection, got {:?}", other),
    }
    assert_eq!(chain.best_height(), Height(0));

    // The coinbase never made it into the UTXO index.
    assert!(chain.tx_index(&greedy.transactions[0].hash()).is_none());

    // Resubmission short-circuits.
    match chain.process_block(greedy) {
        Err(BlockError::KnownInvalid) => {}
        other => panic!("expected known-invalid, got {:?}", other),
    }
}

#[test]
fn stale_block_time_is_rejected() {
    wren_test::init();
    let dir = TempDir::new("wren-chain-test").unwrap();
    let config = test_config(&dir);
    let (_env, mut chain) = open_chain(&config);

    let genesis = genesis_block(NET);
    let mut stale = (*mine_child(&genesis, 0, vec![], 0, 50 * COIN)).clone();
    // Rewind the time to the parent's, which cannot beat the median.
    let bits = stale.header.difficulty_threshold;
    let target = bits.to_expanded().unwrap();
    let mut nonce = 0u32;
    stale.header = loop {
        let header = Header::new(
            1,
            genesis.hash(),
            stale.header.merkle_root,
            genesis.header.time,
            bits,
            nonce,
        );
        if header.hash() <= target {
            break header;
        }
        nonce += 1;
    };

    match chain.process_block(Arc::new(stale)) {
        Err(BlockError::TimeTooOld) => {}
        other => panic!("expected time-too-old, got {:?}", other),
    }
}

#[test]
fn mempool_rejects_double_spends() {
    wren_test::init();
    let dir = TempDir::new("wren-chain-test").unwrap();
    let config = test_config(&dir);
    let (_env, mut chain) = open_chain(&config);

    let genesis = genesis_block(NET);
    let blocks = mine_chain(&mut chain, &genesis, 0, 101);
    assert_eq!(chain.best_height(), Height(101));

    // Block 1's coinbase is now mature.
    let mature = OutPoint {
        hash: blocks[0].transactions[0].hash(),
        index: 0,
    };

    let x = spend(mature, &[50 * COIN]);
    chain.accept_to_mempool(Arc::clone(&x), true).unwrap();
    assert_eq!(chain.mempool().len(), 1);

    // A second spend of the same output conflicts, and the pool is
    // unchanged by the rejection.
    let y = spend(mature, &[49 * COIN, COIN]);
    match chain.accept_to_mempool(y, true) {
        Err(TransactionError::MempoolConflict) => {}
        other => panic!("expected txn-mempool-conflict, got {:?}", other),
    }
    assert_eq!(chain.mempool().len(), 1);
    assert!(chain.mempool().contains(&x.hash()));
}

#[test]
fn mempool_enforces_maturity_and_fees() {
    wren_test::init();
    let dir = TempDir::new("wren-chain-test").unwrap();
    let config = test_config(&dir);
    let (_env, mut chain) = open_chain(&config);

    let genesis = genesis_block(NET);
    let blocks = mine_chain(&mut chain, &genesis, 0, 10);

    // The newest coinbase is far from mature.
    let young = OutPoint {
        hash: blocks[9].transactions[0].hash(),
        index: 0,
    };
    match chain.accept_to_mempool(spend(young, &[50 * COIN]), true) {
        Err(TransactionError::ImmatureCoinbaseSpend) => {}
        other => panic!("expected an immature-spend rejection, got {:?}", other),
    }

    // Grow the chain until block 1's coinbase matures, then check the
    // dust floor: a sub-cent output demands a one-cent fee.
    mine_chain(&mut chain, &blocks[9], 10, 91);
    let mature = OutPoint {
        hash: blocks[0].transactions[0].hash(),
        index: 0,
    };
    let dusty_free = spend(mature, &[CENT - 1, 50 * COIN - (CENT - 1)]);
    match chain.accept_to_mempool(dusty_free, true) {
        Err(TransactionError::FeeBelowMinimum) => {}
        other => panic!("expected a fee rejection, got {:?}", other),
    }

    let dusty_paid = spend(mature, &[CENT - 1, 50 * COIN - (CENT - 1) - CENT]);
    chain.accept_to_mempool(dusty_paid, true).unwrap();
    assert_eq!(chain.mempool().len(), 1);
}

#[test]
fn missing_inputs_are_rejected() {
    wren_test::init();
    let dir = TempDir::new("wren-chain-test").unwrap();
    let config = test_config(&dir);
    let (_env, mut chain) = open_chain(&config);

    let phantom = OutPoint {
        hash: wren_chain::transaction::Hash([0xee; 32]),
        index: 0,
    };
    match chain.accept_to_mempool(spend(phantom, &[COIN]), true) {
        Err(TransactionError::MissingPrevOut) => {}
        other => panic!("expected bad-prev, got {:?}", other),
    }
}

#[test]
fn reorganization_switches_to_the_heavier_branch() {
    wren_test::init();
    let dir = TempDir::new("wren-chain-test").unwrap();
    let config = test_config(&dir);
    let (_env, mut chain) = open_chain(&config);

    let genesis = genesis_block(NET);
    let base = mine_chain(&mut chain, &genesis, 0, 101);
    let fork_point = Arc::clone(&base[100]);
    let fork_height = 101;

    let mature_coinbase = blocks_first_coinbase(&base);
    let x = spend(mature_coinbase, &[50 * COIN]);

    // Branch A: three blocks, the first carrying X.
    let a1 = mine_child(&fork_point, fork_height, vec![Arc::clone(&x)], b'a', 50 * COIN);
    let a2 = mine_child(&a1, fork_height + 1, vec![], b'a', 50 * COIN);
    let a3 = mine_child(&a2, fork_height + 2, vec![], b'a', 50 * COIN);
    for block in [&a1, &a2, &a3].iter() {
        assert_eq!(
            chain.process_block(Arc::clone(block)).unwrap(),
            BlockOutcome::Accepted
        );
    }
    assert_eq!(chain.best_hash(), a3.hash());
    assert_eq!(chain.best_height(), Height(fork_height + 3));

    // X is mined: the output it spends is marked.
    let spent_row = chain.tx_index(&mature_coinbase.hash).unwrap();
    assert!(!spent_row.spent[0].is_null());

    // Branch B: four empty blocks with strictly more cumulative work.
    let b1 = mine_child(&fork_point, fork_height, vec![], b'b', 50 * COIN);
    let b2 = mine_child(&b1, fork_height + 1, vec![], b'b', 50 * COIN);
    let b3 = mine_child(&b2, fork_height + 2, vec![], b'b', 50 * COIN);
    let b4 = mine_child(&b3, fork_height + 3, vec![], b'b', 50 * COIN);

    // The first three are side-chain blocks; the fourth triggers the
    // reorganization.
    for block in [&b1, &b2, &b3].iter() {
        chain.process_block(Arc::clone(block)).unwrap();
        assert_eq!(chain.best_hash(), a3.hash());
    }
    assert_eq!(
        chain.process_block(Arc::clone(&b4)).unwrap(),
        BlockOutcome::Accepted
    );

    assert_eq!(chain.best_hash(), b4.hash());
    assert_eq!(chain.best_height(), Height(fork_height + 4));

    // Branch A's non-coinbase transactions returned to the mempool; its
    // coinbases did not.
    assert!(chain.mempool().contains(&x.hash()));
    assert_eq!(chain.mempool().len(), 1);

    // The UTXO index matches a forward replay: X's input is unspent
    // again, branch A's transactions are unindexed, branch B's
    // coinbases are indexed.
    let replayed = chain.tx_index(&mature_coinbase.hash).unwrap();
    assert!(replayed.spent[0].is_null());
    assert!(chain.tx_index(&x.hash()).is_none());
    assert!(chain.tx_index(&a1.transactions[0].hash()).is_none());
    assert!(chain.tx_index(&b4.transactions[0].hash()).is_some());

    // Branch A is still indexed as a side chain.
    assert_eq!(chain.depth_in_main_chain(&a3.hash()), None);
    assert_eq!(chain.depth_in_main_chain(&b4.hash()), Some(1));
}

fn blocks_first_coinbase(blocks: &[Arc<Block>]) -> OutPoint {
    OutPoint {
        hash: blocks[0].transactions[0].hash(),
        index: 0,
    }
}

#[test]
fn immature_spend_in_a_block_aborts_the_connect() {
    wren_test::init();
    let dir = TempDir::new("wren-chain-test").unwrap();
    let config = test_config(&dir);
    let (_env, mut chain) = open_chain(&config);

    let genesis = genesis_block(NET);
    let blocks = mine_chain(&mut chain, &genesis, 0, 5);

    // A block trying to spend a 5-deep coinbase.
    let young = blocks_first_coinbase(&blocks);
    let bad = mine_child(
        &blocks[4],
        5,
        vec![spend(young, &[50 * COIN])],
        b'x',
        50 * COIN,
    );

    match chain.process_block(Arc::clone(&bad)) {
        Err(BlockError::Transaction(TransactionError::ImmatureCoinbaseSpend)) => {}
        other => panic!("expected an immature-spend rejection, got {:?}", other),
    }

    // The failed connect left no trace: tip unchanged, UTXO row intact,
    // and the block is remembered as invalid.
    assert_eq!(chain.best_hash(), blocks[4].hash());
    let row = chain.tx_index(&young.hash).unwrap();
    assert!(row.spent[0].is_null());
    match chain.process_block(bad) {
        Err(BlockError::KnownInvalid) => {}
        other => panic!("expected known-invalid, got {:?}", other),
    }
}

#[test]
fn conservation_is_enforced_in_blocks() {
    wren_test::init();
    let dir = TempDir::new("wren-chain-test").unwrap();
    let config = test_config(&dir);
    let (_env, mut chain) = open_chain(&config);

    let genesis = genesis_block(NET);
    let blocks = mine_chain(&mut chain, &genesis, 0, 101);

    let mature = blocks_first_coinbase(&blocks);
    let inflating = mine_child(
        &blocks[100],
        101,
        vec![spend(mature, &[60 * COIN])],
        b'x',
        50 * COIN,
    );

    match chain.process_block(inflating) {
        Err(BlockError::Transaction(TransactionError::ValueInBelowValueOut)) => {}
        other => panic!("expected a conservation rejection, got {:?}", other),
    }
    assert_eq!(chain.best_height(), Height(101));
}

#[test]
fn unindexed_trailing_block_bytes_are_ignored_on_restart() {
    wren_test::init();
    let dir = TempDir::new("wren-chain-test").unwrap();
    let config = test_config(&dir);

    let genesis = genesis_block(NET);
    let b1 = mine_child(&genesis, 0, vec![], 0, 50 * COIN);
    let b2 = mine_child(&b1, 1, vec![], 0, 50 * COIN);

    {
        let (env, mut chain) = open_chain(&config);
        chain.process_block(Arc::clone(&b1)).unwrap();
        assert_eq!(chain.best_height(), Height(1));
        drop(chain);
        env.flush(true);
    }

    // Simulate a crash after the block-file append but before the index
    // commit: b2's bytes land in the file with no index record.
    {
        let mut files = BlockFiles::open(config.block_dir(NET), NET).unwrap();
        files.write_block(&b2).unwrap();
    }

    // Restart: the tip is the last committed block; the stray bytes are
    // ignored, and the same block can still be accepted normally.
    let (_env, mut chain) = open_chain(&config);
    assert_eq!(chain.best_height(), Height(1));
    assert_eq!(chain.best_hash(), b1.hash());

    assert_eq!(
        chain.process_block(Arc::clone(&b2)).unwrap(),
        BlockOutcome::Accepted
    );
    assert_eq!(chain.best_height(), Height(2));
    assert_eq!(chain.best_hash(), b2.hash());
}

#[test]
fn side_chain_state_survives_restart() {
    wren_test::init();
    let dir = TempDir::new("wren-chain-test").unwrap();
    let config = test_config(&dir);

    let genesis = genesis_block(NET);
    let a1 = mine_child(&genesis, 0, vec![], b'a', 50 * COIN);
    let b1 = mine_child(&genesis, 0, vec![], b'b', 50 * COIN);
    let b2 = mine_child(&b1, 1, vec![], b'b', 50 * COIN);

    {
        let (env, mut chain) = open_chain(&config);
        chain.process_block(Arc::clone(&a1)).unwrap();
        chain.process_block(Arc::clone(&b1)).unwrap();
        chain.process_block(Arc::clone(&b2)).unwrap();
        assert_eq!(chain.best_hash(), b2.hash());
        drop(chain);
        env.flush(true);
    }

    let (_env, chain) = open_chain(&config);
    assert_eq!(chain.best_hash(), b2.hash());
    assert_eq!(chain.best_height(), Height(2));
    // The losing branch is still indexed, off the main chain.
    assert_eq!(chain.depth_in_main_chain(&a1.hash()), None);
    assert_eq!(chain.depth_in_main_chain(&b1.hash()), Some(2));

    // The replayed UTXO rows point at readable records in the block
    // files.
    let row = chain.tx_index(&b1.transactions[0].hash()).unwrap();
    assert!(!row.pos.is_null());
    assert_eq!(chain.read_block(&b1.hash()).as_ref(), Some(&*b1));
    assert_eq!(
        chain.transaction(&b1.transactions[0].hash()).as_ref(),
        Some(&*b1.transactions[0])
    );
}
