//! The chain state machine: block acceptance, best-chain selection,
//! reorganization, and mempool admission.
//!
//! A known block is in one of four states:
//!
//! - **orphan**: received, parent unknown; held aside until the parent
//!   arrives;
//! - **side**: parent known, not on the best chain;
//! - **main**: on the path from genesis to the best tip;
//! - **invalid**: failed a check; remembered so re-submission is cheap.
//!
//! Every durable mutation of a chain transition happens inside a single
//! write scope on the chain table, committed only when the whole
//! transition succeeds; the in-memory tip and mempool change only after
//! the commit. On restart the tip is rebuilt from the persisted
//! `hashBestChain`, so a crash mid-transition leaves the node at its
//! last committed tip with, at worst, unindexed trailing bytes in a
//! block file.

use std::collections::{HashMap, HashSet};
use std::convert::TryFrom;
use std::sync::Arc;

use tracing::{debug, info, warn};

use wren_chain::amount::{Amount, NonNegative};
use wren_chain::block::{self, Block, Header, Height};
use wren_chain::compactint::CompactInt;
use wren_chain::parameters::{genesis_block, Network};
use wren_chain::transaction::{self, Transaction};
use wren_script::verify_script;
use wren_state::{
    BlockFiles, BlockIndex, ChainDb, Config, DiskTxPos, Env, NodeId, TxIndex,
};

use crate::block::check;
use crate::difficulty::next_required_bits;
use crate::error::{BlockError, TransactionError};
use crate::mempool::Mempool;
use crate::parameters::COINBASE_MATURITY;
use crate::timedata::NetworkTime;
use crate::transaction::check as tx_check;

/// Callbacks into the collaborators around the chain: the wallet and the
/// peer layer.
pub trait ChainListener: Send {
    /// A block joined the main chain at `height`.
    fn on_block_connected(&mut self, _block: &Block, _height: Height) {}
    /// A block left the main chain during a reorganization.
    fn on_block_disconnected(&mut self, _block: &Block) {}
    /// A transaction entered the mempool.
    fn on_transaction_accepted(&mut self, _tx: &Transaction) {}
    /// We are missing `hash`; ask peers for it.
    fn request_block(&mut self, _hash: block::Hash) {}
}

/// What `process_block` did with a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// The block was written, indexed, and possibly became the best tip.
    Accepted,
    /// The block (or an orphan copy of it) was already known.
    AlreadyHave,
    /// The parent is unknown; the block is parked and the parent
    /// requested.
    Orphan,
}

/// In-memory and collaborator updates produced by a committed chain
/// transition, applied only after the durable scope commits.
#[derive(Default)]
struct Effects {
    new_best: Option<NodeId>,
    next_updates: Vec<(NodeId, Option<NodeId>)>,
    connected: Vec<(Arc<Block>, Height)>,
    disconnected: Vec<Arc<Block>>,
}

struct ScopedFailure {
    error: BlockError,
    /// The block whose connect failed, when there is one to blame.
    offender: Option<block::Hash>,
}

/// Whether a rejection is a property of the block itself (remember it)
/// rather than a transient local condition (don't).
fn marks_invalid(error: &BlockError) -> bool {
    match error {
        BlockError::Store(_)
        | BlockError::Time(_)
        | BlockError::NoGenesis
        | BlockError::MissingBestChain => false,
        BlockError::Transaction(TransactionError::Store(_)) => false,
        _ => true,
    }
}

/// The single owner of chain state: block index, block files, chain
/// table, orphan set, and mempool. Callers wrap it in a `Mutex` (the
/// outermost lock in the documented order), so every observer sees one
/// consistent (tip, UTXO view, mempool) triple.
pub struct Chain {
    network: Network,
    db: ChainDb,
    files: BlockFiles,
    index: BlockIndex,
    mempool: Mempool,
    /// Blocks whose parents we have not seen, keyed by parent hash.
    orphans: HashMap<block::Hash, Vec<Arc<Block>>>,
    orphan_hashes: HashSet<block::Hash>,
    /// Known-bad blocks, kept to short-circuit re-acceptance.
    invalid: HashSet<block::Hash>,
    time: NetworkTime,
    listeners: Vec<Box<dyn ChainListener>>,
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("network", &self.network)
            .field("best_height", &self.index.best_height())
            .field("mempool", &self.mempool.len())
            .field("orphans", &self.orphan_hashes.len())
            .finish()
    }
}

impl Chain {
    /// Open the chain state for `network`, creating and committing the
    /// genesis block on first run.
    pub fn open(env: &Env, config: &Config, network: Network) -> Result<Chain, BlockError> {
        let db = ChainDb::open(env)?;
        let files = BlockFiles::open(config.block_dir(network), network)
            .map_err(BlockError::Store)?;
        let mut chain = Chain {
            network,
            db,
            files,
            index: BlockIndex::new(),
            mempool: Mempool::new(),
            orphans: HashMap::new(),
            orphan_hashes: HashSet::new(),
            invalid: HashSet::new(),
            time: NetworkTime::new(),
            listeners: Vec::new(),
        };
        chain.load_block_index(true)?;
        Ok(chain)
    }

    /// Materialize the block index from the chain table, or seed a fresh
    /// store with the genesis block when `allow_new` is set.
    fn load_block_index(&mut self, allow_new: bool) -> Result<(), BlockError> {
        let records = self.db.read_block_index_records()?;

        if records.is_empty() {
            if !allow_new {
                return Err(BlockError::NoGenesis);
            }
            let genesis = genesis_block(self.network);
            check::check_block(&genesis, self.network)?;
            let (file, pos) = self.files.write_block(&genesis).map_err(BlockError::Store)?;
            let id = self
                .index
                .insert(genesis.header, file, pos)
                .expect("the genesis header links to the null parent");

            self.db.txn_begin();
            let written = self
                .db
                .write_block_index(&self.index.to_disk(id))
                .and_then(|_| self.db.write_hash_best_chain(&genesis.hash()));
            if let Err(error) = written {
                let _ = self.db.txn_abort();
                return Err(error.into());
            }
            self.db.txn_commit()?;
            self.index.set_best(id);
            info!(hash = %genesis.hash(), "created genesis block");
            return Ok(());
        }

        self.index = BlockIndex::from_disk(records, self.network);
        let best_hash = self
            .db
            .read_hash_best_chain()?
            .ok_or(BlockError::MissingBestChain)?;
        let best = self
            .index
            .lookup(&best_hash)
            .ok_or(BlockError::MissingBestChain)?;
        self.index.set_best(best);
        info!(
            %best_hash,
            height = self.index.get(best).height.0,
            blocks = self.index.len(),
            "loaded block index"
        );
        Ok(())
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Read-only view of the block index.
    pub fn index(&self) -> &BlockIndex {
        &self.index
    }

    /// Read-only view of the mempool.
    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    pub fn best_height(&self) -> Height {
        self.index.best_height().unwrap_or(Height(0))
    }

    pub fn best_hash(&self) -> block::Hash {
        self.index
            .best()
            .map(|id| self.index.get(id).hash)
            .expect("an opened chain always has a tip")
    }

    /// Record a peer's clock offset for network-adjusted time.
    pub fn add_time_sample(&mut self, offset_seconds: i64) {
        self.time.add_sample(offset_seconds);
    }

    pub fn add_listener(&mut self, listener: Box<dyn ChainListener>) {
        self.listeners.push(listener);
    }

    /// The confirmation count of the block `hash`, if it is on the main
    /// chain: 1 for the tip, 2 for its parent, and so on.
    pub fn depth_in_main_chain(&self, hash: &block::Hash) -> Option<u32> {
        let id = self.index.lookup(hash)?;
        if !self.index.is_in_main_chain(id) {
            return None;
        }
        Some(self.best_height().0 - self.index.get(id).height.0 + 1)
    }

    /// A locator for our current tip.
    pub fn block_locator(&self) -> Vec<block::Hash> {
        match self.index.best() {
            Some(best) => self.index.locator(best, self.network),
            None => Vec::new(),
        }
    }

    /// Fetch a block body from the block files.
    pub fn read_block(&self, hash: &block::Hash) -> Option<Block> {
        let id = self.index.lookup(hash)?;
        let node = self.index.get(id);
        self.files.read_block(node.file, node.block_pos).ok()
    }

    /// Look a transaction up in the mempool, then in the chain index.
    pub fn transaction(&self, txid: &transaction::Hash) -> Option<Transaction> {
        if let Some(tx) = self.mempool.get(txid) {
            return Some(Transaction::clone(tx));
        }
        let tx_index = self.db.read_tx_index(txid).ok()??;
        self.files.read_transaction(&tx_index.pos).ok()
    }

    /// The persisted spent-output row for `txid`.
    pub fn tx_index(&self, txid: &transaction::Hash) -> Option<TxIndex> {
        self.db.read_tx_index(txid).ok()?
    }

    // ---- block acceptance ------------------------------------------------

    /// The acceptance protocol for an incoming block.
    pub fn process_block(&mut self, block: Arc<Block>) -> Result<BlockOutcome, BlockError> {
        let hash = block.hash();

        // Known-bad first: a block that failed a connect may still sit in
        // the in-memory index as a dead side entry.
        if self.invalid.contains(&hash) {
            return Err(BlockError::KnownInvalid);
        }
        if self.index.contains(&hash) || self.orphan_hashes.contains(&hash) {
            return Ok(BlockOutcome::AlreadyHave);
        }

        if let Err(error) = check::check_block(&block, self.network) {
            if marks_invalid(&error) {
                self.invalid.insert(hash);
            }
            return Err(error);
        }

        let parent = block.header.previous_block_hash;
        if self.invalid.contains(&parent) {
            self.invalid.insert(hash);
            return Err(BlockError::BadPrev);
        }
        if !self.index.contains(&parent) {
            debug!(%hash, %parent, "orphan block, requesting parent");
            self.orphan_hashes.insert(hash);
            self.orphans.entry(parent).or_default().push(block);
            for listener in self.listeners.iter_mut() {
                listener.request_block(parent);
            }
            return Ok(BlockOutcome::Orphan);
        }

        self.accept_block(block)?;

        // Recursively process any orphans that were waiting for this
        // block.
        let mut arrived = vec![hash];
        while let Some(parent) = arrived.pop() {
            if let Some(children) = self.orphans.remove(&parent) {
                for child in children {
                    let child_hash = child.hash();
                    self.orphan_hashes.remove(&child_hash);
                    match self.accept_block(child) {
                        Ok(_) => arrived.push(child_hash),
                        Err(error) => {
                            warn!(hash = %child_hash, %error, "parked orphan failed acceptance");
                        }
                    }
                }
            }
        }

        Ok(BlockOutcome::Accepted)
    }

    fn contextual_checks(
        &self,
        block: &Block,
        parent: NodeId,
        height: Height,
        hash: &block::Hash,
    ) -> Result<(), BlockError> {
        // The difficulty must be exactly the scheduled retarget value.
        if block.header.difficulty_threshold != next_required_bits(&self.index, parent, self.network)
        {
            return Err(BlockError::BadDiffBits);
        }

        // The block time must beat the median of the last 11 and not
        // outrun our adjusted clock by more than two hours.
        if block.header.time <= self.index.median_time_past(parent) {
            return Err(BlockError::TimeTooOld);
        }
        block
            .header
            .time_is_valid_at(self.time.adjusted_now(), &height, hash)?;

        // Every transaction must be final at this height.
        for tx in block.transactions.iter() {
            if !tx.is_final(height) {
                return Err(TransactionError::NotFinal.into());
            }
        }
        Ok(())
    }

    /// Contextual checks, durable write, index insertion, and (when the
    /// block carries the most cumulative work) the best-chain switch.
    ///
    /// Marks the block invalid itself whenever the rejection is the
    /// block's own fault.
    fn accept_block(&mut self, block: Arc<Block>) -> Result<NodeId, BlockError> {
        let hash = block.hash();
        let parent = self
            .index
            .lookup(&block.header.previous_block_hash)
            .ok_or(BlockError::BadPrev)?;
        let height = self.index.get(parent).height.next();

        if let Err(error) = self.contextual_checks(&block, parent, height, &hash) {
            if marks_invalid(&error) {
                self.invalid.insert(hash);
            }
            return Err(error);
        }

        let (file, pos) = self.files.write_block(&block).map_err(BlockError::Store)?;
        let id = self
            .index
            .insert(block.header, file, pos)
            .ok_or(BlockError::BadPow)?;

        self.db.txn_begin();
        if let Err(error) = self.db.write_block_index(&self.index.to_disk(id)) {
            let _ = self.db.txn_abort();
            return Err(error.into());
        }

        if self.index.get(id).chain_work > self.index.best_work() {
            match self.set_best_chain_scoped(id, &block) {
                Ok(effects) => {
                    self.db.txn_commit()?;
                    self.apply_effects(effects);
                    info!(%hash, height = height.0, "new best block");
                }
                Err(failure) => {
                    let _ = self.db.txn_abort();
                    if let Some(bad) = failure.offender {
                        self.invalid.insert(bad);
                        if bad == hash {
                            // The freshly appended record is dead weight;
                            // blank it.
                            let _ = self.files.erase_block(file, pos);
                        }
                    }
                    return Err(failure.error);
                }
            }
        } else {
            self.db.txn_commit()?;
            debug!(%hash, height = height.0, "accepted side-chain block");
        }

        Ok(id)
    }

    /// Inside an open scope: move the best chain to `new_tip`, either by
    /// connecting one extending block or by a full reorganization.
    fn set_best_chain_scoped(
        &mut self,
        new_tip: NodeId,
        new_block: &Arc<Block>,
    ) -> Result<Effects, ScopedFailure> {
        let mut effects = Effects::default();
        let new_hash = self.index.get(new_tip).hash;
        let best = self
            .index
            .best()
            .expect("an opened chain always has a tip");

        if self.index.get(new_tip).prev == Some(best) {
            // Extending the current best chain.
            let height = self.index.get(new_tip).height;
            self.connect_block_scoped(new_tip, new_block)
                .map_err(|error| ScopedFailure {
                    error,
                    offender: Some(new_hash),
                })?;
            self.write_index_record_with_next(best, Some(new_tip))
                .map_err(|error| ScopedFailure {
                    error: error.into(),
                    offender: None,
                })?;
            effects.next_updates.push((best, Some(new_tip)));
            effects.connected.push((Arc::clone(new_block), height));
        } else {
            // A heavier branch: disconnect back to the fork, connect
            // forward to the candidate.
            let fork = self.index.find_fork(best, new_tip);
            let disconnect_path = self.index.path_from_fork(fork, best);
            let connect_path = self.index.path_from_fork(fork, new_tip);
            info!(
                fork = %self.index.get(fork).hash,
                disconnecting = disconnect_path.len(),
                connecting = connect_path.len(),
                "reorganizing"
            );

            for &id in disconnect_path.iter().rev() {
                let node = self.index.get(id);
                let (node_file, node_pos) = (node.file, node.block_pos);
                let blk = self
                    .files
                    .read_block(node_file, node_pos)
                    .map_err(|error| ScopedFailure {
                        error: error.into(),
                        offender: None,
                    })?;
                self.disconnect_block_scoped(&blk).map_err(|error| {
                    ScopedFailure {
                        error,
                        offender: None,
                    }
                })?;
                self.write_index_record_with_next(id, None)
                    .map_err(|error| ScopedFailure {
                        error: error.into(),
                        offender: None,
                    })?;
                effects.next_updates.push((id, None));
                effects.disconnected.push(Arc::new(blk));
            }

            let mut prev = fork;
            for &id in connect_path.iter() {
                let node = self.index.get(id);
                let (node_file, node_pos, node_height) = (node.file, node.block_pos, node.height);
                let blk = if id == new_tip {
                    Arc::clone(new_block)
                } else {
                    Arc::new(self.files.read_block(node_file, node_pos).map_err(
                        |error| ScopedFailure {
                            error: error.into(),
                            offender: None,
                        },
                    )?)
                };
                self.connect_block_scoped(id, &blk).map_err(|error| {
                    ScopedFailure {
                        error,
                        offender: Some(blk.hash()),
                    }
                })?;
                self.write_index_record_with_next(prev, Some(id))
                    .map_err(|error| ScopedFailure {
                        error: error.into(),
                        offender: None,
                    })?;
                effects.next_updates.push((prev, Some(id)));
                effects.connected.push((blk, node_height));
                prev = id;
            }
        }

        self.db
            .write_hash_best_chain(&new_hash)
            .map_err(|error| ScopedFailure {
                error: error.into(),
                offender: None,
            })?;
        effects.new_best = Some(new_tip);
        Ok(effects)
    }

    /// Rewrite a node's persisted record with an explicit forward link,
    /// used while the in-memory links still describe the old chain.
    fn write_index_record_with_next(
        &mut self,
        id: NodeId,
        next: Option<NodeId>,
    ) -> Result<(), wren_state::StoreError> {
        let mut record = self.index.to_disk(id);
        record.hash_next = next
            .map(|next_id| self.index.get(next_id).hash)
            .unwrap_or_else(block::Hash::zero);
        self.db.write_block_index(&record)
    }

    /// Apply a committed transition to the in-memory index, the mempool,
    /// and the listeners.
    fn apply_effects(&mut self, effects: Effects) {
        for (id, next) in effects.next_updates.iter() {
            self.index.set_next(*id, *next);
        }
        if let Some(best) = effects.new_best {
            self.index.set_best(best);
        }

        for blk in effects.disconnected.iter() {
            // Disconnected transactions go back to the pool, except
            // coinbases, whose value ceased to exist.
            for tx in blk.transactions.iter().skip(1) {
                self.mempool.insert(Arc::clone(tx));
            }
            for listener in self.listeners.iter_mut() {
                listener.on_block_disconnected(blk);
            }
        }
        for (blk, height) in effects.connected.iter() {
            for tx in blk.transactions.iter() {
                self.mempool.remove(&tx.hash());
            }
            for listener in self.listeners.iter_mut() {
                listener.on_block_connected(blk, *height);
            }
        }
    }

    /// Inside an open scope: apply `block`'s transactions to the UTXO
    /// view, checking input existence, maturity, double-spends, scripts,
    /// conservation, and the coinbase subsidy cap.
    fn connect_block_scoped(&mut self, id: NodeId, block: &Block) -> Result<(), BlockError> {
        let node = self.index.get(id);
        let (file, block_pos, height, parent) =
            (node.file, node.block_pos, node.height, node.prev);

        let mut tx_pos =
            block_pos as usize + Header::len() + CompactInt::size(block.transactions.len());
        let mut fees: i64 = 0;

        for (tx_number, tx) in block.transactions.iter().enumerate() {
            let pos_this = DiskTxPos::new(file, block_pos, tx_pos as u32);

            if !tx.is_coinbase() {
                let mut value_in: i64 = 0;
                for (input_index, input) in tx.inputs.iter().enumerate() {
                    let outpoint = input
                        .outpoint()
                        .ok_or(TransactionError::NullPrevOut)?;
                    let mut prev_index = self
                        .db
                        .read_tx_index(&outpoint.hash)
                        .map_err(TransactionError::Store)?
                        .ok_or(TransactionError::MissingPrevOut)?;
                    let prev_tx = self
                        .files
                        .read_transaction(&prev_index.pos)
                        .map_err(TransactionError::Store)?;

                    let n = outpoint.index as usize;
                    if n >= prev_tx.outputs.len() {
                        return Err(TransactionError::InputOutOfRange.into());
                    }
                    assert_eq!(
                        prev_index.spent.len(),
                        prev_tx.outputs.len(),
                        "spent vector length diverged from output count for {}: store is corrupt",
                        outpoint.hash,
                    );
                    if !prev_index.spent[n].is_null() {
                        return Err(TransactionError::DoubleSpend.into());
                    }

                    if prev_tx.is_coinbase() {
                        self.check_coinbase_maturity(parent, &prev_index.pos)?;
                    }

                    let unlock_script = match input {
                        wren_chain::transparent::Input::PrevOut { unlock_script, .. } => {
                            unlock_script
                        }
                        _ => unreachable!("outpoint() filtered coinbase inputs"),
                    };
                    verify_script(
                        unlock_script,
                        &prev_tx.outputs[n].lock_script,
                        tx,
                        input_index,
                    )
                    .map_err(TransactionError::Script)?;

                    value_in += i64::from(prev_tx.outputs[n].value);

                    prev_index.spent[n] = pos_this;
                    self.db
                        .update_tx_index(&outpoint.hash, &prev_index)
                        .map_err(TransactionError::Store)?;
                }

                let value_out = i64::from(tx.value_out().map_err(TransactionError::Amount)?);
                if value_in < value_out {
                    return Err(TransactionError::ValueInBelowValueOut.into());
                }
                fees += value_in - value_out;
            } else if tx_number != 0 {
                return Err(TransactionError::CoinbasePosition.into());
            }

            self.db
                .add_tx_index(tx, &pos_this)
                .map_err(TransactionError::Store)?;
            tx_pos += tx.serialized_size();
        }

        let fees = Amount::<NonNegative>::try_from(fees).map_err(TransactionError::Amount)?;
        check::subsidy_is_valid(block, height, fees)?;
        Ok(())
    }

    /// Inside an open scope: revert `block`'s transactions from the UTXO
    /// view.
    fn disconnect_block_scoped(&mut self, block: &Block) -> Result<(), BlockError> {
        for tx in block.transactions.iter().rev() {
            if !tx.is_coinbase() {
                for input in tx.inputs.iter() {
                    let outpoint = input
                        .outpoint()
                        .ok_or(TransactionError::NullPrevOut)?;
                    let mut prev_index = self
                        .db
                        .read_tx_index(&outpoint.hash)
                        .map_err(TransactionError::Store)?
                        .ok_or(TransactionError::MissingPrevOut)?;
                    let n = outpoint.index as usize;
                    if n >= prev_index.spent.len() {
                        return Err(TransactionError::InputOutOfRange.into());
                    }
                    prev_index.spent[n] = DiskTxPos::null();
                    self.db
                        .update_tx_index(&outpoint.hash, &prev_index)
                        .map_err(TransactionError::Store)?;
                }
            }
            self.db
                .erase_tx_index(tx)
                .map_err(TransactionError::Store)?;
        }
        Ok(())
    }

    /// A coinbase output is spendable only once `COINBASE_MATURITY`
    /// confirmations deep. `spend_parent` is the parent of the block (or
    /// tip, for mempool checks) doing the spending.
    fn check_coinbase_maturity(
        &self,
        spend_parent: Option<NodeId>,
        prev_pos: &DiskTxPos,
    ) -> Result<(), TransactionError> {
        let mut cursor = spend_parent;
        for _ in 0..COINBASE_MATURITY - 1 {
            let id = match cursor {
                Some(id) => id,
                None => break,
            };
            let node = self.index.get(id);
            if node.file == prev_pos.file && node.block_pos == prev_pos.block_pos {
                return Err(TransactionError::ImmatureCoinbaseSpend);
            }
            cursor = node.prev;
        }
        Ok(())
    }

    // ---- mempool admission ----------------------------------------------

    /// Admit a loose transaction to the mempool.
    ///
    /// With `check_inputs` unset (used when a reorganization resurrects
    /// transactions from disconnected blocks) only the stateless checks
    /// and conflict detection run.
    pub fn accept_to_mempool(
        &mut self,
        tx: Arc<Transaction>,
        check_inputs: bool,
    ) -> Result<(), TransactionError> {
        tx_check::check_transaction(&tx)?;
        if tx.is_coinbase() {
            return Err(TransactionError::CoinbaseInPool);
        }
        if !tx.is_final(self.best_height()) {
            return Err(TransactionError::NotFinal);
        }

        let txid = tx.hash();
        if self.mempool.contains(&txid) {
            return Ok(());
        }
        if self.db.contains_tx(&txid)? {
            // Already mined; nothing to do.
            return Ok(());
        }

        // Conflicts against the pool are checked regardless of
        // `check_inputs`; two pool spends of one output can never both
        // confirm.
        for input in tx.inputs.iter() {
            let outpoint = input.outpoint().ok_or(TransactionError::NullPrevOut)?;
            if self.mempool.conflict(&outpoint).is_some() {
                return Err(TransactionError::MempoolConflict);
            }
        }

        if check_inputs {
            self.check_mempool_inputs(&tx)?;
        }

        self.mempool.insert(Arc::clone(&tx));
        debug!(%txid, pool_size = self.mempool.len(), "accepted transaction");
        for listener in self.listeners.iter_mut() {
            listener.on_transaction_accepted(&tx);
        }
        Ok(())
    }

    /// Resolve a loose transaction's inputs against the current best
    /// chain and the pool itself (chained acceptance), then check
    /// maturity, scripts, conservation, and the relay fee.
    fn check_mempool_inputs(&self, tx: &Transaction) -> Result<(), TransactionError> {
        let best = self.index.best();
        let mut value_in: i64 = 0;

        for (input_index, input) in tx.inputs.iter().enumerate() {
            let outpoint = input.outpoint().ok_or(TransactionError::NullPrevOut)?;
            let n = outpoint.index as usize;

            let prev_output = if let Some(pool_tx) = self.mempool.get(&outpoint.hash) {
                // Chained acceptance on an unconfirmed parent.
                pool_tx
                    .outputs
                    .get(n)
                    .cloned()
                    .ok_or(TransactionError::InputOutOfRange)?
            } else {
                let prev_index = self
                    .db
                    .read_tx_index(&outpoint.hash)?
                    .ok_or(TransactionError::MissingPrevOut)?;
                let prev_tx = self
                    .files
                    .read_transaction(&prev_index.pos)
                    .map_err(TransactionError::Store)?;
                if n >= prev_tx.outputs.len() {
                    return Err(TransactionError::InputOutOfRange);
                }
                if !prev_index.spent[n].is_null() {
                    return Err(TransactionError::DoubleSpend);
                }
                if prev_tx.is_coinbase() {
                    self.check_coinbase_maturity(best, &prev_index.pos)?;
                }
                prev_tx.outputs[n].clone()
            };

            let unlock_script = match input {
                wren_chain::transparent::Input::PrevOut { unlock_script, .. } => unlock_script,
                _ => unreachable!("outpoint() filtered coinbase inputs"),
            };
            verify_script(unlock_script, &prev_output.lock_script, tx, input_index)?;

            value_in += i64::from(prev_output.value);
        }

        let value_out = i64::from(tx.value_out()?);
        if value_in < value_out {
            return Err(TransactionError::ValueInBelowValueOut);
        }
        let fee = value_in - value_out;
        if fee < i64::from(tx_check::min_fee(tx, true)) {
            return Err(TransactionError::FeeBelowMinimum);
        }
        Ok(())
    }
}
