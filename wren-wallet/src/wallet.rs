//! The wallet proper: owned-output tracking, balance, and spending.

use std::collections::HashMap;
use std::convert::TryFrom;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, trace};

use wren_chain::amount::Amount;
use wren_chain::block::{Block, Height};
use wren_chain::parameters::Network;
use wren_chain::transaction::{self, LockTime, Transaction};
use wren_chain::transparent::{Address, Input, KeyPair, OutPoint, Output, Script};
use wren_consensus::{Chain, ChainListener};
use wren_script::{pay_to_pubkey, sign_signature, solve, Destination, SIGHASH_ALL};
use wren_state::Env;

use crate::keystore::KeyStore;
use crate::wallet_db::WalletDb;
use crate::wallet_tx::WalletTx;
use crate::WalletError;

/// The single owner of wallet state. Callers wrap it in a `Mutex`,
/// acquired after the chain lock and before nothing else.
pub struct Wallet {
    network: Network,
    keystore: KeyStore,
    address_book: HashMap<String, String>,
    txs: HashMap<transaction::Hash, WalletTx>,
    db: WalletDb,
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("network", &self.network)
            .field("keys", &self.keystore.len())
            .field("txs", &self.txs.len())
            .finish()
    }
}

impl Wallet {
    /// Load the wallet for `network`, creating and persisting a default
    /// key on first run.
    pub fn open(env: &Env, network: Network) -> Result<Wallet, WalletError> {
        let db = WalletDb::open(env)?;
        let mut wallet = Wallet {
            network,
            keystore: KeyStore::new(),
            address_book: HashMap::new(),
            txs: HashMap::new(),
            db,
        };

        let default_key = wallet.db.load_wallet(
            &mut wallet.keystore,
            &mut wallet.address_book,
            &mut wallet.txs,
        )?;

        match default_key {
            Some(pubkey) if wallet.keystore.contains_pubkey(&pubkey) => {
                wallet.keystore.set_default_key(pubkey);
            }
            _ => {
                let pair = wallet.generate_new_key()?;
                let pubkey = pair.serialized_public_key();
                wallet.keystore.set_default_key(pubkey.clone());
                wallet.db.write_default_key(&pubkey)?;
                let address = Address::from_pub_key(&pubkey, network);
                wallet.set_address_book_name(&address, "Your Address")?;
                info!(%address, "created default wallet key");
            }
        }

        Ok(wallet)
    }

    /// Generate, track, and persist a fresh key.
    pub fn generate_new_key(&mut self) -> Result<KeyPair, WalletError> {
        let pair = KeyPair::generate();
        self.keystore.add_key(&pair);
        self.db.write_key(&pair)?;
        Ok(pair)
    }

    pub fn keystore(&self) -> &KeyStore {
        &self.keystore
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// The address of the default (change) key.
    pub fn default_address(&self) -> Option<Address> {
        self.keystore
            .default_key()
            .map(|pubkey| Address::from_pub_key(pubkey, self.network))
    }

    pub fn set_address_book_name(
        &mut self,
        address: &Address,
        name: &str,
    ) -> Result<(), WalletError> {
        let address = address.to_string();
        self.db.write_name(&address, name)?;
        self.address_book.insert(address, name.to_string());
        Ok(())
    }

    pub fn address_book(&self) -> &HashMap<String, String> {
        &self.address_book
    }

    pub fn transactions(&self) -> impl Iterator<Item = &WalletTx> {
        self.txs.values()
    }

    // ---- ownership and value flows --------------------------------------

    /// Whether an output pays a key this wallet controls.
    pub fn is_mine_output(&self, output: &Output) -> bool {
        match solve(&output.lock_script) {
            Some(Destination::PubKey(pubkey)) => self.keystore.contains_pubkey(&pubkey),
            Some(Destination::PubKeyHash(hash)) => self.keystore.contains_hash(&hash),
            None => false,
        }
    }

    pub fn is_mine_tx(&self, tx: &Transaction) -> bool {
        tx.outputs.iter().any(|output| self.is_mine_output(output))
    }

    /// The value `tx` pays into this wallet.
    pub fn credit(&self, tx: &Transaction) -> i64 {
        tx.outputs
            .iter()
            .filter(|output| self.is_mine_output(output))
            .map(|output| i64::from(output.value))
            .sum()
    }

    /// The value `tx` takes out of this wallet.
    pub fn debit(&self, tx: &Transaction) -> i64 {
        let mut debit = 0;
        for input in tx.inputs.iter() {
            if let Some(outpoint) = input.outpoint() {
                if let Some(prev) = self.txs.get(&outpoint.hash) {
                    if let Some(output) = prev.tx().outputs.get(outpoint.index as usize) {
                        if self.is_mine_output(output) {
                            debit += i64::from(output.value);
                        }
                    }
                }
            }
        }
        debit
    }

    /// Track `tx` if it concerns this wallet, linking it to `block` when
    /// mined. Returns whether the wallet stored it.
    pub fn add_to_wallet_if_mine(
        &mut self,
        tx: &Transaction,
        block: Option<&Block>,
    ) -> Result<bool, WalletError> {
        let txid = tx.hash();
        let debit = self.debit(tx);
        if !(self.is_mine_tx(tx) || debit > 0 || self.txs.contains_key(&txid)) {
            return Ok(false);
        }

        // An arriving spend of our outputs marks its sources spent,
        // whoever authored it.
        for input in tx.inputs.iter() {
            if let Some(outpoint) = input.outpoint() {
                self.mark_spent(&outpoint)?;
            }
        }

        let mut wtx = self
            .txs
            .remove(&txid)
            .unwrap_or_else(|| WalletTx::new(tx.clone()));
        wtx.from_me = wtx.from_me || debit > 0;
        if let Some(block) = block {
            wtx.merkle.set_merkle_branch(block);
        }
        self.db.write_tx(&txid, &wtx)?;
        self.txs.insert(txid, wtx);
        trace!(%txid, "tracked wallet transaction");
        Ok(true)
    }

    fn mark_spent(&mut self, outpoint: &OutPoint) -> Result<(), WalletError> {
        let owned = self
            .txs
            .get(&outpoint.hash)
            .and_then(|prev| prev.tx().outputs.get(outpoint.index as usize))
            .map(|output| self.is_mine_output(output))
            .unwrap_or(false);
        if !owned {
            return Ok(());
        }
        if let Some(prev) = self.txs.get_mut(&outpoint.hash) {
            if !prev.spent {
                prev.spent = true;
                let record = prev.clone();
                self.db.write_tx(&outpoint.hash, &record)?;
            }
        }
        Ok(())
    }

    /// Sum of credit over owned, unspent, final, mature transactions on
    /// the main chain (plus our own unconfirmed change).
    pub fn balance(&self, chain: &Chain) -> i64 {
        let mut total = 0;
        for wtx in self.txs.values() {
            if wtx.spent || !wtx.tx().is_final(chain.best_height()) {
                continue;
            }
            if wtx.merkle.blocks_to_maturity(chain) > 0 {
                continue;
            }
            total += self.credit(wtx.tx());
        }
        total
    }

    /// Re-admit wallet transactions that fell off the main chain (after
    /// a reorganization, or on startup) to the mempool.
    pub fn reaccept_wallet_transactions(&self, chain: &mut Chain) {
        for wtx in self.txs.values() {
            if wtx.tx().is_coinbase() || wtx.merkle.is_in_main_chain(chain) {
                continue;
            }
            if let Err(error) =
                chain.accept_to_mempool(Arc::new(wtx.tx().clone()), true)
            {
                debug!(txid = %wtx.txid(), %error, "wallet transaction not re-accepted");
            }
        }
    }

    // ---- spending --------------------------------------------------------

    /// Build and sign a transaction paying `value` to `lock_script`,
    /// selecting owned coins greedily and sending change to the default
    /// key. Returns the transaction and the fee it pays.
    pub fn create_transaction(
        &self,
        lock_script: Script,
        value: i64,
        chain: &Chain,
    ) -> Result<(Transaction, i64), WalletError> {
        if value <= 0 {
            return Err(WalletError::ValueOutOfRange);
        }
        let change_key = self
            .keystore
            .default_key()
            .ok_or(WalletError::NoDefaultKey)?
            .to_vec();

        let mut fee: i64 = 0;
        loop {
            let (coins, total) = self.select_coins(value + fee, chain)?;

            let mut outputs = vec![Output {
                value: Amount::try_from(value).map_err(|_| WalletError::ValueOutOfRange)?,
                lock_script: lock_script.clone(),
            }];
            let change = total - value - fee;
            if change > 0 {
                outputs.push(Output {
                    value: Amount::try_from(change)
                        .map_err(|_| WalletError::ValueOutOfRange)?,
                    lock_script: pay_to_pubkey(&change_key),
                });
            }

            let inputs = coins
                .iter()
                .map(|(outpoint, _, _)| Input::PrevOut {
                    outpoint: *outpoint,
                    unlock_script: Script::new(Vec::new()),
                    sequence: std::u32::MAX,
                })
                .collect();
            let mut tx = Transaction::new(1, inputs, outputs, LockTime::unlocked());

            // Sign every input against its source lock script.
            for (index, (_, _, src_script)) in coins.iter().enumerate() {
                let key = self.key_for_lock_script(src_script)?;
                let unlock = sign_signature(&key, src_script, &tx, index, SIGHASH_ALL)?;
                match &mut tx.inputs[index] {
                    Input::PrevOut { unlock_script, .. } => *unlock_script = unlock,
                    _ => unreachable!("created inputs are prevouts"),
                }
            }

            let min_fee = i64::from(wren_consensus::transaction::check::min_fee(&tx, true));
            if fee < min_fee {
                fee = min_fee;
                continue;
            }
            return Ok((tx, fee));
        }
    }

    fn key_for_lock_script(&self, lock_script: &Script) -> Result<KeyPair, WalletError> {
        let pair = match solve(lock_script) {
            Some(Destination::PubKey(pubkey)) => self.keystore.key_for_pubkey(&pubkey)?,
            Some(Destination::PubKeyHash(hash)) => self.keystore.key_for_hash(&hash)?,
            None => None,
        };
        pair.ok_or(WalletError::Script(wren_script::Error::KeyMismatch))
    }

    /// Owned, unspent, mature coins worth at least `target` in total.
    fn select_coins(
        &self,
        target: i64,
        chain: &Chain,
    ) -> Result<(Vec<(OutPoint, i64, Script)>, i64), WalletError> {
        let mut selected = Vec::new();
        let mut total = 0;

        for wtx in self.txs.values() {
            if wtx.spent || !wtx.tx().is_final(chain.best_height()) {
                continue;
            }
            if wtx.merkle.blocks_to_maturity(chain) > 0 {
                continue;
            }
            // Confirmed coins, or our own unconfirmed change.
            if !wtx.merkle.is_in_main_chain(chain) && !wtx.from_me {
                continue;
            }
            let txid = wtx.txid();
            for (index, output) in wtx.tx().outputs.iter().enumerate() {
                if !self.is_mine_output(output) {
                    continue;
                }
                selected.push((
                    OutPoint {
                        hash: txid,
                        index: index as u32,
                    },
                    i64::from(output.value),
                    output.lock_script.clone(),
                ));
                total += i64::from(output.value);
            }
            if total >= target {
                break;
            }
        }

        if total < target {
            return Err(WalletError::InsufficientFunds);
        }
        Ok((selected, total))
    }

    /// Record a created transaction as ours, mark its inputs spent, and
    /// admit it to the mempool.
    pub fn commit_spend(
        &mut self,
        tx: Transaction,
        chain: &mut Chain,
    ) -> Result<transaction::Hash, WalletError> {
        let txid = tx.hash();

        for input in tx.inputs.iter() {
            if let Some(outpoint) = input.outpoint() {
                self.mark_spent(&outpoint)?;
            }
        }

        let mut wtx = WalletTx::new(tx.clone());
        wtx.from_me = true;
        self.add_supporting_transactions(&mut wtx, chain);
        self.db.write_tx(&txid, &wtx)?;
        self.txs.insert(txid, wtx);

        chain.accept_to_mempool(Arc::new(tx), true)?;
        info!(%txid, "committed wallet spend");
        Ok(txid)
    }

    /// Create, commit, and relay a payment in one step.
    pub fn send_money(
        &mut self,
        lock_script: Script,
        value: i64,
        chain: &mut Chain,
    ) -> Result<transaction::Hash, WalletError> {
        let (tx, _fee) = self.create_transaction(lock_script, value, chain)?;
        self.commit_spend(tx, chain)
    }

    /// Attach the previous transactions a third party would need to
    /// verify this one against the chain.
    fn add_supporting_transactions(&self, wtx: &mut WalletTx, chain: &Chain) {
        for input in wtx.merkle.tx.inputs.iter() {
            let outpoint = match input.outpoint() {
                Some(outpoint) => outpoint,
                None => continue,
            };
            if let Some(prev) = self.txs.get(&outpoint.hash) {
                wtx.vtx_prev.push(prev.merkle.clone());
            } else if let Some(prev_tx) = chain.transaction(&outpoint.hash) {
                wtx.vtx_prev
                    .push(crate::wallet_tx::MerkleTx::new(prev_tx));
            }
        }
    }
}

/// Adapter feeding chain events into a shared wallet; register it with
/// [`Chain::add_listener`].
pub struct WalletListener(pub Arc<Mutex<Wallet>>);

impl std::fmt::Debug for WalletListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletListener").finish()
    }
}

impl ChainListener for WalletListener {
    fn on_block_connected(&mut self, block: &Block, _height: Height) {
        let mut wallet = self.0.lock().expect("wallet lock");
        for tx in block.transactions.iter() {
            if let Err(error) = wallet.add_to_wallet_if_mine(tx, Some(block)) {
                debug!(%error, "wallet failed to track connected transaction");
            }
        }
    }

    fn on_block_disconnected(&mut self, block: &Block) {
        // Chain membership is derived from the index on demand, so there
        // is nothing to rewrite here; the owner re-admits loose wallet
        // transactions via `reaccept_wallet_transactions`.
        trace!(hash = %block.hash(), "wallet observed disconnect");
    }

    fn on_transaction_accepted(&mut self, tx: &Transaction) {
        let mut wallet = self.0.lock().expect("wallet lock");
        if let Err(error) = wallet.add_to_wallet_if_mine(tx, None) {
            debug!(%error, "wallet failed to track accepted transaction");
        }
    }
}
