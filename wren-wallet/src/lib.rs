//! The wallet: keys, the address book, owned-output tracking, and a
//! derived balance view reconciled with chain events.
//!
//! The wallet is its own lock owner: acquire the chain lock before the
//! wallet lock, and the wallet lock before the keystore it contains.

pub mod keystore;
pub mod wallet;
pub mod wallet_db;
pub mod wallet_tx;

pub use keystore::KeyStore;
pub use wallet::{Wallet, WalletListener};
pub use wallet_db::WalletDb;
pub use wallet_tx::{MerkleTx, WalletTx};

use displaydoc::Display;
use thiserror::Error;

use wren_state::StoreError;

/// Wallet operation failures.
#[derive(Error, Display, Debug)]
pub enum WalletError {
    /// not enough mature funds to cover the requested value and fee
    InsufficientFunds,
    /// requested value is out of range
    ValueOutOfRange,
    /// no default key available for change
    NoDefaultKey,
    /// signing failed: {0}
    Script(#[from] wren_script::Error),
    /// key failure: {0}
    Key(#[from] wren_chain::transparent::KeyError),
    /// storage failure: {0}
    Store(#[from] StoreError),
    /// pool rejected the transaction: {0}
    Mempool(#[from] wren_consensus::TransactionError),
}
