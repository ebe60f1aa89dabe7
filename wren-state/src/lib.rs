//! Durable state for a Wren node: the typed key/value store, the
//! append-only block files, the transaction (UTXO) index records, the
//! in-memory block index, and the peer address book.
//!
//! # Locking
//!
//! Shared structures each have a single owner guarded by an explicit
//! mutex. A thread that needs several acquires them in this order:
//!
//! 1. the chain state (block index, mempool, orphans),
//! 2. the wallet,
//! 3. the keystore,
//! 4. the store environment ([`Env`]'s internal file-use registry).
//!
//! The peer address book lock is a leaf and may be taken last from
//! anywhere.

pub mod addr;
pub mod block_file;
pub mod block_index;
pub mod chain_db;
pub mod config;
pub mod store;
pub mod tx_index;

pub use addr::{AddrDb, PeerAddress};
pub use block_file::BlockFiles;
pub use block_index::{BlockIndex, DiskBlockIndex, NodeId};
pub use chain_db::ChainDb;
pub use config::Config;
pub use store::{Env, StoreError, Table};
pub use tx_index::{DiskTxPos, TxIndex};

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A cooperative shutdown flag, polled at loop boundaries and retries.
#[derive(Clone, Debug, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Shutdown {
        Shutdown::default()
    }

    /// Ask every thread to exit at its next poll.
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Periodically checkpoint the store until shutdown is requested, then
/// issue the final checkpoint and release the environment's idle files.
pub fn run_flush_loop(env: &Env, shutdown: &Shutdown, every: std::time::Duration) {
    let poll = std::time::Duration::from_millis(250);
    let mut since_flush = std::time::Duration::from_secs(0);
    while !shutdown.is_requested() {
        std::thread::sleep(poll);
        since_flush += poll;
        if since_flush >= every {
            env.flush(false);
            since_flush = std::time::Duration::from_secs(0);
        }
    }
    env.flush(true);
}
