//! Consensus validation and the chain state machine.
//!
//! This crate decides which blocks and transactions are valid, maintains
//! the canonical best chain (including reorganizations), and runs the
//! memory pool of validated, unconfirmed transactions.
//!
//! # Relationship to the peer layer
//!
//! The wire protocol lives elsewhere. Its contract with this crate is:
//!
//! - an incoming `block` message calls [`Chain::process_block`];
//! - an incoming `tx` message calls [`Chain::accept_to_mempool`];
//! - [`ChainListener::request_block`] asks the peer layer to fetch a
//!   missing parent;
//! - [`Chain::block_locator`] summarizes our chain position for
//!   `getblocks`-style requests.
//!
//! # Locking
//!
//! [`Chain`] is the single owner of the block index, the mempool, and the
//! orphan set. Callers wrap it in a `Mutex` and acquire that lock before
//! the wallet, keystore, and store-environment locks, in that order.
//! Everything observable (tip, UTXO view, mempool) changes atomically
//! under that one lock, and the durable write scope for a chain change
//! commits before the in-memory tip advances.

pub mod block;
pub mod chain;
pub mod difficulty;
pub mod error;
pub mod mempool;
pub mod parameters;
pub mod subsidy;
pub mod timedata;
pub mod transaction;

pub use chain::{BlockOutcome, Chain, ChainListener};
pub use error::{BlockError, SubsidyError, TransactionError};
pub use mempool::Mempool;
pub use timedata::NetworkTime;
