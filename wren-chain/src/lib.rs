//! Core Wren data structures and their canonical serialization.
//!
//! This crate provides definitions of the blocks, transactions, amounts,
//! scripts-as-bytes, keys, and difficulty encodings shared by the rest of
//! the node, along with the consensus-critical byte-level codec every
//! persisted or wire-observable value uses.
#![deny(missing_debug_implementations)]

pub mod amount;
pub mod block;
pub mod cached;
pub mod compactint;
pub mod fmt;
pub mod parameters;
pub mod serialization;
pub mod transaction;
pub mod transparent;
pub mod work;

pub use serialization::{
    SerializationError, WrenDeserialize, WrenDeserializeInto, WrenSerialize,
};
