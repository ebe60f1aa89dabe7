//! The durable key/value store: typed tables over a transactional B-tree
//! engine with environment-wide recovery.
//!
//! Each logical table (the old `*.dat` files) is one tree in a shared
//! environment. Records are `(key bytes, value bytes)` pairs produced by
//! the canonical serialization; composite keys are a type prefix string
//! followed by the remaining key fields, concatenated in order.
//!
//! Writes happen inside a stack of transactional scopes: `txn_begin`
//! opens a nested scope, `txn_commit` merges it into its parent (or, at
//! the bottom of the stack, applies it to the tree atomically), and
//! `txn_abort` discards it. Operations outside any scope auto-commit.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use displaydoc::Display;
use thiserror::Error;
use tracing::{info, warn};

use wren_chain::parameters::Network;
use wren_chain::serialization::{SerializationError, WrenDeserialize, WrenSerialize};

use crate::Config;

/// Errors from the durable store.
#[derive(Error, Display, Debug)]
pub enum StoreError {
    /// storage engine failure: {0}
    Engine(#[from] sled::Error),
    /// serialization failure: {0}
    Serialization(#[from] SerializationError),
    /// io failure: {0}
    Io(#[from] std::io::Error),
    /// commit or abort without an open scope
    NoScope,
    /// malformed block file record: {0}
    BadBlockRecord(&'static str),
}

/// Buffered operations of one open scope. `None` marks an erase.
type Scope = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// The process-wide store environment.
///
/// Coordinates recovery, checkpointing, and the `path → open-count`
/// registry that guards against releasing files still in use. The
/// registry mutex is the innermost lock in the documented order.
pub struct Env {
    db: sled::Db,
    file_use: Arc<Mutex<HashMap<String, usize>>>,
}

impl std::fmt::Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Env").finish()
    }
}

impl Env {
    /// Open (and recover, if needed) the environment for `network`.
    pub fn open(config: &Config, network: Network) -> Result<Env, StoreError> {
        let db = config.sled_config(network).open()?;
        Ok(Env {
            db,
            file_use: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Open a typed table in this environment, registering its use.
    pub fn open_table(&self, name: &str) -> Result<Table, StoreError> {
        let tree = self.db.open_tree(name.as_bytes())?;
        {
            let mut file_use = self.file_use.lock().expect("file-use registry lock");
            *file_use.entry(name.to_string()).or_insert(0) += 1;
        }
        Ok(Table {
            tree,
            name: name.to_string(),
            file_use: Arc::clone(&self.file_use),
            scopes: Vec::new(),
        })
    }

    /// Force a checkpoint. With `shutdown` set, also release the record
    /// of any table no longer in use; the caller stops using the
    /// environment afterwards.
    pub fn flush(&self, shutdown: bool) {
        info!(shutdown, "flushing store environment");
        if let Err(error) = self.db.flush() {
            warn!(%error, "store checkpoint failed; retrying at next flush");
            return;
        }
        let mut file_use = self.file_use.lock().expect("file-use registry lock");
        file_use.retain(|_, count| *count > 0);
        if shutdown && !file_use.is_empty() {
            warn!(open_tables = file_use.len(), "environment shut down with tables in use");
        }
    }
}

/// One typed table of the store.
///
/// Not `Sync`: a table handle belongs to the single owner of the state it
/// backs, and all access is serialized by that owner's lock.
pub struct Table {
    tree: sled::Tree,
    name: String,
    file_use: Arc<Mutex<HashMap<String, usize>>>,
    scopes: Vec<Scope>,
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("open_scopes", &self.scopes.len())
            .finish()
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        if !self.scopes.is_empty() {
            warn!(table = %self.name, "table dropped with open scopes; discarding them");
        }
        if let Ok(mut file_use) = self.file_use.lock() {
            if let Some(count) = file_use.get_mut(&self.name) {
                *count = count.saturating_sub(1);
            }
        }
    }
}

fn encode<K: WrenSerialize>(key: &K) -> Result<Vec<u8>, StoreError> {
    Ok(key.wren_serialize_to_vec()?)
}

impl Table {
    /// Read a record. Absence is a normal return, not an error.
    pub fn read<K, V>(&self, key: &K) -> Result<Option<V>, StoreError>
    where
        K: WrenSerialize,
        V: WrenDeserialize,
    {
        let key_bytes = encode(key)?;
        for scope in self.scopes.iter().rev() {
            if let Some(entry) = scope.get(&key_bytes) {
                return match entry {
                    Some(bytes) => Ok(Some(V::wren_deserialize(&bytes[..])?)),
                    None => Ok(None),
                };
            }
        }
        match self.tree.get(&key_bytes)? {
            Some(bytes) => Ok(Some(V::wren_deserialize(&bytes[..])?)),
            None => Ok(None),
        }
    }

    /// Write a record, replacing any existing value.
    pub fn write<K, V>(&mut self, key: &K, value: &V) -> Result<(), StoreError>
    where
        K: WrenSerialize,
        V: WrenSerialize,
    {
        let key_bytes = encode(key)?;
        let value_bytes = value.wren_serialize_to_vec()?;
        match self.scopes.last_mut() {
            Some(scope) => {
                scope.insert(key_bytes, Some(value_bytes));
            }
            None => {
                self.tree.insert(key_bytes, value_bytes)?;
            }
        }
        Ok(())
    }

    /// Write a record only if the key is absent. Returns whether the
    /// write happened.
    pub fn write_if_absent<K, V>(&mut self, key: &K, value: &V) -> Result<bool, StoreError>
    where
        K: WrenSerialize,
        V: WrenSerialize,
    {
        if self.exists(key)? {
            return Ok(false);
        }
        self.write(key, value)?;
        Ok(true)
    }

    /// Remove a record. Erasing an absent key is not an error.
    pub fn erase<K: WrenSerialize>(&mut self, key: &K) -> Result<(), StoreError> {
        let key_bytes = encode(key)?;
        match self.scopes.last_mut() {
            Some(scope) => {
                scope.insert(key_bytes, None);
            }
            None => {
                self.tree.remove(key_bytes)?;
            }
        }
        Ok(())
    }

    pub fn exists<K: WrenSerialize>(&self, key: &K) -> Result<bool, StoreError> {
        let key_bytes = encode(key)?;
        for scope in self.scopes.iter().rev() {
            if let Some(entry) = scope.get(&key_bytes) {
                return Ok(entry.is_some());
            }
        }
        Ok(self.tree.contains_key(&key_bytes)?)
    }

    /// A forward cursor over the whole table, in key order.
    ///
    /// Cursors read committed state only; they do not observe open
    /// scopes.
    pub fn cursor(&self) -> Cursor {
        Cursor {
            inner: self.tree.iter(),
        }
    }

    /// A forward cursor positioned at the first key ≥ `start`.
    pub fn cursor_from<K: WrenSerialize>(&self, start: &K) -> Result<Cursor, StoreError> {
        let start_bytes = encode(start)?;
        Ok(Cursor {
            inner: self.tree.range(start_bytes..),
        })
    }

    /// Open a nested transactional scope.
    pub fn txn_begin(&mut self) {
        self.scopes.push(Scope::new());
    }

    /// Merge the innermost scope into its parent, or apply it to the
    /// table atomically if it is the outermost.
    pub fn txn_commit(&mut self) -> Result<(), StoreError> {
        let scope = self.scopes.pop().ok_or(StoreError::NoScope)?;
        match self.scopes.last_mut() {
            Some(parent) => {
                for (key, value) in scope {
                    parent.insert(key, value);
                }
            }
            None => {
                let mut batch = sled::Batch::default();
                for (key, value) in scope {
                    match value {
                        Some(value) => batch.insert(key, value),
                        None => batch.remove(key),
                    }
                }
                self.tree.apply_batch(batch)?;
            }
        }
        Ok(())
    }

    /// Discard the innermost scope.
    pub fn txn_abort(&mut self) -> Result<(), StoreError> {
        self.scopes.pop().ok_or(StoreError::NoScope)?;
        Ok(())
    }

    pub fn in_scope(&self) -> bool {
        !self.scopes.is_empty()
    }
}

/// A forward cursor over a table's committed records.
pub struct Cursor {
    inner: sled::Iter,
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor").finish()
    }
}

impl Iterator for Cursor {
    type Item = Result<(Vec<u8>, Vec<u8>), StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.next() {
            Some(Ok((key, value))) => Some(Ok((key.to_vec(), value.to_vec()))),
            Some(Err(error)) => Some(Err(error.into())),
            None => None,
        }
    }
}
