//! The typed surface of the wallet table.
//!
//! | Key | Value |
//! |---|---|
//! | `("name", address)` | label |
//! | `("tx", txid)` | [`WalletTx`] |
//! | `("key", pubkey)` | private key bytes |
//! | `"defaultkey"` | pubkey |
//! | `("setting", name)` | typed value |

use std::collections::HashMap;

use tracing::{debug, warn};
use zeroize::Zeroizing;

use wren_chain::transaction;
use wren_chain::transparent::KeyPair;
use wren_chain::{WrenDeserialize, WrenSerialize};

use wren_state::{Env, StoreError, Table};

use crate::keystore::KeyStore;
use crate::wallet_tx::WalletTx;

const NAME_PREFIX: &str = "name";
const TX_PREFIX: &str = "tx";
const KEY_PREFIX: &str = "key";
const DEFAULT_KEY_KEY: &str = "defaultkey";
const SETTING_PREFIX: &str = "setting";

/// A handle on the wallet table.
#[derive(Debug)]
pub struct WalletDb {
    table: Table,
}

impl WalletDb {
    pub fn open(env: &Env) -> Result<WalletDb, StoreError> {
        Ok(WalletDb {
            table: env.open_table("wallet")?,
        })
    }

    pub fn write_name(&mut self, address: &str, label: &str) -> Result<(), StoreError> {
        self.table.write(
            &(NAME_PREFIX.to_string(), address.to_string()),
            &label.to_string(),
        )
    }

    pub fn erase_name(&mut self, address: &str) -> Result<(), StoreError> {
        self.table
            .erase(&(NAME_PREFIX.to_string(), address.to_string()))
    }

    pub fn write_tx(
        &mut self,
        txid: &transaction::Hash,
        wtx: &WalletTx,
    ) -> Result<(), StoreError> {
        self.table.write(&(TX_PREFIX.to_string(), *txid), wtx)
    }

    pub fn erase_tx(&mut self, txid: &transaction::Hash) -> Result<(), StoreError> {
        self.table.erase(&(TX_PREFIX.to_string(), *txid))
    }

    /// Persist a key pair. Key records are never overwritten.
    pub fn write_key(&mut self, pair: &KeyPair) -> Result<(), StoreError> {
        self.table.write_if_absent(
            &(KEY_PREFIX.to_string(), pair.serialized_public_key()),
            &pair.secret_bytes().to_vec(),
        )?;
        Ok(())
    }

    pub fn write_default_key(&mut self, pubkey: &[u8]) -> Result<(), StoreError> {
        self.table
            .write(&DEFAULT_KEY_KEY.to_string(), &pubkey.to_vec())
    }

    pub fn write_setting<V: WrenSerialize>(
        &mut self,
        name: &str,
        value: &V,
    ) -> Result<(), StoreError> {
        self.table
            .write(&(SETTING_PREFIX.to_string(), name.to_string()), value)
    }

    pub fn read_setting<V: WrenDeserialize>(
        &self,
        name: &str,
    ) -> Result<Option<V>, StoreError> {
        self.table
            .read(&(SETTING_PREFIX.to_string(), name.to_string()))
    }

    /// Scan the whole table, filling the keystore, the address book, and
    /// the owned-transaction map. Returns the persisted default public
    /// key, if one exists.
    ///
    /// Taking advantage of the fact that pair serialization is just the
    /// two items serialized one after the other, the scan reads the type
    /// prefix first and dispatches on it.
    pub fn load_wallet(
        &self,
        keystore: &mut KeyStore,
        address_book: &mut HashMap<String, String>,
        txs: &mut HashMap<transaction::Hash, WalletTx>,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let mut default_key = None;

        for entry in self.table.cursor() {
            let (key, value) = entry?;
            let mut key_reader = &key[..];
            let record_type = String::wren_deserialize(&mut key_reader)?;

            match record_type.as_str() {
                NAME_PREFIX => {
                    let address = String::wren_deserialize(&mut key_reader)?;
                    let label = String::wren_deserialize(&value[..])?;
                    address_book.insert(address, label);
                }
                TX_PREFIX => {
                    let txid = transaction::Hash::wren_deserialize(&mut key_reader)?;
                    let wtx = WalletTx::wren_deserialize(&value[..])?;
                    if wtx.txid() != txid {
                        warn!(%txid, "wallet record hash mismatch; dropping record");
                        continue;
                    }
                    txs.insert(txid, wtx);
                }
                KEY_PREFIX => {
                    let _pubkey = Vec::<u8>::wren_deserialize(&mut key_reader)?;
                    let secret = Zeroizing::new(Vec::<u8>::wren_deserialize(&value[..])?);
                    match KeyPair::from_secret_bytes(&secret) {
                        Ok(pair) => {
                            keystore.add_key(&pair);
                        }
                        Err(_) => warn!("undecodable key record in wallet"),
                    }
                }
                DEFAULT_KEY_KEY => {
                    default_key = Some(Vec::<u8>::wren_deserialize(&value[..])?);
                }
                SETTING_PREFIX => {
                    // Settings are read on demand by their typed accessors.
                }
                other => {
                    warn!(record_type = other, "unknown wallet record type");
                }
            }
        }

        debug!(
            keys = keystore.len(),
            names = address_book.len(),
            txs = txs.len(),
            "loaded wallet"
        );
        Ok(default_key)
    }
}
