//! The in-memory key store: public key → private key, with a reverse
//! map keyed by the 160-bit key hash (the address payload).

use std::collections::HashMap;

use tracing::trace;
use zeroize::Zeroizing;

use wren_chain::transparent::{pubkey_hash, KeyError, KeyPair};

/// Secret key material for every address the wallet controls. One key is
/// the default, used for change and fresh receipts.
#[derive(Default)]
pub struct KeyStore {
    /// serialized public key → secret bytes
    keys: HashMap<Vec<u8>, Zeroizing<Vec<u8>>>,
    /// hash160(public key) → serialized public key
    by_hash: HashMap<[u8; 20], Vec<u8>>,
    default_key: Option<Vec<u8>>,
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("keys", &self.keys.len())
            .finish()
    }
}

impl KeyStore {
    pub fn new() -> KeyStore {
        KeyStore::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Track a key pair, returning its serialized public key.
    pub fn add_key(&mut self, pair: &KeyPair) -> Vec<u8> {
        let pubkey = pair.serialized_public_key();
        self.by_hash.insert(pubkey_hash(&pubkey), pubkey.clone());
        self.keys.insert(
            pubkey.clone(),
            Zeroizing::new(pair.secret_bytes().to_vec()),
        );
        trace!(keys = self.keys.len(), "added key");
        pubkey
    }

    pub fn contains_pubkey(&self, pubkey: &[u8]) -> bool {
        self.keys.contains_key(pubkey)
    }

    pub fn contains_hash(&self, hash: &[u8; 20]) -> bool {
        self.by_hash.contains_key(hash)
    }

    /// Rebuild the key pair for a serialized public key we control.
    pub fn key_for_pubkey(&self, pubkey: &[u8]) -> Result<Option<KeyPair>, KeyError> {
        match self.keys.get(pubkey) {
            Some(secret) => Ok(Some(KeyPair::from_secret_bytes(secret)?)),
            None => Ok(None),
        }
    }

    /// Rebuild the key pair behind an address payload we control.
    pub fn key_for_hash(&self, hash: &[u8; 20]) -> Result<Option<KeyPair>, KeyError> {
        match self.by_hash.get(hash) {
            Some(pubkey) => self.key_for_pubkey(pubkey),
            None => Ok(None),
        }
    }

    pub fn set_default_key(&mut self, pubkey: Vec<u8>) {
        self.default_key = Some(pubkey);
    }

    pub fn default_key(&self) -> Option<&[u8]> {
        self.default_key.as_deref()
    }

    /// The secret bytes for a public key, for persistence.
    pub(crate) fn secret_for(&self, pubkey: &[u8]) -> Option<&[u8]> {
        self.keys.get(pubkey).map(|secret| &secret[..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_by_pubkey_and_hash() {
        let mut store = KeyStore::new();
        let pair = KeyPair::generate();
        let pubkey = store.add_key(&pair);

        assert!(store.contains_pubkey(&pubkey));
        assert!(store.contains_hash(&pair.public_key_hash()));

        let rebuilt = store.key_for_hash(&pair.public_key_hash()).unwrap().unwrap();
        assert_eq!(rebuilt.serialized_public_key(), pubkey);

        assert!(!store.contains_hash(&[0u8; 20]));
        assert!(store.key_for_pubkey(&[4u8; 65]).unwrap().is_none());
    }
}
