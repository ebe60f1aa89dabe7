//! secp256k1 key pairs, signing, and key-hash identifiers.

use lazy_static::lazy_static;
use rand::RngCore;
use ripemd160::{Digest as Ripemd160Digest, Ripemd160};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, Signature};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

lazy_static! {
    static ref SECP256K1: Secp256k1<secp256k1::All> = Secp256k1::new();
}

/// RIPEMD-160 of SHA-256: the 160-bit identifier of a public key or
/// script payload.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha_hash = Sha256::digest(data);
    let ripe_hash = Ripemd160::digest(&sha_hash);
    let mut payload = [0u8; 20];
    payload[..].copy_from_slice(&ripe_hash[..]);
    payload
}

/// The 160-bit identifier of a serialized public key.
pub fn pubkey_hash(pubkey: &[u8]) -> [u8; 20] {
    hash160(pubkey)
}

/// Errors from key handling and signing.
#[derive(thiserror::Error, displaydoc::Display, Debug)]
pub enum KeyError {
    /// invalid secret key bytes
    InvalidSecretKey,
    /// invalid public key encoding
    InvalidPublicKey,
    /// signing failed
    Signing,
}

/// A secp256k1 private key and its derived public key.
///
/// Public keys are exchanged in the 65-byte uncompressed SEC encoding.
/// The secret bytes are zeroed when the pair is dropped.
pub struct KeyPair {
    secret: Zeroizing<Vec<u8>>,
    public: PublicKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &hex::encode(&self.serialized_public_key()))
            .finish()
    }
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        KeyPair {
            secret: self.secret.clone(),
            public: self.public,
        }
    }
}

impl KeyPair {
    /// Generate a fresh random key pair from OS entropy.
    pub fn generate() -> KeyPair {
        let mut bytes = Zeroizing::new(vec![0u8; 32]);
        loop {
            rand::rngs::OsRng.fill_bytes(&mut bytes);
            if let Ok(pair) = KeyPair::from_secret_bytes(&bytes) {
                return pair;
            }
        }
    }

    /// Rebuild a key pair from stored secret bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<KeyPair, KeyError> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|_| KeyError::InvalidSecretKey)?;
        let public = PublicKey::from_secret_key(&SECP256K1, &secret_key);
        Ok(KeyPair {
            secret: Zeroizing::new(bytes.to_vec()),
            public,
        })
    }

    /// The raw secret bytes, for persistence. Callers must keep their copy
    /// in zeroizing storage too.
    pub fn secret_bytes(&self) -> &[u8] {
        &self.secret
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// The 65-byte uncompressed SEC encoding of the public key.
    pub fn serialized_public_key(&self) -> Vec<u8> {
        self.public.serialize_uncompressed().to_vec()
    }

    /// The 160-bit identifier of the public key.
    pub fn public_key_hash(&self) -> [u8; 20] {
        hash160(&self.serialized_public_key())
    }

    /// Produce a DER-encoded ECDSA signature over a 32-byte message hash.
    pub fn sign(&self, sighash: &[u8; 32]) -> Result<Vec<u8>, KeyError> {
        let secret_key =
            SecretKey::from_slice(&self.secret).map_err(|_| KeyError::InvalidSecretKey)?;
        let message = Message::from_slice(sighash).map_err(|_| KeyError::Signing)?;
        let signature = SECP256K1.sign(&message, &secret_key);
        Ok(signature.serialize_der().to_vec())
    }
}

/// Verify a DER-encoded ECDSA signature over a 32-byte message hash
/// against a SEC-encoded public key.
pub fn verify_signature(pubkey: &[u8], sighash: &[u8; 32], der_sig: &[u8]) -> bool {
    let public = match PublicKey::from_slice(pubkey) {
        Ok(key) => key,
        Err(_) => return false,
    };
    let signature = match Signature::from_der(der_sig) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    let message = match Message::from_slice(sighash) {
        Ok(message) => message,
        Err(_) => return false,
    };
    SECP256K1.verify(&message, &signature, &public).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        wren_test::init();

        let pair = KeyPair::generate();
        let sighash = crate::serialization::sha256d::digest(b"message");
        let sig = pair.sign(&sighash).expect("signing succeeds");
        assert!(verify_signature(
            &pair.serialized_public_key(),
            &sighash,
            &sig
        ));

        // A flipped bit in the signature must fail verification.
        let mut bad_sig = sig.clone();
        let last = bad_sig.len() - 1;
        bad_sig[last] ^= 0x01;
        assert!(!verify_signature(
            &pair.serialized_public_key(),
            &sighash,
            &bad_sig
        ));

        // So must a different message.
        let other = crate::serialization::sha256d::digest(b"other message");
        assert!(!verify_signature(
            &pair.serialized_public_key(),
            &other,
            &sig
        ));
    }

    #[test]
    fn secret_roundtrip() {
        let pair = KeyPair::generate();
        let restored = KeyPair::from_secret_bytes(pair.secret_bytes()).unwrap();
        assert_eq!(
            pair.serialized_public_key(),
            restored.serialized_public_key()
        );
    }

    #[test]
    fn uncompressed_public_keys() {
        let pair = KeyPair::generate();
        let serialized = pair.serialized_public_key();
        assert_eq!(serialized.len(), 65);
        assert_eq!(serialized[0], 0x04);
    }
}
