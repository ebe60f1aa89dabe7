//! Standard lock-script templates, the solver that recognizes them, and
//! input signing for wallet spends.

use wren_chain::transaction::Transaction;
use wren_chain::transparent::{KeyPair, Script};

use crate::opcodes::*;
use crate::sighash::signature_hash;
use crate::Error;

/// Incrementally assemble a script.
#[derive(Debug, Default)]
pub struct Builder {
    bytes: Vec<u8>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder { bytes: Vec::new() }
    }

    pub fn push_opcode(mut self, opcode: u8) -> Builder {
        self.bytes.push(opcode);
        self
    }

    /// Push a byte string with the smallest push opcode that fits it.
    pub fn push_data(mut self, data: &[u8]) -> Builder {
        match data.len() {
            0 => self.bytes.push(OP_0),
            len @ 1..=0x4b => {
                self.bytes.push(len as u8);
                self.bytes.extend_from_slice(data);
            }
            len @ 0x4c..=0xff => {
                self.bytes.push(OP_PUSHDATA1);
                self.bytes.push(len as u8);
                self.bytes.extend_from_slice(data);
            }
            len if len <= 0xffff => {
                self.bytes.push(OP_PUSHDATA2);
                self.bytes
                    .extend_from_slice(&(len as u16).to_le_bytes()[..]);
                self.bytes.extend_from_slice(data);
            }
            len => {
                self.bytes.push(OP_PUSHDATA4);
                self.bytes
                    .extend_from_slice(&(len as u32).to_le_bytes()[..]);
                self.bytes.extend_from_slice(data);
            }
        }
        self
    }

    /// Push a small number using the dedicated opcodes where possible.
    pub fn push_int(self, value: i64) -> Builder {
        match value {
            0 => self.push_opcode(OP_0),
            1..=16 => self.push_opcode(OP_1 + (value - 1) as u8),
            -1 => self.push_opcode(OP_1NEGATE),
            _ => {
                let encoded = crate::interpreter::encode_num(value);
                self.push_data(&encoded)
            }
        }
    }

    pub fn into_script(self) -> Script {
        Script::new(self.bytes)
    }
}

/// Where a standard lock script sends its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// `<pubkey> CHECKSIG`
    PubKey(Vec<u8>),
    /// `DUP HASH160 <hash> EQUALVERIFY CHECKSIG`
    PubKeyHash([u8; 20]),
}

/// The lock script paying a bare public key.
pub fn pay_to_pubkey(pubkey: &[u8]) -> Script {
    Builder::new()
        .push_data(pubkey)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

/// The lock script paying a 160-bit public key hash.
pub fn pay_to_pubkey_hash(pub_key_hash: [u8; 20]) -> Script {
    Builder::new()
        .push_opcode(OP_DUP)
        .push_opcode(OP_HASH160)
        .push_data(&pub_key_hash)
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

/// Recognize a standard lock script and extract its destination.
pub fn solve(lock_script: &Script) -> Option<Destination> {
    let code = lock_script.as_ref();

    // DUP HASH160 <20-byte push> EQUALVERIFY CHECKSIG
    if code.len() == 25
        && code[0] == OP_DUP
        && code[1] == OP_HASH160
        && code[2] == 20
        && code[23] == OP_EQUALVERIFY
        && code[24] == OP_CHECKSIG
    {
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&code[3..23]);
        return Some(Destination::PubKeyHash(hash));
    }

    // <pubkey push> CHECKSIG, with a direct push of a plausible SEC key
    if code.len() >= 2 {
        let push_len = code[0] as usize;
        if (33..=75).contains(&push_len)
            && code.len() == push_len + 2
            && code[push_len + 1] == OP_CHECKSIG
        {
            return Some(Destination::PubKey(code[1..=push_len].to_vec()));
        }
    }

    None
}

/// Build the unlock script satisfying `lock_script` for input
/// `input_index` of `tx`, signing with `key`.
pub fn sign_signature(
    key: &KeyPair,
    lock_script: &Script,
    tx: &Transaction,
    input_index: usize,
    hash_type: u32,
) -> Result<Script, Error> {
    let destination = solve(lock_script).ok_or(Error::UnknownTemplate)?;

    let sighash = signature_hash(lock_script, tx, input_index, hash_type)?;
    let mut sig = key.sign(&sighash).map_err(|_| Error::Signing)?;
    sig.push(hash_type as u8);

    match destination {
        Destination::PubKey(pubkey) => {
            if pubkey != key.serialized_public_key() {
                return Err(Error::KeyMismatch);
            }
            Ok(Builder::new().push_data(&sig).into_script())
        }
        Destination::PubKeyHash(hash) => {
            if hash != key.public_key_hash() {
                return Err(Error::KeyMismatch);
            }
            Ok(Builder::new()
                .push_data(&sig)
                .push_data(&key.serialized_public_key())
                .into_script())
        }
    }
}
