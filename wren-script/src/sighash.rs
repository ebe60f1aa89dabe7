//! The transaction digest that signatures commit to.
//!
//! A signature over input `n` commits to a modified serialization of the
//! spending transaction: every input's script is blanked except input `n`,
//! which carries the script whose conditions are being satisfied (the
//! prevout's lock script), followed by the four-byte hash type. The digest
//! is the SHA256d of that serialization.

use wren_chain::compactint::CompactInt;
use wren_chain::serialization::sha256d;
use wren_chain::transaction::Transaction;
use wren_chain::transparent::{Input, OutPoint, Script};
use wren_chain::WrenSerialize;

use crate::Error;

/// Sign all inputs and all outputs.
pub const SIGHASH_ALL: u32 = 1;
/// Sign all inputs, no outputs: anyone may route the value.
pub const SIGHASH_NONE: u32 = 2;
/// Sign all inputs and only the output paired with this input.
pub const SIGHASH_SINGLE: u32 = 3;
/// Commit only to this input, allowing others to be added.
pub const SIGHASH_ANYONECANPAY: u32 = 0x80;

fn input_outpoint(input: &Input) -> OutPoint {
    match input {
        Input::PrevOut { outpoint, .. } => *outpoint,
        Input::Coinbase { .. } => OutPoint::null(),
    }
}

fn write_input(
    writer: &mut sha256d::Writer,
    input: &Input,
    script: &Script,
    keep_sequence: bool,
) {
    input_outpoint(input)
        .wren_serialize(&mut *writer)
        .expect("Sha256dWriter is infallible");
    script
        .wren_serialize(&mut *writer)
        .expect("Sha256dWriter is infallible");
    let sequence = if keep_sequence { input.sequence() } else { 0 };
    sequence
        .wren_serialize(&mut *writer)
        .expect("Sha256dWriter is infallible");
}

/// Compute the digest that a signature with `hash_type` over input
/// `input_index` of `tx` must commit to, where `script_code` is the
/// script being satisfied.
pub fn signature_hash(
    script_code: &Script,
    tx: &Transaction,
    input_index: usize,
    hash_type: u32,
) -> Result<[u8; 32], Error> {
    if input_index >= tx.inputs.len() {
        return Err(Error::InputIndex);
    }

    let mode = hash_type & 0x1f;
    let anyone_can_pay = hash_type & SIGHASH_ANYONECANPAY != 0;

    if mode == SIGHASH_SINGLE && input_index >= tx.outputs.len() {
        return Err(Error::OutputIndex);
    }

    let empty = Script::new(Vec::new());
    let mut writer = sha256d::Writer::default();

    tx.version
        .wren_serialize(&mut writer)
        .expect("Sha256dWriter is infallible");

    // Inputs: all of them with scripts blanked, or just ours.
    if anyone_can_pay {
        CompactInt::from(1)
            .wren_serialize(&mut writer)
            .expect("Sha256dWriter is infallible");
        write_input(&mut writer, &tx.inputs[input_index], script_code, true);
    } else {
        CompactInt::from(tx.inputs.len())
            .wren_serialize(&mut writer)
            .expect("Sha256dWriter is infallible");
        for (i, input) in tx.inputs.iter().enumerate() {
            let ours = i == input_index;
            let script = if ours { script_code } else { &empty };
            let keep_sequence = ours || (mode != SIGHASH_NONE && mode != SIGHASH_SINGLE);
            write_input(&mut writer, input, script, keep_sequence);
        }
    }

    // Outputs: all, none, or only the one paired with this input.
    match mode {
        SIGHASH_NONE => {
            CompactInt::from(0)
                .wren_serialize(&mut writer)
                .expect("Sha256dWriter is infallible");
        }
        SIGHASH_SINGLE => {
            CompactInt::from(input_index + 1)
                .wren_serialize(&mut writer)
                .expect("Sha256dWriter is infallible");
            for _ in 0..input_index {
                // Outputs before ours are replaced by the null output.
                (-1i64)
                    .wren_serialize(&mut writer)
                    .expect("Sha256dWriter is infallible");
                empty
                    .wren_serialize(&mut writer)
                    .expect("Sha256dWriter is infallible");
            }
            tx.outputs[input_index]
                .wren_serialize(&mut writer)
                .expect("Sha256dWriter is infallible");
        }
        _ => {
            tx.outputs
                .wren_serialize(&mut writer)
                .expect("Sha256dWriter is infallible");
        }
    }

    tx.lock_time
        .wren_serialize(&mut writer)
        .expect("Sha256dWriter is infallible");
    hash_type
        .wren_serialize(&mut writer)
        .expect("Sha256dWriter is infallible");

    Ok(writer.finish())
}

#[cfg(test)]
mod tests {
    use std::convert::TryFrom;

    use wren_chain::amount::{Amount, COIN};
    use wren_chain::transaction::{Hash, LockTime};
    use wren_chain::transparent::Output;

    use super::*;

    fn spending_tx() -> Transaction {
        Transaction::new(
            1,
            vec![
                Input::PrevOut {
                    outpoint: OutPoint {
                        hash: Hash([9; 32]),
                        index: 0,
                    },
                    unlock_script: Script::new(vec![]),
                    sequence: std::u32::MAX,
                },
                Input::PrevOut {
                    outpoint: OutPoint {
                        hash: Hash([9; 32]),
                        index: 1,
                    },
                    unlock_script: Script::new(vec![]),
                    sequence: std::u32::MAX,
                },
            ],
            vec![
                Output {
                    value: Amount::try_from(COIN).unwrap(),
                    lock_script: Script::new(vec![0x51]),
                },
                Output {
                    value: Amount::try_from(2 * COIN).unwrap(),
                    lock_script: Script::new(vec![0x51]),
                },
            ],
            LockTime::unlocked(),
        )
    }

    #[test]
    fn digest_depends_on_input_index_and_hash_type() {
        let tx = spending_tx();
        let code = Script::new(vec![0x51]);

        let all_0 = signature_hash(&code, &tx, 0, SIGHASH_ALL).unwrap();
        let all_1 = signature_hash(&code, &tx, 1, SIGHASH_ALL).unwrap();
        let none_0 = signature_hash(&code, &tx, 0, SIGHASH_NONE).unwrap();
        let single_0 = signature_hash(&code, &tx, 0, SIGHASH_SINGLE).unwrap();
        let acp_0 = signature_hash(&code, &tx, 0, SIGHASH_ALL | SIGHASH_ANYONECANPAY).unwrap();

        assert_ne!(all_0, all_1);
        assert_ne!(all_0, none_0);
        assert_ne!(all_0, single_0);
        assert_ne!(all_0, acp_0);
    }

    #[test]
    fn digest_depends_on_script_code() {
        let tx = spending_tx();
        let a = signature_hash(&Script::new(vec![0x51]), &tx, 0, SIGHASH_ALL).unwrap();
        let b = signature_hash(&Script::new(vec![0x52]), &tx, 0, SIGHASH_ALL).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn out_of_range_indexes_fail() {
        let tx = spending_tx();
        let code = Script::new(vec![0x51]);
        assert_eq!(
            signature_hash(&code, &tx, 2, SIGHASH_ALL),
            Err(Error::InputIndex)
        );
    }
}
