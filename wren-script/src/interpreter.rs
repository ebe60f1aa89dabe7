//! The stack-machine evaluator.

use wren_chain::transaction::Transaction;
use wren_chain::transparent::{hash160, verify_signature, Script};

use crate::opcodes::*;
use crate::sighash::signature_hash;
use crate::Error;

/// Decode a numeric stack element: little-endian bytes with the sign bit
/// in the top byte, at most four bytes long.
pub(crate) fn decode_num(bytes: &[u8]) -> Result<i64, Error> {
    if bytes.len() > 4 {
        return Err(Error::NumberOverflow);
    }
    if bytes.is_empty() {
        return Ok(0);
    }
    let mut result: i64 = 0;
    for (i, byte) in bytes.iter().enumerate() {
        result |= i64::from(*byte) << (8 * i);
    }
    // The most significant bit of the last byte is the sign.
    if bytes[bytes.len() - 1] & 0x80 != 0 {
        let magnitude = result & !(0x80i64 << (8 * (bytes.len() - 1)));
        Ok(-magnitude)
    } else {
        Ok(result)
    }
}

/// Encode a number as a minimal little-endian stack element.
pub(crate) fn encode_num(value: i64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }
    let negative = value < 0;
    let mut absolute = value.unsigned_abs();
    let mut result = Vec::new();
    while absolute > 0 {
        result.push((absolute & 0xff) as u8);
        absolute >>= 8;
    }
    // If the top bit is already used, add a byte to carry the sign.
    if result.last().map(|last| last & 0x80 != 0) == Some(true) {
        result.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        let last = result.len() - 1;
        result[last] |= 0x80;
    }
    result
}

/// Interpret a stack element as a boolean: any non-zero byte makes it
/// true, except a lone sign bit in the last position (negative zero).
pub(crate) fn cast_to_bool(bytes: &[u8]) -> bool {
    for (i, byte) in bytes.iter().enumerate() {
        if *byte != 0 {
            if i == bytes.len() - 1 && *byte == 0x80 {
                return false;
            }
            return true;
        }
    }
    false
}

fn encode_bool(value: bool) -> Vec<u8> {
    if value {
        vec![1]
    } else {
        Vec::new()
    }
}

fn pop(stack: &mut Vec<Vec<u8>>) -> Result<Vec<u8>, Error> {
    stack.pop().ok_or(Error::StackUnderflow)
}

/// Check one DER signature (with its trailing hash-type byte) against a
/// SEC public key for input `input_index` of `tx`, where `script_code` is
/// the script whose conditions are being satisfied.
fn check_sig(
    sig: &[u8],
    pubkey: &[u8],
    script_code: &Script,
    tx: &Transaction,
    input_index: usize,
) -> bool {
    let (der, hash_type) = match sig.split_last() {
        Some((hash_type, der)) if !der.is_empty() => (der, u32::from(*hash_type)),
        _ => return false,
    };
    let sighash = match signature_hash(script_code, tx, input_index, hash_type) {
        Ok(sighash) => sighash,
        Err(_) => return false,
    };
    verify_signature(pubkey, &sighash, der)
}

/// Evaluate `script` over `stack` in the context of spending input
/// `input_index` of `tx`.
///
/// Fails on malformed opcode streams, stack underflow, exceeded size
/// limits, unbalanced conditionals, and false verify results. A failed
/// signature check is not itself an error; it pushes false, and the
/// caller's final truthiness check rejects the spend.
pub fn eval_script(
    stack: &mut Vec<Vec<u8>>,
    script: &Script,
    tx: &Transaction,
    input_index: usize,
) -> Result<(), Error> {
    let code = script.as_ref();
    if code.len() > MAX_SCRIPT_SIZE {
        return Err(Error::ScriptSize);
    }

    let mut pc = 0usize;
    let mut op_count = 0usize;
    // One entry per enclosing conditional; false entries disable execution.
    let mut exec_stack: Vec<bool> = Vec::new();

    while pc < code.len() {
        let executing = exec_stack.iter().all(|flag| *flag);
        let opcode = code[pc];
        pc += 1;

        // Push opcodes carry their data inline; parsing always advances
        // even inside a false branch.
        if opcode <= OP_PUSHDATA4 {
            let len = match opcode {
                OP_0 => 0,
                len @ 0x01..=0x4b => len as usize,
                OP_PUSHDATA1 => {
                    let len = *code.get(pc).ok_or(Error::BadPush)? as usize;
                    pc += 1;
                    len
                }
                OP_PUSHDATA2 => {
                    let bytes = code.get(pc..pc + 2).ok_or(Error::BadPush)?;
                    pc += 2;
                    u16::from_le_bytes([bytes[0], bytes[1]]) as usize
                }
                OP_PUSHDATA4 => {
                    let bytes = code.get(pc..pc + 4).ok_or(Error::BadPush)?;
                    pc += 4;
                    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize
                }
                _ => unreachable!("all push opcodes are covered"),
            };
            if len > MAX_ELEMENT_SIZE {
                return Err(Error::PushSize);
            }
            let data = code.get(pc..pc + len).ok_or(Error::BadPush)?;
            pc += len;
            if executing {
                stack.push(data.to_vec());
            }
        } else {
            if opcode > OP_16 {
                op_count += 1;
                if op_count > MAX_OPS_PER_SCRIPT {
                    return Err(Error::OpCount);
                }
            }

            match opcode {
                OP_1NEGATE if executing => stack.push(encode_num(-1)),
                op @ OP_1..=OP_16 if executing => {
                    stack.push(encode_num(i64::from(op - OP_1) + 1))
                }
                OP_1NEGATE | OP_1..=OP_16 => {}

                OP_IF | OP_NOTIF => {
                    let mut condition = false;
                    if executing {
                        let top = pop(stack)?;
                        condition = cast_to_bool(&top);
                        if opcode == OP_NOTIF {
                            condition = !condition;
                        }
                    }
                    exec_stack.push(condition);
                }
                OP_ELSE => {
                    let last = exec_stack.last_mut().ok_or(Error::UnbalancedConditional)?;
                    *last = !*last;
                }
                OP_ENDIF => {
                    exec_stack.pop().ok_or(Error::UnbalancedConditional)?;
                }

                _ if !executing => {}

                OP_VERIFY => {
                    let top = pop(stack)?;
                    if !cast_to_bool(&top) {
                        return Err(Error::VerifyFailed);
                    }
                }

                OP_DUP => {
                    let top = stack.last().ok_or(Error::StackUnderflow)?.clone();
                    stack.push(top);
                }

                OP_EQUAL | OP_EQUALVERIFY => {
                    let rhs = pop(stack)?;
                    let lhs = pop(stack)?;
                    let equal = lhs == rhs;
                    stack.push(encode_bool(equal));
                    if opcode == OP_EQUALVERIFY {
                        let top = pop(stack)?;
                        if !cast_to_bool(&top) {
                            return Err(Error::VerifyFailed);
                        }
                    }
                }

                OP_HASH160 => {
                    let top = pop(stack)?;
                    stack.push(hash160(&top).to_vec());
                }

                OP_CHECKSIG | OP_CHECKSIGVERIFY => {
                    let pubkey = pop(stack)?;
                    let sig = pop(stack)?;
                    let ok = check_sig(&sig, &pubkey, script, tx, input_index);
                    stack.push(encode_bool(ok));
                    if opcode == OP_CHECKSIGVERIFY {
                        let top = pop(stack)?;
                        if !cast_to_bool(&top) {
                            return Err(Error::VerifyFailed);
                        }
                    }
                }

                OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                    let key_count = decode_num(&pop(stack)?)?;
                    if key_count < 0 || key_count > MAX_PUBKEYS_PER_MULTISIG {
                        return Err(Error::PubkeyCount);
                    }
                    op_count += key_count as usize;
                    if op_count > MAX_OPS_PER_SCRIPT {
                        return Err(Error::OpCount);
                    }
                    let mut pubkeys = Vec::with_capacity(key_count as usize);
                    for _ in 0..key_count {
                        pubkeys.push(pop(stack)?);
                    }

                    let sig_count = decode_num(&pop(stack)?)?;
                    if sig_count < 0 || sig_count > key_count {
                        return Err(Error::SigCount);
                    }
                    let mut sigs = Vec::with_capacity(sig_count as usize);
                    for _ in 0..sig_count {
                        sigs.push(pop(stack)?);
                    }

                    // The protocol pops one extra unused element here. The
                    // off-by-one is consensus now, so it stays.
                    pop(stack)?;

                    // Each signature must match a key, in order; keys that
                    // fail are skipped and never revisited.
                    let mut ok = true;
                    let mut key_iter = pubkeys.iter();
                    'sigs: for sig in sigs.iter() {
                        loop {
                            match key_iter.next() {
                                Some(pubkey) => {
                                    if check_sig(sig, pubkey, script, tx, input_index) {
                                        continue 'sigs;
                                    }
                                }
                                None => {
                                    ok = false;
                                    break 'sigs;
                                }
                            }
                        }
                    }

                    stack.push(encode_bool(ok));
                    if opcode == OP_CHECKMULTISIGVERIFY {
                        let top = pop(stack)?;
                        if !cast_to_bool(&top) {
                            return Err(Error::VerifyFailed);
                        }
                    }
                }

                _ => return Err(Error::BadOpcode),
            }
        }

        if stack.len() > MAX_STACK_SIZE {
            return Err(Error::StackSize);
        }
    }

    if !exec_stack.is_empty() {
        return Err(Error::UnbalancedConditional);
    }

    Ok(())
}

/// Decide whether `unlock_script` satisfies `lock_script` for input
/// `input_index` of `tx`.
///
/// The two scripts are evaluated in sequence over one shared stack; the
/// spend is valid iff the stack ends non-empty with a truthy top.
pub fn verify_script(
    unlock_script: &Script,
    lock_script: &Script,
    tx: &Transaction,
    input_index: usize,
) -> Result<(), Error> {
    let mut stack: Vec<Vec<u8>> = Vec::new();
    eval_script(&mut stack, unlock_script, tx, input_index)?;
    eval_script(&mut stack, lock_script, tx, input_index)?;
    match stack.last() {
        Some(top) if cast_to_bool(top) => Ok(()),
        _ => Err(Error::EvalFalse),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_encoding_roundtrips() {
        for &value in &[0i64, 1, -1, 16, 127, 128, -128, 255, 256, 0x7fffff, -0x7fffff] {
            assert_eq!(decode_num(&encode_num(value)).unwrap(), value, "{}", value);
        }
    }

    #[test]
    fn negative_zero_is_false() {
        assert!(!cast_to_bool(&[]));
        assert!(!cast_to_bool(&[0x00]));
        assert!(!cast_to_bool(&[0x00, 0x80]));
        assert!(cast_to_bool(&[0x80, 0x00]));
        assert!(cast_to_bool(&[0x01]));
    }

    #[test]
    fn oversized_numbers_are_rejected() {
        assert!(decode_num(&[1, 2, 3, 4, 5]).is_err());
    }
}
