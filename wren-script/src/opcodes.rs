//! Opcode byte values understood by the interpreter.
//!
//! Bytes `0x01..=0x4b` are direct pushes of that many bytes and have no
//! named constant.

/// Push an empty byte string.
pub const OP_0: u8 = 0x00;
/// The next byte is a push length.
pub const OP_PUSHDATA1: u8 = 0x4c;
/// The next two bytes (LE) are a push length.
pub const OP_PUSHDATA2: u8 = 0x4d;
/// The next four bytes (LE) are a push length.
pub const OP_PUSHDATA4: u8 = 0x4e;
/// Push the number -1.
pub const OP_1NEGATE: u8 = 0x4f;
/// Push the number 1. `OP_2..OP_16` follow contiguously.
pub const OP_1: u8 = 0x51;
/// Push the number 16.
pub const OP_16: u8 = 0x60;

pub const OP_IF: u8 = 0x63;
pub const OP_NOTIF: u8 = 0x64;
pub const OP_ELSE: u8 = 0x67;
pub const OP_ENDIF: u8 = 0x68;
pub const OP_VERIFY: u8 = 0x69;

pub const OP_DUP: u8 = 0x76;

pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;

pub const OP_HASH160: u8 = 0xa9;

pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKSIGVERIFY: u8 = 0xad;
pub const OP_CHECKMULTISIG: u8 = 0xae;
pub const OP_CHECKMULTISIGVERIFY: u8 = 0xaf;

/// The largest byte string a single push may place on the stack.
pub const MAX_ELEMENT_SIZE: usize = 520;
/// The deepest the stack may grow during evaluation.
pub const MAX_STACK_SIZE: usize = 1000;
/// The largest script the interpreter will evaluate.
pub const MAX_SCRIPT_SIZE: usize = 10_000;
/// The most non-push operations one evaluation may execute.
pub const MAX_OPS_PER_SCRIPT: usize = 201;
/// The most public keys a single CHECKMULTISIG may name.
pub const MAX_PUBKEYS_PER_MULTISIG: i64 = 20;
