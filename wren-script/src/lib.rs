//! The script interpreter: a stack machine over byte strings that decides
//! whether a transaction input is entitled to spend the output it claims.
//!
//! An output's `lock_script` states the spending conditions; the input's
//! `unlock_script` supplies the evidence. A spend is valid iff evaluating
//! the unlock script and then the lock script over one shared stack leaves
//! the stack non-empty with a truthy top.

pub mod interpreter;
pub mod opcodes;
pub mod sighash;
pub mod standard;

pub use interpreter::{eval_script, verify_script};
pub use sighash::{
    signature_hash, SIGHASH_ALL, SIGHASH_ANYONECANPAY, SIGHASH_NONE, SIGHASH_SINGLE,
};
pub use standard::{pay_to_pubkey, pay_to_pubkey_hash, sign_signature, solve, Builder, Destination};

/// Script evaluation failures.
///
/// Any failure fails the enclosing input.
#[derive(thiserror::Error, displaydoc::Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// unknown or malformed opcode in stream
    BadOpcode,
    /// truncated push in opcode stream
    BadPush,
    /// stack underflow
    StackUnderflow,
    /// push exceeds the element size limit
    PushSize,
    /// script exceeds the script size limit
    ScriptSize,
    /// stack exceeds the stack size limit
    StackSize,
    /// exceeded the operation count limit
    OpCount,
    /// unbalanced conditional
    UnbalancedConditional,
    /// verify operation evaluated false
    VerifyFailed,
    /// script evaluated with a false or empty top of stack
    EvalFalse,
    /// public key count out of range for multisig
    PubkeyCount,
    /// signature count out of range for multisig
    SigCount,
    /// numeric stack element too large
    NumberOverflow,
    /// input index out of range for the spending transaction
    InputIndex,
    /// single-output signature hash refers to a missing output
    OutputIndex,
    /// signing key does not match the lock script
    KeyMismatch,
    /// lock script does not match a known template
    UnknownTemplate,
    /// signing failed
    Signing,
}
