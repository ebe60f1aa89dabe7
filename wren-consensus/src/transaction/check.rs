//! Stateless transaction checks and the fee policy.

use std::collections::HashSet;
use std::convert::TryFrom;

use wren_chain::amount::{Amount, NonNegative, CENT};
use wren_chain::block::MAX_BLOCK_BYTES;
use wren_chain::transaction::Transaction;
use wren_chain::transparent::Input;

use crate::error::TransactionError;

/// Checks that the transaction has at least one input and one output.
pub fn has_inputs_and_outputs(tx: &Transaction) -> Result<(), TransactionError> {
    if tx.inputs.is_empty() {
        Err(TransactionError::NoInputs)
    } else if tx.outputs.is_empty() {
        Err(TransactionError::NoOutputs)
    } else {
        Ok(())
    }
}

/// Checks that the total output value is within the money range.
///
/// Per-output range is enforced by construction ([`Amount`] is
/// non-negative and capped); the sum can still overflow the cap.
pub fn output_value_in_range(tx: &Transaction) -> Result<(), TransactionError> {
    tx.value_out()?;
    Ok(())
}

/// Checks that no two inputs of the transaction claim the same previous
/// output.
pub fn no_duplicate_inputs(tx: &Transaction) -> Result<(), TransactionError> {
    let mut seen = HashSet::new();
    for input in tx.inputs.iter() {
        if let Some(outpoint) = input.outpoint() {
            if !seen.insert(outpoint) {
                return Err(TransactionError::DuplicateInput);
            }
        }
    }
    Ok(())
}

/// Coinbase-shape checks: a coinbase carries 2 to 100 bytes of free
/// data, and a non-coinbase must not claim null previous outputs.
pub fn coinbase_shape(tx: &Transaction) -> Result<(), TransactionError> {
    if tx.is_coinbase() {
        let data_len = match &tx.inputs[0] {
            Input::Coinbase { data, .. } => data.as_ref().len(),
            _ => unreachable!("is_coinbase checked the first input"),
        };
        if !(2..=100).contains(&data_len) {
            return Err(TransactionError::CoinbaseScriptSize);
        }
    } else {
        for input in tx.inputs.iter() {
            if input.outpoint().is_none() {
                return Err(TransactionError::NullPrevOut);
            }
        }
    }
    Ok(())
}

/// Checks that don't depend on any context.
pub fn check_transaction(tx: &Transaction) -> Result<(), TransactionError> {
    has_inputs_and_outputs(tx)?;
    output_value_in_range(tx)?;
    no_duplicate_inputs(tx)?;
    coinbase_shape(tx)?;
    if tx.serialized_size() as u64 > MAX_BLOCK_BYTES {
        return Err(TransactionError::Oversized);
    }
    Ok(())
}

/// The minimum fee to relay or include `tx`.
///
/// The base rate is one cent per started kilobyte. With `discount` set
/// (the free space a miner may grant), small transactions ride free --
/// unless any output is below one cent, in which case a one-cent floor
/// deters dust spam.
pub fn min_fee(tx: &Transaction, discount: bool) -> Amount<NonNegative> {
    let bytes = tx.serialized_size();
    let mut min_fee = (1 + bytes as i64 / 1000) * CENT;

    if discount && bytes < crate::parameters::FREE_BLOCK_BYTES {
        min_fee = 0;
    }

    if min_fee < CENT {
        let has_dust_output = tx
            .outputs
            .iter()
            .any(|output| i64::from(output.value) < CENT);
        if has_dust_output {
            min_fee = CENT;
        }
    }

    Amount::try_from(min_fee).expect("fee formula stays in the money range")
}

#[cfg(test)]
mod tests {
    use wren_chain::amount::COIN;
    use wren_chain::transaction::LockTime;
    use wren_chain::transparent::{CoinbaseData, OutPoint, Output, Script};

    use super::*;

    fn output(value: i64) -> Output {
        Output {
            value: Amount::try_from(value).unwrap(),
            lock_script: Script::new(vec![0x51]),
        }
    }

    fn spend(index: u32) -> Input {
        Input::PrevOut {
            outpoint: OutPoint {
                hash: wren_chain::transaction::Hash([5; 32]),
                index,
            },
            unlock_script: Script::new(vec![]),
            sequence: std::u32::MAX,
        }
    }

    #[test]
    fn empty_sides_are_rejected() {
        let no_inputs = Transaction::new(1, vec![], vec![output(1)], LockTime::unlocked());
        assert!(matches!(
            check_transaction(&no_inputs),
            Err(TransactionError::NoInputs)
        ));

        let no_outputs = Transaction::new(1, vec![spend(0)], vec![], LockTime::unlocked());
        assert!(matches!(
            check_transaction(&no_outputs),
            Err(TransactionError::NoOutputs)
        ));
    }

    #[test]
    fn duplicate_inputs_are_rejected() {
        let tx = Transaction::new(
            1,
            vec![spend(0), spend(1), spend(0)],
            vec![output(1)],
            LockTime::unlocked(),
        );
        assert!(matches!(
            check_transaction(&tx),
            Err(TransactionError::DuplicateInput)
        ));
    }

    #[test]
    fn coinbase_data_size_bounds() {
        for (len, ok) in [(1usize, false), (2, true), (100, true), (101, false)].iter() {
            let tx = Transaction::new(
                1,
                vec![Input::Coinbase {
                    data: CoinbaseData::new(vec![0xaa; *len]),
                    sequence: std::u32::MAX,
                }],
                vec![output(50 * COIN)],
                LockTime::unlocked(),
            );
            assert_eq!(check_transaction(&tx).is_ok(), *ok, "len {}", len);
        }
    }

    #[test]
    fn null_prevout_outside_coinbase_is_rejected() {
        let tx = Transaction::new(
            1,
            vec![
                spend(0),
                Input::Coinbase {
                    data: CoinbaseData::new(vec![1, 2]),
                    sequence: std::u32::MAX,
                },
            ],
            vec![output(1)],
            LockTime::unlocked(),
        );
        assert!(matches!(
            check_transaction(&tx),
            Err(TransactionError::NullPrevOut)
        ));
    }

    #[test]
    fn fee_policy() {
        let small = Transaction::new(1, vec![spend(0)], vec![output(COIN)], LockTime::unlocked());
        // Relay discount: small transactions with sane outputs are free.
        assert_eq!(i64::from(min_fee(&small, true)), 0);
        // Without the discount the kilobyte rate applies.
        assert_eq!(i64::from(min_fee(&small, false)), CENT);

        // Dust outputs always pay the one-cent floor.
        let dusty = Transaction::new(
            1,
            vec![spend(0)],
            vec![output(CENT - 1)],
            LockTime::unlocked(),
        );
        assert_eq!(i64::from(min_fee(&dusty, true)), CENT);
    }
}
