mod prop;

use std::convert::TryFrom;

use crate::amount::Amount;
use crate::block::Height;
use crate::transparent::{CoinbaseData, Input, OutPoint, Output, Script};

use super::*;

fn coinbase_input() -> Input {
    Input::Coinbase {
        data: CoinbaseData::new(vec![0x01, 0x02]),
        sequence: std::u32::MAX,
    }
}

fn spend_input(sequence: u32) -> Input {
    Input::PrevOut {
        outpoint: OutPoint {
            hash: Hash([7; 32]),
            index: 0,
        },
        unlock_script: Script::new(vec![]),
        sequence,
    }
}

fn output(value: i64) -> Output {
    Output {
        value: Amount::try_from(value).unwrap(),
        lock_script: Script::new(vec![]),
    }
}

#[test]
fn coinbase_detection() {
    let coinbase = Transaction::new(1, vec![coinbase_input()], vec![output(50)], LockTime::unlocked());
    assert!(coinbase.is_coinbase());
    assert!(coinbase.contains_coinbase_input());

    let spend = Transaction::new(1, vec![spend_input(0)], vec![output(50)], LockTime::unlocked());
    assert!(!spend.is_coinbase());

    // A coinbase input that is not the only input does not make the whole
    // transaction a coinbase.
    let mixed = Transaction::new(
        1,
        vec![coinbase_input(), spend_input(0)],
        vec![output(50)],
        LockTime::unlocked(),
    );
    assert!(!mixed.is_coinbase());
    assert!(mixed.contains_coinbase_input());
}

#[test]
fn finality() {
    let unlocked = Transaction::new(1, vec![spend_input(0)], vec![output(1)], LockTime::unlocked());
    assert!(unlocked.is_final(Height(0)));

    // Locked until height 100: not final before, final after.
    let locked = Transaction::new(1, vec![spend_input(0)], vec![output(1)], LockTime(100));
    assert!(!locked.is_final(Height(100)));
    assert!(locked.is_final(Height(101)));

    // A lock time in the future is overridden when every input is final.
    let opted_out = Transaction::new(
        1,
        vec![spend_input(std::u32::MAX)],
        vec![output(1)],
        LockTime(100),
    );
    assert!(opted_out.is_final(Height(0)));
}

#[test]
fn serialized_size_matches_encoding() {
    let tx = Transaction::new(
        1,
        vec![coinbase_input(), spend_input(5)],
        vec![output(50), output(7)],
        LockTime(3),
    );
    let bytes = tx.wren_serialize_to_vec().unwrap();
    assert_eq!(bytes.len(), tx.serialized_size());
}
