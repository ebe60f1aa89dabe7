use std::convert::TryFrom;

use proptest::{arbitrary::any, collection::vec, prelude::*};

use crate::amount::{Amount, MAX_MONEY};

use super::{CoinbaseData, Input, OutPoint, Output, Script};

impl Arbitrary for CoinbaseData {
    type Parameters = ();

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        vec(any::<u8>(), 2..95).prop_map(CoinbaseData).boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}

impl Arbitrary for Input {
    type Parameters = ();

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            (any::<OutPoint>(), any::<Script>(), any::<u32>()).prop_map(
                |(outpoint, unlock_script, sequence)| Input::PrevOut {
                    outpoint,
                    unlock_script,
                    sequence,
                }
            ),
            (any::<CoinbaseData>(), any::<u32>())
                .prop_map(|(data, sequence)| Input::Coinbase { data, sequence }),
        ]
        .boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}

impl Arbitrary for Output {
    type Parameters = ();

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        (0..=MAX_MONEY, any::<Script>())
            .prop_map(|(value, lock_script)| Output {
                value: Amount::try_from(value).expect("value in range by construction"),
                lock_script,
            })
            .boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}
