use proptest::{arbitrary::any, collection::vec, prelude::*};

use crate::transparent;

use super::{LockTime, Transaction};

impl Arbitrary for Transaction {
    type Parameters = ();

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        (
            vec(any::<transparent::Input>(), 1..5),
            vec(any::<transparent::Output>(), 1..5),
            any::<LockTime>(),
        )
            .prop_map(|(inputs, outputs, lock_time)| {
                Transaction::new(1, inputs, outputs, lock_time)
            })
            .boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}
