use std::sync::Arc;

use chrono::{TimeZone, Utc};
use proptest::{
    arbitrary::{any, Arbitrary},
    collection::vec,
    prelude::*,
};

use crate::transaction::Transaction;
use crate::work::difficulty::CompactDifficulty;

use super::*;

impl Arbitrary for Header {
    type Parameters = ();

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        (
            // version is interpreted as i32 by some peers, so stay within i32::MAX
            (1u32..(i32::MAX as u32)),
            any::<Hash>(),
            any::<merkle::Root>(),
            // time is serialized as u32, but rust timestamps are i64
            (0i64..(u32::MAX as i64)),
            any::<CompactDifficulty>(),
            any::<u32>(),
        )
            .prop_map(|(version, prev, root, time, bits, nonce)| {
                Header::new(version, prev, root, Utc.timestamp(time, 0), bits, nonce)
            })
            .boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}

impl Arbitrary for Block {
    type Parameters = ();

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        (any::<Header>(), vec(any::<Transaction>(), 1..3))
            .prop_map(|(header, transactions)| Block {
                header,
                transactions: transactions.into_iter().map(Arc::new).collect(),
            })
            .boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}
