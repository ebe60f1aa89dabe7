use proptest::prelude::*;

use crate::serialization::{WrenDeserializeInto, WrenSerialize};

use super::super::*;

proptest! {
    #[test]
    fn transaction_roundtrip(tx in any::<Transaction>()) {
        wren_test::init();

        let bytes = tx.wren_serialize_to_vec()?;
        let other_tx: Transaction = bytes.as_slice().wren_deserialize_into()?;

        prop_assert_eq![&tx, &other_tx];
    }

    #[test]
    fn hash_stable_under_reserialization(tx in any::<Transaction>()) {
        wren_test::init();

        let bytes = tx.wren_serialize_to_vec()?;
        let other_tx: Transaction = bytes.as_slice().wren_deserialize_into()?;

        // The txid does not depend on in-memory caches.
        prop_assert_eq![tx.hash(), other_tx.hash()];

        let rebytes = other_tx.wren_serialize_to_vec()?;
        prop_assert_eq![bytes, rebytes];
    }
}
