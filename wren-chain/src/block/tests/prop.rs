use std::env;

use proptest::{arbitrary::any, prelude::*, test_runner::Config};

use crate::serialization::{WrenDeserializeInto, WrenSerialize};

use super::super::*;

proptest! {
    #[test]
    fn block_hash_roundtrip(hash in any::<Hash>()) {
        wren_test::init();

        let bytes = hash.wren_serialize_to_vec()?;
        let other_hash: Hash = bytes.as_slice().wren_deserialize_into()?;

        prop_assert_eq![hash, other_hash];
    }

    #[test]
    fn block_hash_display_fromstr_roundtrip(hash in any::<Hash>()) {
        wren_test::init();

        let display = format!("{}", hash);
        let parsed = display.parse::<Hash>().expect("hash should parse");
        prop_assert_eq!(hash, parsed);
    }
}

proptest! {
    #![proptest_config(Config::with_cases(1000))]

    #[test]
    fn blockheader_roundtrip(header in any::<Header>()) {
        wren_test::init();

        let bytes = header.wren_serialize_to_vec().unwrap();
        let other_header = bytes.as_slice().wren_deserialize_into()?;

        prop_assert_eq![header, other_header];
    }
}

proptest! {
    // The block roundtrip test can be really slow, so we use fewer cases by
    // default. Set the PROPTEST_CASES env var to override this default.
    #![proptest_config(Config::with_cases(env::var("PROPTEST_CASES")
                                          .ok()
                                          .and_then(|v| v.parse().ok())
                                          .unwrap_or(16)))]

    #[test]
    fn block_roundtrip(block in any::<Block>()) {
        wren_test::init();

        let bytes = block.wren_serialize_to_vec()?;

        let other_block: Block = bytes.as_slice().wren_deserialize_into()?;

        prop_assert_eq![&block, &other_block];

        // Block hashes are invariant under re-serialization.
        prop_assert_eq![block.hash(), other_block.hash()];
    }
}
