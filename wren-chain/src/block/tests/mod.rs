mod prop;

use super::*;

#[test]
fn header_serializes_to_80_bytes() {
    let header = Header::null();
    let bytes = header.wren_serialize_to_vec().unwrap();
    assert_eq!(bytes.len(), Header::len());
}
