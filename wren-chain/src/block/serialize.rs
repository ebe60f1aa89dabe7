/// The maximum serialized size of a block, in bytes.
///
/// This is the cap every stateless block check and every deserializer
/// enforces; a block larger than this can never be valid.
pub const MAX_BLOCK_BYTES: u64 = 0x0200_0000;
