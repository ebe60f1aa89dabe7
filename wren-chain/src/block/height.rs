use serde::{Deserialize, Serialize};

#[cfg(any(test, feature = "proptest-impl"))]
use proptest_derive::Arbitrary;

/// The length of the chain back to the genesis block.
#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(Arbitrary))]
pub struct Height(pub u32);

impl Height {
    /// The genesis height.
    pub const MIN: Height = Height(0);

    /// The height of the immediate child of a block at this height.
    pub fn next(self) -> Height {
        Height(self.0.checked_add(1).expect("heights fit in a u32"))
    }
}
