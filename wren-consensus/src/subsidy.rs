//! The block subsidy schedule.

use std::convert::TryFrom;

use wren_chain::amount::{Amount, Error, NonNegative};
use wren_chain::block::Height;

use crate::parameters::{HALVING_INTERVAL, MAX_BLOCK_SUBSIDY};

/// The new coin a block at `height` may award its miner, before fees.
///
/// The subsidy starts at 50 coin and halves every
/// [`HALVING_INTERVAL`] blocks until, after the 64th halving, it is 0.
pub fn block_subsidy(height: Height) -> Result<Amount<NonNegative>, Error> {
    let halvings = height.0 / HALVING_INTERVAL.0;
    if halvings >= 64 {
        return Amount::try_from(0i64);
    }
    let subsidy = MAX_BLOCK_SUBSIDY >> u64::from(halvings);
    Amount::try_from(subsidy)
}

#[cfg(test)]
mod test {
    use color_eyre::Report;

    use wren_chain::amount::COIN;

    use super::*;

    #[test]
    fn block_subsidy_halves_on_schedule() -> Result<(), Report> {
        wren_test::init();

        // The initial block subsidy is 50 coin.
        assert_eq!(
            Amount::try_from(50 * COIN),
            block_subsidy(Height(0))
        );
        assert_eq!(
            Amount::try_from(50 * COIN),
            block_subsidy(Height(HALVING_INTERVAL.0 - 1))
        );

        // After the first halving, 25 coin.
        assert_eq!(
            Amount::try_from(25 * COIN),
            block_subsidy(Height(HALVING_INTERVAL.0))
        );

        // After the second halving, 12.5 coin.
        assert_eq!(
            Amount::try_from(1_250_000_000i64),
            block_subsidy(Height(HALVING_INTERVAL.0 * 2))
        );

        // After the 32nd halving, a single base unit.
        assert_eq!(
            Amount::try_from(1i64),
            block_subsidy(Height(HALVING_INTERVAL.0 * 32))
        );

        // After the 33rd halving and forever after, nothing.
        assert_eq!(Amount::try_from(0i64), block_subsidy(Height(HALVING_INTERVAL.0 * 33)));
        assert_eq!(Amount::try_from(0i64), block_subsidy(Height(HALVING_INTERVAL.0 * 64)));

        Ok(())
    }
}
