//! Strongly-typed coin amounts.
//!
//! The native unit is divisible to 10⁻⁸: `COIN` is one coin in base units
//! and `CENT` is 10⁻² coin. An [`Amount`] is an `i64` of base units tagged
//! with a constraint marker so that value-flow code can't accidentally mix
//! balances (non-negative) with deltas (sign-allowed).

use std::{cmp::Ordering, convert::TryFrom, marker::PhantomData, ops::RangeInclusive};

use serde::{Deserialize, Serialize};

use crate::{SerializationError, WrenDeserialize, WrenSerialize};

/// One coin, in base units.
pub const COIN: i64 = 100_000_000;

/// One cent (10⁻² coin), in base units.
pub const CENT: i64 = 1_000_000;

/// The total issuance cap, in base units.
pub const MAX_MONEY: i64 = 21_000_000 * COIN;

/// A runtime validated type for representing amounts of coins.
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount<C = NonNegative>(i64, PhantomData<C>);

impl<C> std::fmt::Debug for Amount<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple(&format!("Amount<{}>", std::any::type_name::<C>()))
            .field(&self.0)
            .finish()
    }
}

impl<C> Clone for Amount<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Amount<C> {}

impl<C> PartialEq for Amount<C> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<C> Eq for Amount<C> {}

impl<C> PartialOrd for Amount<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C> Ord for Amount<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl<C> std::hash::Hash for Amount<C> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl<C> Amount<C>
where
    C: Constraint,
{
    /// The zero amount.
    pub fn zero() -> Self {
        Amount(0, PhantomData)
    }

    /// Convert this amount into a different constraint, re-validating the
    /// value against the target range.
    pub fn constrain<C2: Constraint>(self) -> Result<Amount<C2>, Error> {
        Amount::<C2>::try_from(self.0)
    }

    /// Checked addition within the constraint's range.
    pub fn checked_add(self, rhs: Amount<C>) -> Result<Amount<C>, Error> {
        let value = self.0.checked_add(rhs.0).ok_or(Error::Overflow)?;
        Amount::try_from(value)
    }

    /// Checked subtraction within the constraint's range.
    pub fn checked_sub(self, rhs: Amount<C>) -> Result<Amount<C>, Error> {
        let value = self.0.checked_sub(rhs.0).ok_or(Error::Overflow)?;
        Amount::try_from(value)
    }

    /// Sum an iterator of amounts, failing on any range violation.
    pub fn sum(amounts: impl IntoIterator<Item = Amount<C>>) -> Result<Amount<C>, Error> {
        let mut total = Amount::zero();
        for amount in amounts {
            total = total.checked_add(amount)?;
        }
        Ok(total)
    }
}

impl<C> From<Amount<C>> for i64 {
    fn from(amount: Amount<C>) -> i64 {
        amount.0
    }
}

impl<C> TryFrom<i64> for Amount<C>
where
    C: Constraint,
{
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if C::valid_range().contains(&value) {
            Ok(Amount(value, PhantomData))
        } else {
            Err(Error::Constraint { value })
        }
    }
}

impl<C> TryFrom<u64> for Amount<C>
where
    C: Constraint,
{
    type Error = Error;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        let value = i64::try_from(value).map_err(|_| Error::Overflow)?;
        Amount::try_from(value)
    }
}

/// Errors that can be returned when validating `Amount`s.
#[derive(thiserror::Error, displaydoc::Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// amount {value} is outside the valid range
    Constraint { value: i64 },
    /// overflow during amount arithmetic
    Overflow,
}

/// Marker type for `Amount` constraints.
pub trait Constraint {
    /// The range of values this constraint accepts.
    fn valid_range() -> RangeInclusive<i64>;
}

/// Allows only values in `0..=MAX_MONEY`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NonNegative;

impl Constraint for NonNegative {
    fn valid_range() -> RangeInclusive<i64> {
        0..=MAX_MONEY
    }
}

/// Allows any value in `-MAX_MONEY..=MAX_MONEY`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NegativeAllowed;

impl Constraint for NegativeAllowed {
    fn valid_range() -> RangeInclusive<i64> {
        -MAX_MONEY..=MAX_MONEY
    }
}

impl<C> WrenSerialize for Amount<C> {
    fn wren_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        self.0.wren_serialize(&mut target)
    }
}

impl<C: Constraint> WrenDeserialize for Amount<C> {
    fn wren_deserialize<R: std::io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let value = i64::wren_deserialize(&mut reader)?;
        Amount::try_from(value).map_err(|_| SerializationError::Parse("amount out of range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constrains_range() {
        assert!(Amount::<NonNegative>::try_from(-1i64).is_err());
        assert!(Amount::<NonNegative>::try_from(0i64).is_ok());
        assert!(Amount::<NonNegative>::try_from(MAX_MONEY).is_ok());
        assert!(Amount::<NonNegative>::try_from(MAX_MONEY + 1).is_err());

        assert!(Amount::<NegativeAllowed>::try_from(-MAX_MONEY).is_ok());
        assert!(Amount::<NegativeAllowed>::try_from(-MAX_MONEY - 1).is_err());
    }

    #[test]
    fn checked_arithmetic() {
        let fifty = Amount::<NonNegative>::try_from(50 * COIN).unwrap();
        let hundred = fifty.checked_add(fifty).unwrap();
        assert_eq!(i64::from(hundred), 100 * COIN);
        assert!(hundred.checked_sub(fifty).is_ok());
        assert!(fifty.checked_sub(hundred).is_err());

        let max = Amount::<NonNegative>::try_from(MAX_MONEY).unwrap();
        assert!(max.checked_add(fifty).is_err());
    }

    #[test]
    fn sums() {
        let amounts = (1..=3)
            .map(|i| Amount::<NonNegative>::try_from(i * COIN).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(i64::from(Amount::sum(amounts).unwrap()), 6 * COIN);
    }
}
