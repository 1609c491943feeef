//! Fixed-point money values.
//!
//! Amounts are held as [`Decimal`] rescaled to two fractional digits, matching the
//! `NUMERIC(10,2)` / `NUMERIC(12,2)` storage columns. Nothing here ever goes through `f64`
//! arithmetic; floats are only accepted at the catalog boundary and rounded once.

use std::fmt;
use std::str::FromStr;

use diesel::{
    AsExpression, FromSqlRow,
    deserialize::{self, FromSql},
    pg::{Pg, PgValue},
    serialize::{self, Output, ToSql},
    sql_types::Numeric,
};
use rust_decimal::{Decimal, RoundingStrategy, prelude::FromPrimitive};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Number of fractional digits every amount is kept at.
pub const SCALE: u32 = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

/// A non-negative currency amount with exactly [`SCALE`] fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, AsExpression, FromSqlRow)]
#[diesel(sql_type = Numeric)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::from_parts(0, 0, 0, false, SCALE));
    /// Largest value `NUMERIC(10,2)` holds: 99,999,999.99.
    pub const MAX_UNIT_PRICE: Money = Money(Decimal::from_parts(0x540B_E3FF, 0x2, 0, false, SCALE));
    /// Largest value `NUMERIC(12,2)` holds: 9,999,999,999.99.
    pub const MAX_TOTAL: Money = Money(Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, SCALE));

    /// Builds an amount from an exact decimal, rounding half away from zero to two digits.
    /// Anything above [`Money::MAX_TOTAL`] is rejected.
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MoneyError::InvalidAmount(format!(
                "amount must be non-negative, got {value}"
            )));
        }
        Self::rescaled(value).at_most(Self::MAX_TOTAL)
    }

    /// Converts a catalog unit price. NaN, infinities, negative values and prices above
    /// [`Money::MAX_UNIT_PRICE`] are rejected.
    pub fn from_f64(value: f64) -> Result<Self, MoneyError> {
        if !value.is_finite() {
            return Err(MoneyError::InvalidAmount(format!(
                "amount must be a finite number, got {value}"
            )));
        }
        let decimal = Decimal::from_f64(value).ok_or_else(|| {
            MoneyError::InvalidAmount(format!("amount {value} is out of range"))
        })?;
        Self::new(decimal)?.at_most(Self::MAX_UNIT_PRICE)
    }

    /// `self * quantity`, exact. Fails when the product does not fit [`Money::MAX_TOTAL`].
    pub fn times(self, quantity: u32) -> Result<Self, MoneyError> {
        self.0
            .checked_mul(Decimal::from(quantity))
            .map(Self::rescaled)
            .ok_or_else(|| {
                MoneyError::InvalidAmount(format!("{} x {quantity} overflows", self.0))
            })?
            .at_most(Self::MAX_TOTAL)
    }

    fn at_most(self, limit: Money) -> Result<Self, MoneyError> {
        if self > limit {
            return Err(MoneyError::InvalidAmount(format!(
                "amount {self} exceeds the maximum of {limit}"
            )));
        }
        Ok(self)
    }

    fn rescaled(value: Decimal) -> Self {
        let mut rounded = value.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(SCALE);
        Money(rounded)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s.trim())
            .map_err(|e| MoneyError::InvalidAmount(format!("{s:?}: {e}")))?;
        Self::new(decimal)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let decimal = <Decimal as Deserialize>::deserialize(deserializer)?;
        Money::new(decimal).map_err(serde::de::Error::custom)
    }
}

impl ToSql<Numeric, Pg> for Money {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        <Decimal as ToSql<Numeric, Pg>>::to_sql(&self.0, out)
    }
}

impl FromSql<Numeric, Pg> for Money {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let decimal = <Decimal as FromSql<Numeric, Pg>>::from_sql(bytes)?;
        Ok(Money::rescaled(decimal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiplication_is_exact() {
        let unit = Money::from_f64(50.0).unwrap();
        assert_eq!(unit.times(3).unwrap().to_string(), "150.00");

        // 0.1 * 3 drifts in f64 but not here
        let dime = Money::from_f64(0.1).unwrap();
        assert_eq!(dime.times(3).unwrap(), "0.30".parse().unwrap());
    }

    #[test]
    fn test_always_two_fraction_digits() {
        assert_eq!(Money::from_f64(12.5).unwrap().to_string(), "12.50");
        assert_eq!("7".parse::<Money>().unwrap().to_string(), "7.00");
        assert_eq!(Money::ZERO.to_string(), "0.00");
        assert_eq!(Money::from_f64(19.999).unwrap().to_string(), "20.00");
    }

    #[test]
    fn test_rejects_non_finite_and_negative() {
        assert!(matches!(Money::from_f64(f64::NAN), Err(MoneyError::InvalidAmount(_))));
        assert!(matches!(Money::from_f64(f64::INFINITY), Err(MoneyError::InvalidAmount(_))));
        assert!(matches!(Money::from_f64(-0.01), Err(MoneyError::InvalidAmount(_))));
        assert!("-3.00".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
    }

    #[test]
    fn test_overflow_is_an_error() {
        assert!(Money::MAX_TOTAL.times(u32::MAX).is_err());
    }

    #[test]
    fn test_storage_limits() {
        assert_eq!(Money::MAX_UNIT_PRICE.to_string(), "99999999.99");
        assert_eq!(Money::MAX_TOTAL.to_string(), "9999999999.99");

        assert!(Money::from_f64(99_999_999.99).is_ok());
        assert!(Money::from_f64(100_000_000.0).is_err());
        assert!("10000000000.00".parse::<Money>().is_err());

        let unit = Money::from_f64(50.0).unwrap();
        assert_eq!(unit.times(199_999_999).unwrap().to_string(), "9999999950.00");
        assert!(matches!(unit.times(2_000_000_000), Err(MoneyError::InvalidAmount(_))));
    }

    #[test]
    fn test_serializes_as_string() {
        let amount = Money::from_f64(150.0).unwrap();
        assert_eq!(serde_json::to_value(amount).unwrap(), serde_json::json!("150.00"));

        let parsed: Money = serde_json::from_value(serde_json::json!("49.90")).unwrap();
        assert_eq!(parsed.to_string(), "49.90");
    }
}
