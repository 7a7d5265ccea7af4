//! Fixed-scale monetary values.
//!
//! Balances and transaction amounts are always non-negative decimals with
//! exactly two fractional digits; direction is carried by the transaction
//! type, never by a sign. Keeping the constraint in a newtype means a
//! negative or over-precise value is unrepresentable past the validation
//! boundary.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Validation errors for [`Money`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    /// The value was negative.
    #[error("monetary values must not be negative")]
    Negative,
    /// The value carried more than two fractional digits.
    #[error("monetary values are limited to two fractional digits")]
    TooPrecise,
}

/// A non-negative amount of money at scale 2.
///
/// Serialises as an exact decimal string (`"120.00"`); deserialises from
/// either a JSON number or a string, rejecting negative or over-precise
/// input.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(try_from = "Decimal", into = "Decimal")]
#[schema(value_type = String, example = "120.00")]
pub struct Money(Decimal);

impl Money {
    /// Validate and construct a [`Money`] value, normalising to scale 2.
    ///
    /// # Errors
    ///
    /// [`MoneyError::Negative`] for values below zero and
    /// [`MoneyError::TooPrecise`] for values with more than two fractional
    /// digits.
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MoneyError::Negative);
        }
        if value.normalize().scale() > 2 {
            return Err(MoneyError::TooPrecise);
        }
        let mut normalised = value;
        normalised.rescale(2);
        Ok(Self(normalised))
    }

    /// The zero amount.
    pub fn zero() -> Self {
        Self(Decimal::new(0, 2))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// The underlying decimal, always at scale 2.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
