//! Exact decimal money amounts.

use std::fmt::Display;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Error;

/// A strictly positive amount of money.
///
/// Whether the money was earned or spent is recorded separately by the
/// [TransactionType](crate::TransactionType), so amounts are never negative.
///
/// Serialized as a decimal string, e.g. `"5.50"`; deserialized from either a
/// JSON number or a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// The largest amount a single transaction may have.
    pub const MAX: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

    /// Create an amount from a decimal value.
    ///
    /// # Errors
    ///
    /// Returns an [Error::InvalidAmount] if `value` is zero, negative or
    /// greater than [Amount::MAX].
    pub fn new(value: Decimal) -> Result<Self, Error> {
        if value <= Decimal::ZERO || value > Self::MAX {
            return Err(Error::InvalidAmount(value.to_string()));
        }

        Ok(Self(value))
    }

    /// The amount as a decimal number.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = Error;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// Stored as text so that no precision is lost to floating point.
impl ToSql for Amount {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.to_string()))
    }
}

impl FromSql for Amount {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse::<Decimal>()
            .map(Amount)
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}
