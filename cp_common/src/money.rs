use std::{
    fmt::Display,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const CURRENCY_CODE: &str = "INR";

//--------------------------------------       Money         ---------------------------------------------------------
/// An amount of money in minor currency units (paise). All prices, fees and totals are expressed in this type, so
/// there is no floating point arithmetic anywhere in the pricing pipeline.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as an amount of money: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {value} is too large to convert to Money")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}₹{}.{:02}", abs / 100, abs % 100)
    }
}

/// Parses a rupee amount such as `500`, `499.5` or `12.05`. At most two decimal places are accepted.
impl FromStr for Money {
    type Err = MoneyConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('₹');
        let (negative, s) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let mut parts = s.splitn(2, '.');
        let whole = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| MoneyConversionError(s.to_string()))?
            .parse::<i64>()
            .map_err(|e| MoneyConversionError(format!("{s}. {e}")))?;
        let paise = match parts.next() {
            None => 0,
            Some(frac) if frac.len() == 1 => {
                frac.parse::<i64>().map_err(|e| MoneyConversionError(format!("{s}. {e}")))? * 10
            },
            Some(frac) if frac.len() == 2 => frac.parse::<i64>().map_err(|e| MoneyConversionError(format!("{s}. {e}")))?,
            Some(_) => return Err(MoneyConversionError(format!("{s} has more than two decimal places"))),
        };
        let value = whole
            .checked_mul(100)
            .and_then(|v| v.checked_add(paise))
            .ok_or_else(|| MoneyConversionError(format!("{s} is out of range")))?;
        Ok(Self(if negative { -value } else { value }))
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Saturates at the limits of `i64` paise.
    pub fn from_rupees(rupees: i64) -> Self {
        Self(rupees.saturating_mul(100))
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    pub fn checked_mul(self, factor: i64) -> Option<Self> {
        self.0.checked_mul(factor).map(Self)
    }

    /// Adds up `amounts`, or returns `None` if the total does not fit.
    pub fn checked_sum<I: IntoIterator<Item = Self>>(amounts: I) -> Option<Self> {
        amounts.into_iter().try_fold(Self::default(), Self::checked_add)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Applies a rate given in basis points (1/100th of a percent), rounding half up to the nearest paisa.
    /// Returns `None` if the result does not fit.
    pub fn basis_points(&self, bps: u32) -> Option<Self> {
        let scaled = i128::from(self.0) * i128::from(bps);
        i64::try_from((scaled + 5_000) / 10_000).ok().map(Self)
    }
}
