use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

/// Number of decimal places the processor's minor units carry.
pub const MINOR_UNIT_SCALE: u32 = 2;

/// An amount as the processor sends it: an integer count of minor units
/// (cents) plus an ISO currency code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinorAmount {
    pub currency: String,
    pub value: i64,
}

impl MinorAmount {
    pub fn new(value: i64, currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            value,
        }
    }

    /// Converts minor units into a decimal amount, e.g. `1500` -> `15.00`.
    pub fn to_money(&self) -> Money {
        Money::new(
            Decimal::new(self.value, MINOR_UNIT_SCALE),
            self.currency.clone(),
        )
    }
}

/// A decimal amount in a single currency.
///
/// Arithmetic between amounts of different currencies is a programming error;
/// the core never converts currencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    pub fn zero(currency: impl Into<String>) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// Minor units for requests sent to the processor.
    pub fn to_minor(&self) -> MinorAmount {
        let mut scaled = self.amount;
        scaled.rescale(MINOR_UNIT_SCALE);
        MinorAmount::new(
            (scaled * Decimal::from(10i64.pow(MINOR_UNIT_SCALE)))
                .trunc()
                .try_into()
                .unwrap_or(i64::MAX),
            self.currency.clone(),
        )
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        debug_assert_eq!(self.currency, rhs.currency);
        Self::new(self.amount + rhs.amount, self.currency)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        debug_assert_eq!(self.currency, rhs.currency);
        self.amount += rhs.amount;
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}
