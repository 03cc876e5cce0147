use crate::error::PaymentError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// An account balance in the account's currency.
///
/// Wraps `rust_decimal::Decimal` so balances and payment amounts cannot be
/// mixed up by accident.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

/// A strictly positive monetary amount for a payment or fare.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PaymentError::InvalidAmount(format!(
                "amount must be positive, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Fails when the amount carries more fractional digits than the
    /// currency's minor unit allows.
    pub fn ensure_minor_units(&self, minor_units: u32) -> Result<(), PaymentError> {
        if self.0.normalize().scale() > minor_units {
            return Err(PaymentError::InvalidAmount(format!(
                "{} has more than {minor_units} decimal places",
                self.0
            )));
        }
        Ok(())
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn covers(&self, amount: Amount) -> bool {
        self.0 >= amount.0
    }
}

impl Add for Balance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Balance {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

/// A merchant commission rate in `[0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct CommissionRate(Decimal);

impl CommissionRate {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(rate: Decimal) -> Result<Self, PaymentError> {
        if rate >= Decimal::ZERO && rate < Decimal::ONE {
            Ok(Self(rate))
        } else {
            Err(PaymentError::InvalidInput(format!(
                "commission rate {rate} is outside [0, 1)"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for CommissionRate {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CommissionRate> for Decimal {
    fn from(rate: CommissionRate) -> Self {
        rate.0
    }
}

/// Rounding applied to the commission at the currency's minor unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    #[default]
    HalfEven,
    HalfUp,
    Down,
}

impl From<RoundingMode> for RoundingStrategy {
    fn from(mode: RoundingMode) -> Self {
        match mode {
            RoundingMode::HalfEven => RoundingStrategy::MidpointNearestEven,
            RoundingMode::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            RoundingMode::Down => RoundingStrategy::ToZero,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommissionSplit {
    pub commission: Decimal,
    pub net: Decimal,
}

/// Splits `amount` into the merchant's commission and the net payout.
///
/// Only the commission is rounded; the net is derived by subtraction so
/// `commission + net == amount` always holds.
pub fn split_commission(
    amount: Amount,
    rate: CommissionRate,
    minor_units: u32,
    mode: RoundingMode,
) -> CommissionSplit {
    let commission =
        (amount.value() * rate.value()).round_dp_with_strategy(minor_units, mode.into());
    CommissionSplit {
        commission,
        net: amount.value() - commission,
    }
}
