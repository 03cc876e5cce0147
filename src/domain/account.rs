use super::money::{Amount, Balance};
use crate::error::PaymentError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
    Closed,
}

/// A user's prepaid wallet.
///
/// The balance only ever changes through a committed fare payment, and a
/// payment never takes it below zero.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    pub user_id: String,
    pub balance: Balance,
    pub currency: String,
    /// PHC-formatted PIN hash, opaque to everything except the PIN verifier.
    pub pin_hash: String,
    pub status: AccountStatus,
}

impl Account {
    pub fn new(user_id: impl Into<String>, currency: impl Into<String>, pin_hash: String) -> Self {
        Self {
            user_id: user_id.into(),
            balance: Balance::ZERO,
            currency: currency.into(),
            pin_hash,
            status: AccountStatus::Active,
        }
    }

    pub fn ensure_active(&self) -> Result<(), PaymentError> {
        match self.status {
            AccountStatus::Active => Ok(()),
            AccountStatus::Suspended | AccountStatus::Closed => Err(PaymentError::AccountSuspended),
        }
    }

    /// Balance that would remain after paying `amount`.
    pub fn balance_after(&self, amount: Amount) -> Result<Balance, PaymentError> {
        if self.balance.covers(amount) {
            Ok(self.balance - amount.into())
        } else {
            Err(PaymentError::InsufficientBalance {
                available: self.balance.0,
                requested: amount.value(),
            })
        }
    }
}
