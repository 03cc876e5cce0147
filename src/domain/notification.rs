use super::transaction::Transaction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Recipient {
    User(String),
    Merchant(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    FarePaid,
    FareReceived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: Recipient,
    pub kind: NotificationKind,
    pub transaction_id: Uuid,
    pub reference_code: String,
    pub amount: Decimal,
    pub currency: String,
}

impl Notification {
    /// The payer and merchant notices for a committed payment.
    pub fn for_payment(tx: &Transaction) -> [Notification; 2] {
        let make = |recipient, kind, amount| Notification {
            recipient,
            kind,
            transaction_id: tx.transaction_id,
            reference_code: tx.reference_code.clone(),
            amount,
            currency: tx.currency.clone(),
        };
        [
            make(Recipient::User(tx.user_id.clone()), NotificationKind::FarePaid, tx.amount),
            make(
                Recipient::Merchant(tx.merchant_id.clone()),
                NotificationKind::FareReceived,
                tx.net_amount,
            ),
        ]
    }
}
