use super::geo::Coordinates;
use super::money::Balance;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    FarePayment,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Success,
    Failed,
}

/// How the boarding stop was chosen.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum OriginProvenance {
    /// Detected from the vehicle's GPS fix.
    GpsAuto,
    /// Picked by the payer in the app.
    UserSelected,
}

/// Trip details recorded on a payment for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TripMeta {
    pub origin_stop: Option<String>,
    pub destination_stop: Option<String>,
    pub provenance: Option<OriginProvenance>,
    pub gps_boarding_coordinates: Option<Coordinates>,
    pub nearest_stop_distance_meters: Option<u32>,
}

/// A committed fare payment. Never mutated after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: Uuid,
    pub user_id: String,
    pub merchant_id: String,
    pub device_id: String,
    pub r#type: TransactionType,
    pub amount: Decimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub commission: Decimal,
    pub net_amount: Decimal,
    /// Client-supplied idempotency key, unique across all transactions.
    pub reference_code: String,
    pub trip: TripMeta,
    pub balance_before: Balance,
    pub balance_after: Balance,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_transaction_json_shape() {
        let tx = Transaction {
            transaction_id: Uuid::nil(),
            user_id: "u1".into(),
            merchant_id: "m1".into(),
            device_id: "d1".into(),
            r#type: TransactionType::FarePayment,
            amount: dec!(50),
            currency: "KES".into(),
            status: TransactionStatus::Success,
            commission: dec!(2.50),
            net_amount: dec!(47.50),
            reference_code: "R1".into(),
            trip: TripMeta {
                provenance: Some(OriginProvenance::UserSelected),
                ..Default::default()
            },
            balance_before: Balance::new(dec!(1000)),
            balance_after: Balance::new(dec!(950)),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "fare_payment");
        assert_eq!(json["status"], "success");
        assert_eq!(json["trip"]["provenance"], "user_selected");

        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, tx);
    }
}
