use super::geo::Coordinates;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SUSPICIOUS_ORIGIN_RISK_SCORE: u8 = 75;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    SuspiciousOrigin,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Low,
    Medium,
    High,
}

/// Snapshot of the GPS mismatch that triggered an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginMismatchDetails {
    pub claimed_stop_id: String,
    pub claimed_stop_name: String,
    pub claimed_position: Coordinates,
    pub fix: Coordinates,
    pub distance_meters: u32,
    pub max_distance_meters: u32,
}

/// Append-only audit record. `transaction_id` stays empty when the alert
/// blocked the payment before any transaction existed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudAlert {
    pub alert_id: Uuid,
    pub user_id: String,
    pub transaction_id: Option<Uuid>,
    pub alert_type: AlertType,
    pub risk_score: u8,
    pub alert_level: AlertLevel,
    pub details: OriginMismatchDetails,
    pub created_at: DateTime<Utc>,
}

impl FraudAlert {
    pub fn suspicious_origin(user_id: impl Into<String>, details: OriginMismatchDetails) -> Self {
        Self {
            alert_id: Uuid::new_v4(),
            user_id: user_id.into(),
            transaction_id: None,
            alert_type: AlertType::SuspiciousOrigin,
            risk_score: SUSPICIOUS_ORIGIN_RISK_SCORE,
            alert_level: AlertLevel::High,
            details,
            created_at: Utc::now(),
        }
    }
}
