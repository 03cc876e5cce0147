use super::geo::Coordinates;
use super::money::CommissionRate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum MerchantStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Merchant {
    pub merchant_id: String,
    pub name: String,
    pub commission_rate: CommissionRate,
    pub status: MerchantStatus,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Active,
    Revoked,
}

/// Last position reported by a vehicle's device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceGps {
    pub position: Coordinates,
    pub updated_at: DateTime<Utc>,
    pub enabled: bool,
}

impl DeviceGps {
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.updated_at).num_seconds()
    }

    /// The position, provided tracking is on and the fix is no older than
    /// `max_age_secs`.
    pub fn fresh_position(&self, now: DateTime<Utc>, max_age_secs: i64) -> Option<Coordinates> {
        (self.enabled && self.age_secs(now) <= max_age_secs).then_some(self.position)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantDevice {
    pub device_id: String,
    /// Opaque capability printed in the device's QR code.
    pub device_token: String,
    pub merchant_id: String,
    #[serde(default)]
    pub route_id: Option<String>,
    pub status: DeviceStatus,
    #[serde(default)]
    pub last_known_gps: Option<DeviceGps>,
}

/// An active device together with its active merchant.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub device: MerchantDevice,
    pub merchant: Merchant,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_fresh_position() {
        let now = Utc::now();
        let mut gps = DeviceGps {
            position: Coordinates::new(-1.28, 36.82).unwrap(),
            updated_at: now - Duration::seconds(600),
            enabled: true,
        };
        assert!(gps.fresh_position(now, 600).is_some());
        assert!(gps.fresh_position(now, 599).is_none());

        gps.enabled = false;
        assert!(gps.fresh_position(now, 600).is_none());
    }
}
