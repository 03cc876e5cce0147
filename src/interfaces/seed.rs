//! JSON fixture loader used by the CLI to populate a backend.

use crate::bootstrap::Backend;
use crate::domain::account::{Account, AccountStatus};
use crate::domain::device::{DeviceGps, DeviceStatus, Merchant, MerchantDevice};
use crate::domain::geo::Coordinates;
use crate::domain::money::Balance;
use crate::domain::route::{FareRule, Route};
use crate::error::{PaymentError, StoreError};
use crate::infrastructure::argon2_pin::Argon2PinVerifier;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("cannot read seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed seed file: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Payment(#[from] PaymentError),
}

impl From<StoreError> for SeedError {
    fn from(err: StoreError) -> Self {
        SeedError::Payment(PaymentError::Store(err))
    }
}

fn default_status() -> AccountStatus {
    AccountStatus::Active
}

#[derive(Debug, Deserialize)]
pub struct SeedAccount {
    pub user_id: String,
    pub balance: Decimal,
    pub currency: String,
    /// Plaintext; hashed before it reaches the store.
    pub pin: String,
    #[serde(default = "default_status")]
    pub status: AccountStatus,
}

/// A device position given relative to load time.
#[derive(Debug, Deserialize)]
pub struct SeedGps {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub age_secs: i64,
    #[serde(default = "enabled")]
    pub enabled: bool,
}

fn enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct SeedDevice {
    pub device_id: String,
    pub device_token: String,
    pub merchant_id: String,
    #[serde(default)]
    pub route_id: Option<String>,
    pub status: DeviceStatus,
    #[serde(default)]
    pub gps: Option<SeedGps>,
}

impl SeedDevice {
    fn into_device(self, now: DateTime<Utc>) -> Result<MerchantDevice, PaymentError> {
        let last_known_gps = self
            .gps
            .map(|gps| -> Result<DeviceGps, PaymentError> {
                Ok(DeviceGps {
                    position: Coordinates::new(gps.lat, gps.lon)?,
                    updated_at: now - Duration::seconds(gps.age_secs),
                    enabled: gps.enabled,
                })
            })
            .transpose()?;
        Ok(MerchantDevice {
            device_id: self.device_id,
            device_token: self.device_token,
            merchant_id: self.merchant_id,
            route_id: self.route_id,
            status: self.status,
            last_known_gps,
        })
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Seed {
    pub accounts: Vec<SeedAccount>,
    pub merchants: Vec<Merchant>,
    pub devices: Vec<SeedDevice>,
    pub routes: Vec<Route>,
    pub fare_rules: Vec<FareRule>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub accounts_created: usize,
    pub accounts_skipped: usize,
    pub devices: usize,
    pub routes: usize,
}

impl Seed {
    pub fn from_path(path: &Path) -> Result<Self, SeedError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Writes the fixture into `backend`.
    ///
    /// Accounts that already exist are left untouched so a persistent
    /// backend keeps its balances across runs. Everything else is upserted.
    pub async fn apply(
        self,
        backend: &Backend,
        pins: &Argon2PinVerifier,
        now: DateTime<Utc>,
    ) -> Result<SeedSummary, SeedError> {
        let mut summary = SeedSummary::default();

        for seed in self.accounts {
            if backend.accounts.get(&seed.user_id).await?.is_some() {
                debug!(user_id = %seed.user_id, "account exists, keeping stored state");
                summary.accounts_skipped += 1;
                continue;
            }
            if seed.balance < Decimal::ZERO {
                return Err(PaymentError::InvalidAmount(format!(
                    "seed balance for {} is negative: {}",
                    seed.user_id, seed.balance
                ))
                .into());
            }
            let mut account = Account::new(seed.user_id, seed.currency, pins.hash_pin(&seed.pin)?);
            account.balance = Balance(seed.balance);
            account.status = seed.status;
            match backend.accounts.insert(account).await {
                Ok(()) => summary.accounts_created += 1,
                Err(StoreError::DuplicateKey(_)) => summary.accounts_skipped += 1,
                Err(e) => return Err(e.into()),
            }
        }

        for merchant in self.merchants {
            backend.devices.put_merchant(merchant).await?;
        }
        for device in self.devices {
            backend.devices.put_device(device.into_device(now)?).await?;
            summary.devices += 1;
        }
        for route in self.routes {
            backend.routes.put_route(route).await?;
            summary.routes += 1;
        }
        for rule in self.fare_rules {
            backend.routes.add_fare_rule(rule).await?;
        }

        info!(
            accounts_created = summary.accounts_created,
            accounts_skipped = summary.accounts_skipped,
            devices = summary.devices,
            routes = summary.routes,
            "seed loaded"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::PinVerifier;
    use rust_decimal_macros::dec;

    const SEED: &str = r#"{
        "accounts": [
            {"user_id": "u1", "balance": "1000.00", "currency": "KES", "pin": "1234"}
        ],
        "merchants": [
            {"merchant_id": "m1", "name": "City Hoppa", "commission_rate": "0.05", "status": "active"}
        ],
        "devices": [
            {"device_id": "d1", "device_token": "tok-1", "merchant_id": "m1",
             "route_id": "r1", "status": "active",
             "gps": {"lat": -1.2864, "lon": 36.8172, "age_secs": 30}}
        ],
        "routes": [
            {"route_id": "r1", "name": "CBD - Westlands", "stops": [
                {"id": "s1", "name": "Kencom", "position": {"lat": -1.2864, "lon": 36.8172}},
                {"id": "s2", "name": "Museum Hill"}
            ]}
        ],
        "fare_rules": [
            {"route_id": "r1", "origin_stop_id": "s1", "destination_stop_id": "s2",
             "fare_amount": "50", "valid_from": "2020-01-01T00:00:00Z"}
        ]
    }"#;

    #[tokio::test]
    async fn test_apply_populates_backend() {
        let backend = Backend::in_memory();
        let pins = Argon2PinVerifier::new();
        let now = Utc::now();
        let seed: Seed = serde_json::from_str(SEED).unwrap();

        let summary = seed.apply(&backend, &pins, now).await.unwrap();
        assert_eq!(summary.accounts_created, 1);
        assert_eq!(summary.devices, 1);

        let account = backend.accounts.get("u1").await.unwrap().unwrap();
        assert_eq!(account.balance, Balance(dec!(1000)));
        assert_ne!(account.pin_hash, "1234");
        assert!(pins.verify("1234", &account.pin_hash));

        let device = backend.devices.device_by_token("tok-1").await.unwrap().unwrap();
        let gps = device.last_known_gps.unwrap();
        assert_eq!(gps.age_secs(now), 30);
        assert!(gps.enabled);

        let rules = backend.routes.fare_rules("r1", "s1").await.unwrap();
        assert_eq!(rules.len(), 1);
    }

    #[tokio::test]
    async fn test_existing_accounts_are_kept() {
        let backend = Backend::in_memory();
        let pins = Argon2PinVerifier::new();
        let mut existing = Account::new("u1", "KES", pins.hash_pin("9999").unwrap());
        existing.balance = Balance(dec!(12));
        backend.accounts.insert(existing).await.unwrap();

        let seed: Seed = serde_json::from_str(SEED).unwrap();
        let summary = seed.apply(&backend, &pins, Utc::now()).await.unwrap();
        assert_eq!(summary.accounts_skipped, 1);

        let account = backend.accounts.get("u1").await.unwrap().unwrap();
        assert_eq!(account.balance, Balance(dec!(12)));
        assert!(pins.verify("9999", &account.pin_hash));
    }

    #[tokio::test]
    async fn test_rejects_negative_balance() {
        let backend = Backend::in_memory();
        let raw = r#"{"accounts": [
            {"user_id": "u9", "balance": "-5.00", "currency": "KES", "pin": "1234"}
        ]}"#;
        let seed: Seed = serde_json::from_str(raw).unwrap();

        let err = seed
            .apply(&backend, &Argon2PinVerifier::new(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, SeedError::Payment(PaymentError::InvalidAmount(_))));
        assert!(backend.accounts.get("u9").await.unwrap().is_none());
    }

    #[test]
    fn test_rejects_bad_commission_rate() {
        let raw = r#"{"merchants": [{"merchant_id": "m1", "name": "x", "commission_rate": "1.5", "status": "active"}]}"#;
        assert!(serde_json::from_str::<Seed>(raw).is_err());
    }
}
