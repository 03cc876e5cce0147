use super::bounded;
use crate::domain::device::{DeviceRecord, DeviceStatus, Merchant, MerchantStatus};
use crate::domain::ports::DeviceStoreRef;
use crate::error::{PaymentError, Result};
use std::time::Duration;

/// Read-only lookup from a scanned device token to its device and merchant.
#[derive(Clone)]
pub struct DeviceDirectory {
    store: DeviceStoreRef,
    timeout: Duration,
}

impl DeviceDirectory {
    pub fn new(store: DeviceStoreRef, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Fails with `InvalidDevice` unless both the device and its merchant
    /// are active. GPS freshness is left to the caller.
    pub async fn resolve(&self, device_token: &str) -> Result<DeviceRecord> {
        let device = bounded(self.timeout, self.store.device_by_token(device_token))
            .await?
            .filter(|d| d.status == DeviceStatus::Active)
            .ok_or(PaymentError::InvalidDevice)?;

        let merchant = bounded(self.timeout, self.store.merchant(&device.merchant_id))
            .await?
            .filter(|m| m.status == MerchantStatus::Active)
            .ok_or(PaymentError::InvalidDevice)?;

        Ok(DeviceRecord { device, merchant })
    }

    /// Looks up a merchant regardless of status, for historical records.
    pub async fn merchant(&self, merchant_id: &str) -> Result<Option<Merchant>> {
        bounded(self.timeout, self.store.merchant(merchant_id)).await
    }
}
