use super::account::Account;
use super::device::{Merchant, MerchantDevice};
use super::fraud::FraudAlert;
use super::notification::Notification;
use super::route::{FareRule, Route};
use super::transaction::Transaction;
use crate::error::StoreError;
use async_trait::async_trait;
use std::sync::Arc;

type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, user_id: &str) -> StoreResult<Option<Account>>;
    /// Fails with `DuplicateKey` when the user already has an account.
    async fn insert(&self, account: Account) -> StoreResult<()>;
}

/// Transaction history plus the atomic debit that creates it.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_by_reference(&self, reference_code: &str) -> StoreResult<Option<Transaction>>;

    /// Persists `tx` and moves the payer's balance from `tx.balance_before`
    /// to `tx.balance_after` as one all-or-nothing unit.
    ///
    /// Fails with `DuplicateKey` when `tx.reference_code` is already taken,
    /// `PredicateFailed` when the stored balance no longer equals
    /// `tx.balance_before`, and `NotFound` when the account is gone. Nothing
    /// is written in any of these cases.
    async fn commit(&self, tx: &Transaction) -> StoreResult<()>;

    async fn transactions_for_user(&self, user_id: &str) -> StoreResult<Vec<Transaction>>;
}

#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn device_by_token(&self, device_token: &str) -> StoreResult<Option<MerchantDevice>>;
    async fn merchant(&self, merchant_id: &str) -> StoreResult<Option<Merchant>>;
    async fn put_device(&self, device: MerchantDevice) -> StoreResult<()>;
    async fn put_merchant(&self, merchant: Merchant) -> StoreResult<()>;
}

#[async_trait]
pub trait RouteStore: Send + Sync {
    async fn route(&self, route_id: &str) -> StoreResult<Option<Route>>;
    /// Every rule ever recorded for trips starting at `origin_stop_id`,
    /// expired ones included.
    async fn fare_rules(&self, route_id: &str, origin_stop_id: &str) -> StoreResult<Vec<FareRule>>;
    async fn put_route(&self, route: Route) -> StoreResult<()>;
    async fn add_fare_rule(&self, rule: FareRule) -> StoreResult<()>;
}

#[async_trait]
pub trait FraudAlertStore: Send + Sync {
    async fn append(&self, alert: FraudAlert) -> StoreResult<()>;
    async fn alerts_for_user(&self, user_id: &str) -> StoreResult<Vec<FraudAlert>>;
}

/// One-way PIN check. Implementations must compare in constant time.
pub trait PinVerifier: Send + Sync {
    fn verify(&self, pin: &str, pin_hash: &str) -> bool;
}

/// Fire-and-forget delivery of user and merchant notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn enqueue(&self, notification: Notification) -> crate::error::Result<()>;
}

pub type AccountStoreRef = Arc<dyn AccountStore>;
pub type LedgerStoreRef = Arc<dyn LedgerStore>;
pub type DeviceStoreRef = Arc<dyn DeviceStore>;
pub type RouteStoreRef = Arc<dyn RouteStore>;
pub type FraudAlertStoreRef = Arc<dyn FraudAlertStore>;
pub type PinVerifierRef = Arc<dyn PinVerifier>;
pub type NotificationSinkRef = Arc<dyn NotificationSink>;
