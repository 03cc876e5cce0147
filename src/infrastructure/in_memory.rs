use crate::domain::account::Account;
use crate::domain::device::{Merchant, MerchantDevice};
use crate::domain::fraud::FraudAlert;
use crate::domain::notification::Notification;
use crate::domain::ports::{
    AccountStore, DeviceStore, FraudAlertStore, LedgerStore, NotificationSink, RouteStore,
};
use crate::domain::route::{FareRule, Route};
use crate::domain::transaction::Transaction;
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<String, Account>,
    /// Keyed by reference code.
    transactions: HashMap<String, Transaction>,
}

/// Accounts and transactions behind one lock, so a commit sees and changes
/// both as a unit.
///
/// Ideal for testing or single-process use where persistence is not
/// required.
#[derive(Default, Clone)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryLedger {
    async fn get(&self, user_id: &str) -> Result<Option<Account>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.accounts.get(user_id).cloned())
    }

    async fn insert(&self, account: Account) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.accounts.contains_key(&account.user_id) {
            return Err(StoreError::DuplicateKey(account.user_id));
        }
        state.accounts.insert(account.user_id.clone(), account);
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn find_by_reference(&self, reference_code: &str) -> Result<Option<Transaction>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.transactions.get(reference_code).cloned())
    }

    async fn commit(&self, tx: &Transaction) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.transactions.contains_key(&tx.reference_code) {
            return Err(StoreError::DuplicateKey(tx.reference_code.clone()));
        }
        let account = state
            .accounts
            .get_mut(&tx.user_id)
            .ok_or_else(|| StoreError::NotFound(tx.user_id.clone()))?;
        if account.balance != tx.balance_before {
            return Err(StoreError::PredicateFailed(format!(
                "balance of {} is {}, expected {}",
                tx.user_id, account.balance.0, tx.balance_before.0
            )));
        }
        account.balance = tx.balance_after;
        state
            .transactions
            .insert(tx.reference_code.clone(), tx.clone());
        Ok(())
    }

    async fn transactions_for_user(&self, user_id: &str) -> Result<Vec<Transaction>, StoreError> {
        let state = self.state.lock().await;
        let mut txs: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|tx| tx.user_id == user_id)
            .cloned()
            .collect();
        txs.sort_by_key(|tx| tx.created_at);
        Ok(txs)
    }
}

/// Devices, merchants, routes and fare rules.
#[derive(Default, Clone)]
pub struct InMemoryDirectory {
    devices: Arc<RwLock<HashMap<String, MerchantDevice>>>,
    merchants: Arc<RwLock<HashMap<String, Merchant>>>,
    routes: Arc<RwLock<HashMap<String, Route>>>,
    fare_rules: Arc<RwLock<Vec<FareRule>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceStore for InMemoryDirectory {
    async fn device_by_token(&self, device_token: &str) -> Result<Option<MerchantDevice>, StoreError> {
        let devices = self.devices.read().await;
        Ok(devices.get(device_token).cloned())
    }

    async fn merchant(&self, merchant_id: &str) -> Result<Option<Merchant>, StoreError> {
        let merchants = self.merchants.read().await;
        Ok(merchants.get(merchant_id).cloned())
    }

    async fn put_device(&self, device: MerchantDevice) -> Result<(), StoreError> {
        let mut devices = self.devices.write().await;
        devices.insert(device.device_token.clone(), device);
        Ok(())
    }

    async fn put_merchant(&self, merchant: Merchant) -> Result<(), StoreError> {
        let mut merchants = self.merchants.write().await;
        merchants.insert(merchant.merchant_id.clone(), merchant);
        Ok(())
    }
}

#[async_trait]
impl RouteStore for InMemoryDirectory {
    async fn route(&self, route_id: &str) -> Result<Option<Route>, StoreError> {
        let routes = self.routes.read().await;
        Ok(routes.get(route_id).cloned())
    }

    async fn fare_rules(&self, route_id: &str, origin_stop_id: &str) -> Result<Vec<FareRule>, StoreError> {
        let rules = self.fare_rules.read().await;
        Ok(rules
            .iter()
            .filter(|r| r.route_id == route_id && r.origin_stop_id == origin_stop_id)
            .cloned()
            .collect())
    }

    async fn put_route(&self, route: Route) -> Result<(), StoreError> {
        let mut routes = self.routes.write().await;
        routes.insert(route.route_id.clone(), route);
        Ok(())
    }

    async fn add_fare_rule(&self, rule: FareRule) -> Result<(), StoreError> {
        let mut rules = self.fare_rules.write().await;
        rules.push(rule);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryFraudAlertStore {
    alerts: Arc<RwLock<Vec<FraudAlert>>>,
}

impl InMemoryFraudAlertStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FraudAlertStore for InMemoryFraudAlertStore {
    async fn append(&self, alert: FraudAlert) -> Result<(), StoreError> {
        let mut alerts = self.alerts.write().await;
        alerts.push(alert);
        Ok(())
    }

    async fn alerts_for_user(&self, user_id: &str) -> Result<Vec<FraudAlert>, StoreError> {
        let alerts = self.alerts.read().await;
        Ok(alerts.iter().filter(|a| a.user_id == user_id).cloned().collect())
    }
}

/// Collects notifications so tests can inspect what would have been sent.
#[derive(Default, Clone)]
pub struct InMemoryNotificationSink {
    sent: Arc<RwLock<Vec<Notification>>>,
}

impl InMemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn enqueue(&self, notification: Notification) -> crate::error::Result<()> {
        self.sent.write().await.push(notification);
        Ok(())
    }
}
