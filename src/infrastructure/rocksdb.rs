use crate::domain::account::Account;
use crate::domain::device::{Merchant, MerchantDevice};
use crate::domain::fraud::FraudAlert;
use crate::domain::ports::{AccountStore, DeviceStore, FraudAlertStore, LedgerStore, RouteStore};
use crate::domain::route::{FareRule, Route};
use crate::domain::transaction::Transaction;
use crate::error::StoreError;
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const CF_ACCOUNTS: &str = "accounts";
/// Transactions keyed by reference code.
pub const CF_TRANSACTIONS: &str = "transactions";
pub const CF_MERCHANTS: &str = "merchants";
/// Devices keyed by device token.
pub const CF_DEVICES: &str = "devices";
pub const CF_ROUTES: &str = "routes";
/// Fare rules keyed by `route \0 origin \0 destination \0 valid_from`.
pub const CF_FARE_RULES: &str = "fare_rules";
/// Fraud alerts keyed by `user \0 alert_id`.
pub const CF_FRAUD_ALERTS: &str = "fraud_alerts";

const COLUMN_FAMILIES: [&str; 7] = [
    CF_ACCOUNTS,
    CF_TRANSACTIONS,
    CF_MERCHANTS,
    CF_DEVICES,
    CF_ROUTES,
    CF_FARE_RULES,
    CF_FRAUD_ALERTS,
];

/// A persistent store implementation using RocksDB, one column family per
/// entity.
///
/// Writes that must check-then-write (account insert, ledger commit) are
/// serialized by `write_lock`; the ledger commit lands as a single
/// `WriteBatch`, so the transaction row and the balance change are
/// persisted together or not at all.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

fn key(parts: &[&str]) -> Vec<u8> {
    parts.join("\0").into_bytes()
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at `path`, creating any missing
    /// column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StoreError> {
        self.db.cf_handle(name).ok_or_else(|| {
            StoreError::Backend(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>, StoreError> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, cf: &str, key: &[u8], value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(self.cf(cf)?, key, bytes)?;
        Ok(())
    }

    fn scan_prefix<T: DeserializeOwned>(&self, cf: &str, prefix: &[u8]) -> Result<Vec<T>, StoreError> {
        let iter = self
            .db
            .iterator_cf(self.cf(cf)?, IteratorMode::From(prefix, Direction::Forward));
        let mut values = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }
}

#[async_trait]
impl AccountStore for RocksDBStore {
    async fn get(&self, user_id: &str) -> Result<Option<Account>, StoreError> {
        self.get_json(CF_ACCOUNTS, user_id.as_bytes())
    }

    async fn insert(&self, account: Account) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        if self.db.get_pinned_cf(self.cf(CF_ACCOUNTS)?, account.user_id.as_bytes())?.is_some() {
            return Err(StoreError::DuplicateKey(account.user_id));
        }
        self.put_json(CF_ACCOUNTS, account.user_id.as_bytes(), &account)
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn find_by_reference(&self, reference_code: &str) -> Result<Option<Transaction>, StoreError> {
        self.get_json(CF_TRANSACTIONS, reference_code.as_bytes())
    }

    async fn commit(&self, tx: &Transaction) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let transactions = self.cf(CF_TRANSACTIONS)?;
        if self.db.get_pinned_cf(transactions, tx.reference_code.as_bytes())?.is_some() {
            return Err(StoreError::DuplicateKey(tx.reference_code.clone()));
        }

        let mut account: Account = self
            .get_json(CF_ACCOUNTS, tx.user_id.as_bytes())?
            .ok_or_else(|| StoreError::NotFound(tx.user_id.clone()))?;
        if account.balance != tx.balance_before {
            return Err(StoreError::PredicateFailed(format!(
                "balance of {} is {}, expected {}",
                tx.user_id, account.balance.0, tx.balance_before.0
            )));
        }
        account.balance = tx.balance_after;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_ACCOUNTS)?,
            account.user_id.as_bytes(),
            serde_json::to_vec(&account)?,
        );
        batch.put_cf(transactions, tx.reference_code.as_bytes(), serde_json::to_vec(tx)?);
        self.db.write(batch)?;
        Ok(())
    }

    async fn transactions_for_user(&self, user_id: &str) -> Result<Vec<Transaction>, StoreError> {
        let iter = self.db.iterator_cf(self.cf(CF_TRANSACTIONS)?, IteratorMode::Start);
        let mut txs = Vec::new();
        for item in iter {
            let (_key, value) = item?;
            let tx: Transaction = serde_json::from_slice(&value)?;
            if tx.user_id == user_id {
                txs.push(tx);
            }
        }
        txs.sort_by_key(|tx| tx.created_at);
        Ok(txs)
    }
}

#[async_trait]
impl DeviceStore for RocksDBStore {
    async fn device_by_token(&self, device_token: &str) -> Result<Option<MerchantDevice>, StoreError> {
        self.get_json(CF_DEVICES, device_token.as_bytes())
    }

    async fn merchant(&self, merchant_id: &str) -> Result<Option<Merchant>, StoreError> {
        self.get_json(CF_MERCHANTS, merchant_id.as_bytes())
    }

    async fn put_device(&self, device: MerchantDevice) -> Result<(), StoreError> {
        self.put_json(CF_DEVICES, device.device_token.as_bytes(), &device)
    }

    async fn put_merchant(&self, merchant: Merchant) -> Result<(), StoreError> {
        self.put_json(CF_MERCHANTS, merchant.merchant_id.as_bytes(), &merchant)
    }
}

#[async_trait]
impl RouteStore for RocksDBStore {
    async fn route(&self, route_id: &str) -> Result<Option<Route>, StoreError> {
        self.get_json(CF_ROUTES, route_id.as_bytes())
    }

    async fn fare_rules(&self, route_id: &str, origin_stop_id: &str) -> Result<Vec<FareRule>, StoreError> {
        let mut prefix = key(&[route_id, origin_stop_id]);
        prefix.push(0);
        self.scan_prefix(CF_FARE_RULES, &prefix)
    }

    async fn put_route(&self, route: Route) -> Result<(), StoreError> {
        self.put_json(CF_ROUTES, route.route_id.as_bytes(), &route)
    }

    async fn add_fare_rule(&self, rule: FareRule) -> Result<(), StoreError> {
        let valid_from = rule.valid_from.to_rfc3339();
        let key = key(&[
            rule.route_id.as_str(),
            rule.origin_stop_id.as_str(),
            rule.destination_stop_id.as_str(),
            valid_from.as_str(),
        ]);
        self.put_json(CF_FARE_RULES, &key, &rule)
    }
}

#[async_trait]
impl FraudAlertStore for RocksDBStore {
    async fn append(&self, alert: FraudAlert) -> Result<(), StoreError> {
        let alert_id = alert.alert_id.to_string();
        self.put_json(CF_FRAUD_ALERTS, &key(&[alert.user_id.as_str(), alert_id.as_str()]), &alert)
    }

    async fn alerts_for_user(&self, user_id: &str) -> Result<Vec<FraudAlert>, StoreError> {
        let mut prefix = key(&[user_id]);
        prefix.push(0);
        let mut alerts: Vec<FraudAlert> = self.scan_prefix(CF_FRAUD_ALERTS, &prefix)?;
        alerts.sort_by_key(|a| a.created_at);
        Ok(alerts)
    }
}
