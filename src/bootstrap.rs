//! Wiring of storage backends and services into a ready `PaymentOrchestrator`.

use crate::application::device_directory::DeviceDirectory;
use crate::application::fraud_gate::{FraudGate, FraudGateConfig};
use crate::application::ledger::{LedgerConfig, LedgerTransactor};
use crate::application::orchestrator::PaymentOrchestrator;
use crate::config::Settings;
use crate::domain::ports::{
    AccountStoreRef, DeviceStoreRef, FraudAlertStoreRef, LedgerStoreRef, NotificationSinkRef,
    PinVerifierRef, RouteStoreRef,
};
use crate::infrastructure::in_memory::{InMemoryDirectory, InMemoryFraudAlertStore, InMemoryLedger};
use std::sync::Arc;

/// One handle per port, all pointing at the same storage.
#[derive(Clone)]
pub struct Backend {
    pub accounts: AccountStoreRef,
    pub ledger: LedgerStoreRef,
    pub devices: DeviceStoreRef,
    pub routes: RouteStoreRef,
    pub alerts: FraudAlertStoreRef,
}

impl Backend {
    pub fn in_memory() -> Self {
        let ledger = InMemoryLedger::new();
        let directory = InMemoryDirectory::new();
        Self {
            accounts: Arc::new(ledger.clone()),
            ledger: Arc::new(ledger),
            devices: Arc::new(directory.clone()),
            routes: Arc::new(directory),
            alerts: Arc::new(InMemoryFraudAlertStore::new()),
        }
    }

    #[cfg(feature = "storage-rocksdb")]
    pub fn rocksdb<P: AsRef<std::path::Path>>(
        path: P,
    ) -> Result<Self, crate::error::StoreError> {
        let store = crate::infrastructure::rocksdb::RocksDBStore::open(path)?;
        Ok(Self {
            accounts: Arc::new(store.clone()),
            ledger: Arc::new(store.clone()),
            devices: Arc::new(store.clone()),
            routes: Arc::new(store.clone()),
            alerts: Arc::new(store),
        })
    }
}

pub fn build_orchestrator(
    settings: &Settings,
    backend: &Backend,
    pins: PinVerifierRef,
    notifications: NotificationSinkRef,
) -> PaymentOrchestrator {
    let timeout = settings.store_timeout();
    let directory = DeviceDirectory::new(backend.devices.clone(), timeout);
    let gate = FraudGate::new(
        FraudGateConfig::from(settings),
        backend.alerts.clone(),
        timeout,
    );
    let ledger = LedgerTransactor::new(
        backend.accounts.clone(),
        backend.ledger.clone(),
        pins,
        notifications,
        LedgerConfig::from(settings),
    );
    PaymentOrchestrator::new(settings, directory, backend.routes.clone(), gate, ledger)
}
