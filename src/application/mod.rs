//! Application layer: the payment pipeline built on top of the domain ports.
//!
//! `PaymentOrchestrator` is the entry point. It resolves the scanned device,
//! runs the GPS fraud gate and hands the debit to the `LedgerTransactor`.

pub mod device_directory;
pub mod fraud_gate;
pub mod ledger;
pub mod orchestrator;
pub mod stop_resolver;

use crate::error::{PaymentError, Result, StoreError};
use std::future::Future;
use std::time::Duration;

/// Runs a store call under `timeout`. An elapsed timeout means the outcome
/// is unknown, so it surfaces as a server error rather than a failure.
pub(crate) async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, StoreError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.map_err(PaymentError::from),
        Err(_) => Err(PaymentError::Timeout(timeout.as_millis() as u64)),
    }
}
