use super::bounded;
use crate::config::Settings;
use crate::domain::device::Merchant;
use crate::domain::money::{Amount, RoundingMode, split_commission};
use crate::domain::notification::Notification;
use crate::domain::ports::{AccountStoreRef, LedgerStoreRef, NotificationSinkRef, PinVerifierRef};
use crate::domain::transaction::{Transaction, TransactionStatus, TransactionType, TripMeta};
use crate::error::{PaymentError, Result, StoreError};
use crate::telemetry::AUDIT_TARGET;
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    /// Accounts held in any other currency cannot be charged.
    pub currency: String,
    pub currency_minor_units: u32,
    pub rounding: RoundingMode,
    pub commit_max_attempts: u32,
    pub store_timeout: Duration,
}

impl From<&Settings> for LedgerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            currency: settings.currency.clone(),
            currency_minor_units: settings.currency_minor_units,
            rounding: settings.commission_rounding,
            commit_max_attempts: settings.commit_max_attempts,
            store_timeout: settings.store_timeout(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub user_id: String,
    pub merchant: Merchant,
    pub device_id: String,
    pub amount: Amount,
    pub pin: String,
    /// Idempotency key. Retries of one logical payment must reuse it.
    pub reference_code: String,
    pub trip: TripMeta,
}

/// Debits a prepaid account exactly once per reference code.
///
/// Each charge runs: idempotency lookup, amount precision check, account
/// status and currency, PIN, balance, commission split, then a single atomic commit of
/// the transaction row together with the balance change. Notifications and
/// the audit entry are emitted after the commit and never affect its result.
#[derive(Clone)]
pub struct LedgerTransactor {
    accounts: AccountStoreRef,
    ledger: LedgerStoreRef,
    pins: PinVerifierRef,
    notifications: NotificationSinkRef,
    config: LedgerConfig,
}

impl LedgerTransactor {
    pub fn new(
        accounts: AccountStoreRef,
        ledger: LedgerStoreRef,
        pins: PinVerifierRef,
        notifications: NotificationSinkRef,
        config: LedgerConfig,
    ) -> Self {
        Self {
            accounts,
            ledger,
            pins,
            notifications,
            config,
        }
    }

    /// Looks up an already committed payment for `reference_code`.
    ///
    /// A reference owned by another user is reported as a conflict instead
    /// of leaking that user's transaction.
    pub async fn find_committed(
        &self,
        user_id: &str,
        reference_code: &str,
    ) -> Result<Option<Transaction>> {
        let existing = bounded(
            self.config.store_timeout,
            self.ledger.find_by_reference(reference_code),
        )
        .await?;
        match existing {
            Some(tx) if tx.user_id != user_id => Err(PaymentError::Conflict(format!(
                "reference {reference_code} belongs to another payment"
            ))),
            other => Ok(other),
        }
    }

    pub async fn charge(&self, request: ChargeRequest) -> Result<Transaction> {
        if request.reference_code.trim().is_empty() {
            return Err(PaymentError::InvalidInput(
                "reference code must not be empty".to_string(),
            ));
        }

        if let Some(existing) = self
            .find_committed(&request.user_id, &request.reference_code)
            .await?
        {
            debug!(reference = %request.reference_code, "replaying committed payment");
            return Ok(existing);
        }

        request
            .amount
            .ensure_minor_units(self.config.currency_minor_units)?;

        let mut attempt = 0;
        loop {
            attempt += 1;

            let account = bounded(self.config.store_timeout, self.accounts.get(&request.user_id))
                .await?
                .ok_or_else(|| PaymentError::UserNotFound(request.user_id.clone()))?;
            account.ensure_active()?;
            if account.currency != self.config.currency {
                return Err(PaymentError::InvalidInput(format!(
                    "account currency {} is not {}",
                    account.currency, self.config.currency
                )));
            }

            if attempt == 1 {
                self.verify_pin(&request.pin, &account.pin_hash).await?;
            }

            let balance_after = account.balance_after(request.amount)?;
            let split = split_commission(
                request.amount,
                request.merchant.commission_rate,
                self.config.currency_minor_units,
                self.config.rounding,
            );

            let tx = Transaction {
                transaction_id: Uuid::new_v4(),
                user_id: request.user_id.clone(),
                merchant_id: request.merchant.merchant_id.clone(),
                device_id: request.device_id.clone(),
                r#type: TransactionType::FarePayment,
                amount: request.amount.value(),
                currency: account.currency.clone(),
                status: TransactionStatus::Success,
                commission: split.commission,
                net_amount: split.net,
                reference_code: request.reference_code.clone(),
                trip: request.trip.clone(),
                balance_before: account.balance,
                balance_after,
                created_at: Utc::now(),
            };

            match bounded(self.config.store_timeout, self.ledger.commit(&tx)).await {
                Ok(()) => {
                    self.after_commit(&tx);
                    return Ok(tx);
                }
                Err(PaymentError::Store(StoreError::DuplicateKey(_))) => {
                    // A concurrent request with the same reference won the race.
                    debug!(reference = %tx.reference_code, "reference committed concurrently");
                    return self
                        .find_committed(&request.user_id, &request.reference_code)
                        .await?
                        .ok_or_else(|| {
                            PaymentError::Internal(format!(
                                "reference {} reported duplicate but not found",
                                request.reference_code
                            ))
                        });
                }
                Err(PaymentError::Store(StoreError::PredicateFailed(reason)))
                    if attempt < self.config.commit_max_attempts =>
                {
                    debug!(user_id = %request.user_id, attempt, %reason, "balance changed, retrying");
                    continue;
                }
                Err(PaymentError::Store(StoreError::NotFound(_))) => {
                    return Err(PaymentError::UserNotFound(request.user_id.clone()));
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn verify_pin(&self, pin: &str, pin_hash: &str) -> Result<()> {
        let pins = self.pins.clone();
        let pin = pin.to_owned();
        let pin_hash = pin_hash.to_owned();
        let valid = tokio::task::spawn_blocking(move || pins.verify(&pin, &pin_hash))
            .await
            .map_err(|e| PaymentError::Internal(format!("PIN verification task failed: {e}")))?;
        if valid {
            Ok(())
        } else {
            Err(PaymentError::InvalidPin)
        }
    }

    fn after_commit(&self, tx: &Transaction) {
        info!(
            target: AUDIT_TARGET,
            transaction_id = %tx.transaction_id,
            reference = %tx.reference_code,
            user_id = %tx.user_id,
            merchant_id = %tx.merchant_id,
            device_id = %tx.device_id,
            amount = %tx.amount,
            commission = %tx.commission,
            balance_before = %tx.balance_before.0,
            balance_after = %tx.balance_after.0,
            "fare payment committed"
        );

        let sink = self.notifications.clone();
        let notices = Notification::for_payment(tx);
        tokio::spawn(async move {
            for notice in notices {
                let transaction_id = notice.transaction_id;
                if let Err(e) = sink.enqueue(notice).await {
                    warn!(%transaction_id, error = %e, "failed to enqueue notification");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::{Account, AccountStatus};
    use crate::domain::money::{Balance, CommissionRate};
    use crate::domain::device::MerchantStatus;
    use crate::domain::ports::{AccountStore, LedgerStore, NotificationSink, PinVerifier};
    use crate::infrastructure::in_memory::{InMemoryLedger, InMemoryNotificationSink};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    /// Treats the stored hash as the PIN itself.
    struct PlainPins;

    impl PinVerifier for PlainPins {
        fn verify(&self, pin: &str, pin_hash: &str) -> bool {
            pin == pin_hash
        }
    }

    /// A sink whose queue is always down.
    struct FailingSink;

    #[async_trait]
    impl NotificationSink for FailingSink {
        async fn enqueue(&self, _notification: Notification) -> Result<()> {
            Err(PaymentError::Internal("queue unavailable".into()))
        }
    }

    fn merchant() -> Merchant {
        Merchant {
            merchant_id: "m1".into(),
            name: "Route 46 Matatu".into(),
            commission_rate: CommissionRate::new(dec!(0.05)).unwrap(),
            status: MerchantStatus::Active,
        }
    }

    fn request(amount: rust_decimal::Decimal, reference: &str) -> ChargeRequest {
        ChargeRequest {
            user_id: "u1".into(),
            merchant: merchant(),
            device_id: "d1".into(),
            amount: Amount::new(amount).unwrap(),
            pin: "1234".into(),
            reference_code: reference.into(),
            trip: TripMeta::default(),
        }
    }

    async fn setup(balance: rust_decimal::Decimal) -> (LedgerTransactor, Arc<InMemoryLedger>) {
        let ledger = Arc::new(InMemoryLedger::new());
        let mut account = Account::new("u1", "KES", "1234".to_string());
        account.balance = Balance::new(balance);
        ledger.insert(account).await.unwrap();

        let transactor = LedgerTransactor::new(
            ledger.clone(),
            ledger.clone(),
            Arc::new(PlainPins),
            Arc::new(InMemoryNotificationSink::new()),
            LedgerConfig::from(&Settings::default()),
        );
        (transactor, ledger)
    }

    #[tokio::test]
    async fn test_charge_scenario() {
        let (transactor, ledger) = setup(dec!(1000)).await;
        let tx = transactor.charge(request(dec!(50), "R1")).await.unwrap();

        assert_eq!(tx.status, TransactionStatus::Success);
        assert_eq!(tx.commission, dec!(2.50));
        assert_eq!(tx.net_amount, dec!(47.50));
        assert_eq!(tx.balance_before, Balance::new(dec!(1000)));
        assert_eq!(tx.balance_after, Balance::new(dec!(950.00)));

        let account = ledger.get("u1").await.unwrap().unwrap();
        assert_eq!(account.balance, Balance::new(dec!(950.00)));
        assert_eq!(ledger.transactions_for_user("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_charge_is_idempotent() {
        let (transactor, ledger) = setup(dec!(1000)).await;
        let first = transactor.charge(request(dec!(50), "R1")).await.unwrap();
        let second = transactor.charge(request(dec!(50), "R1")).await.unwrap();

        assert_eq!(first, second);
        let account = ledger.get("u1").await.unwrap().unwrap();
        assert_eq!(account.balance, Balance::new(dec!(950)));
    }

    #[tokio::test]
    async fn test_replay_skips_pin_and_balance_checks() {
        let (transactor, _) = setup(dec!(50)).await;
        let first = transactor.charge(request(dec!(50), "R1")).await.unwrap();

        let mut retry = request(dec!(50), "R1");
        retry.pin = "0000".into();
        assert_eq!(transactor.charge(retry).await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_reference_of_other_user_conflicts() {
        let (transactor, ledger) = setup(dec!(100)).await;
        ledger
            .insert(Account::new("u2", "KES", "9999".to_string()))
            .await
            .unwrap();
        transactor.charge(request(dec!(10), "R1")).await.unwrap();

        let mut other = request(dec!(10), "R1");
        other.user_id = "u2".into();
        other.pin = "9999".into();
        assert!(matches!(
            transactor.charge(other).await,
            Err(PaymentError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_rejections_leave_balance_untouched() {
        let (transactor, ledger) = setup(dec!(100)).await;

        let mut wrong_pin = request(dec!(10), "R1");
        wrong_pin.pin = "9999".into();
        assert!(matches!(
            transactor.charge(wrong_pin).await,
            Err(PaymentError::InvalidPin)
        ));

        assert!(matches!(
            transactor.charge(request(dec!(100.01), "R2")).await,
            Err(PaymentError::InsufficientBalance { .. })
        ));

        assert!(matches!(
            transactor.charge(request(dec!(1.001), "R3")).await,
            Err(PaymentError::InvalidAmount(_))
        ));

        let mut unknown = request(dec!(10), "R4");
        unknown.user_id = "ghost".into();
        assert!(matches!(
            transactor.charge(unknown).await,
            Err(PaymentError::UserNotFound(_))
        ));

        assert!(matches!(
            transactor.charge(request(dec!(10), "  ")).await,
            Err(PaymentError::InvalidInput(_))
        ));

        let account = ledger.get("u1").await.unwrap().unwrap();
        assert_eq!(account.balance, Balance::new(dec!(100)));
        assert!(ledger.transactions_for_user("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_suspended_account_rejected() {
        let ledger = Arc::new(InMemoryLedger::new());
        let mut account = Account::new("u1", "KES", "1234".to_string());
        account.balance = Balance::new(dec!(100));
        account.status = AccountStatus::Suspended;
        ledger.insert(account).await.unwrap();

        let transactor = LedgerTransactor::new(
            ledger.clone(),
            ledger.clone(),
            Arc::new(PlainPins),
            Arc::new(InMemoryNotificationSink::new()),
            LedgerConfig::from(&Settings::default()),
        );
        assert!(matches!(
            transactor.charge(request(dec!(10), "R1")).await,
            Err(PaymentError::AccountSuspended)
        ));
    }

    #[tokio::test]
    async fn test_foreign_currency_account_rejected() {
        let ledger = Arc::new(InMemoryLedger::new());
        let mut account = Account::new("u1", "UGX", "1234".to_string());
        account.balance = Balance::new(dec!(100));
        ledger.insert(account).await.unwrap();

        let transactor = LedgerTransactor::new(
            ledger.clone(),
            ledger.clone(),
            Arc::new(PlainPins),
            Arc::new(InMemoryNotificationSink::new()),
            LedgerConfig::from(&Settings::default()),
        );
        assert!(matches!(
            transactor.charge(request(dec!(10), "R1")).await,
            Err(PaymentError::InvalidInput(_))
        ));

        let account = ledger.get("u1").await.unwrap().unwrap();
        assert_eq!(account.balance, Balance::new(dec!(100)));
        assert!(ledger.transactions_for_user("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_charge() {
        let ledger = Arc::new(InMemoryLedger::new());
        let mut account = Account::new("u1", "KES", "1234".to_string());
        account.balance = Balance::new(dec!(100));
        ledger.insert(account).await.unwrap();

        let transactor = LedgerTransactor::new(
            ledger.clone(),
            ledger.clone(),
            Arc::new(PlainPins),
            Arc::new(FailingSink),
            LedgerConfig::from(&Settings::default()),
        );
        let tx = transactor.charge(request(dec!(40), "R1")).await.unwrap();
        assert_eq!(tx.balance_after, Balance::new(dec!(60)));

        // let the spawned delivery run and fail
        tokio::task::yield_now().await;

        let account = ledger.get("u1").await.unwrap().unwrap();
        assert_eq!(account.balance, Balance::new(dec!(60)));
        assert_eq!(ledger.transactions_for_user("u1").await.unwrap().len(), 1);
    }
}
