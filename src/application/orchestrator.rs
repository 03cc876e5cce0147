use super::bounded;
use super::device_directory::DeviceDirectory;
use super::fraud_gate::{FraudGate, GateInput, OriginClaim};
use super::ledger::{ChargeRequest, LedgerTransactor};
use super::stop_resolver::{self, Destination, NearestStop};
use crate::config::Settings;
use crate::domain::device::{DeviceRecord, Merchant};
use crate::domain::geo::{Confidence, Coordinates, confidence_level};
use crate::domain::money::{Amount, Balance};
use crate::domain::ports::RouteStoreRef;
use crate::domain::route::{Route, Stop};
use crate::domain::transaction::{OriginProvenance, Transaction, TransactionStatus, TripMeta};
use crate::error::{ErrorKind, PaymentError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// The trip a payer says they are taking.
#[derive(Debug, Clone, PartialEq)]
pub struct TripClaim {
    pub origin_stop_id: String,
    pub destination_stop_id: Option<String>,
    /// Must be stated by the caller; never assumed.
    pub provenance: OriginProvenance,
}

#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub user_id: String,
    pub device_token: String,
    pub amount: Amount,
    pub pin: String,
    pub reference_code: String,
    pub trip: Option<TripClaim>,
    pub payer_fix: Option<Coordinates>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantSummary {
    pub merchant_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OriginSummary {
    pub stop_id: String,
    pub provenance: OriginProvenance,
    pub distance_meters: Option<u32>,
}

/// Result of a processed payment. Replays of the same reference produce an
/// identical receipt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentReceipt {
    pub transaction_id: Uuid,
    pub status: TransactionStatus,
    pub reference_code: String,
    pub amount: Decimal,
    pub commission: Decimal,
    pub net_amount: Decimal,
    pub currency: String,
    pub balance_before: Balance,
    pub balance_after: Balance,
    pub merchant: MerchantSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<OriginSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_stop_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps: Option<Coordinates>,
    pub created_at: DateTime<Utc>,
}

/// Boarding options shown after scanning a vehicle's QR code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripOptions {
    pub route_id: String,
    pub route_name: String,
    pub merchant: MerchantSummary,
    pub origin: NearestStop,
    pub confidence: Confidence,
    pub destinations: Vec<Destination>,
}

/// Composes the device lookup, fraud gate and ledger into the end-to-end
/// payment flow. The first failing step ends the flow and its error is
/// returned as is.
#[derive(Clone)]
pub struct PaymentOrchestrator {
    directory: DeviceDirectory,
    routes: RouteStoreRef,
    gate: FraudGate,
    ledger: LedgerTransactor,
    confidence_threshold_meters: u32,
    max_freshness_secs: i64,
    timeout: Duration,
}

impl PaymentOrchestrator {
    pub fn new(
        settings: &Settings,
        directory: DeviceDirectory,
        routes: RouteStoreRef,
        gate: FraudGate,
        ledger: LedgerTransactor,
    ) -> Self {
        Self {
            directory,
            routes,
            gate,
            ledger,
            confidence_threshold_meters: settings.gps_confidence_threshold_meters,
            max_freshness_secs: settings.gps_max_freshness_secs,
            timeout: settings.store_timeout(),
        }
    }

    #[instrument(skip_all, fields(reference = %request.reference_code, user_id = %request.user_id))]
    pub async fn process_payment(&self, request: PaymentRequest) -> Result<PaymentReceipt> {
        let result = self.run_payment(request).await;
        match &result {
            Ok(receipt) => info!(transaction_id = %receipt.transaction_id, "payment processed"),
            Err(e) if e.kind() == ErrorKind::ServerError => {
                error!(error = %e, "payment failed with a server error")
            }
            Err(e) => info!(code = e.code(), "payment rejected"),
        }
        result
    }

    async fn run_payment(&self, request: PaymentRequest) -> Result<PaymentReceipt> {
        let record = self.directory.resolve(&request.device_token).await?;

        // A retry of a committed payment must not be re-judged against a
        // vehicle that has since moved on.
        if let Some(tx) = self
            .ledger
            .find_committed(&request.user_id, &request.reference_code)
            .await?
        {
            let merchant = self.committed_merchant(&tx, &record).await?;
            return Ok(receipt(&tx, merchant));
        }

        let trip = match &request.trip {
            Some(claim) => Some(self.resolve_trip(&record, claim).await?),
            None => None,
        };

        let gate_input = GateInput {
            user_id: request.user_id.clone(),
            claim: trip.as_ref().map(|(origin, _, provenance)| OriginClaim {
                stop: origin.clone(),
                provenance: *provenance,
            }),
            payer_fix: request.payer_fix,
            vehicle_gps: record.device.last_known_gps,
        };
        let clearance = self.gate.check(&gate_input, Utc::now()).await?;

        let trip_meta = TripMeta {
            origin_stop: trip.as_ref().map(|(origin, _, _)| origin.id.clone()),
            destination_stop: trip
                .as_ref()
                .and_then(|(_, destination, _)| destination.as_ref().map(|d| d.id.clone())),
            provenance: trip.as_ref().map(|(_, _, provenance)| *provenance),
            gps_boarding_coordinates: clearance.fix,
            nearest_stop_distance_meters: clearance.distance_meters,
        };

        let tx = self
            .ledger
            .charge(ChargeRequest {
                user_id: request.user_id,
                merchant: record.merchant.clone(),
                device_id: record.device.device_id.clone(),
                amount: request.amount,
                pin: request.pin,
                reference_code: request.reference_code,
                trip: trip_meta,
            })
            .await?;

        Ok(receipt(&tx, merchant_summary(&record.merchant)))
    }

    /// Looks up the claimed stops on the device's route.
    async fn resolve_trip(
        &self,
        record: &DeviceRecord,
        claim: &TripClaim,
    ) -> Result<(Stop, Option<Stop>, OriginProvenance)> {
        let route = self.device_route(record).await?;
        let find = |stop_id: &str| {
            route
                .stop(stop_id)
                .cloned()
                .ok_or_else(|| PaymentError::StopNotFound {
                    route_id: route.route_id.clone(),
                    stop_id: stop_id.to_string(),
                })
        };

        let origin = find(&claim.origin_stop_id)?;
        let destination = match &claim.destination_stop_id {
            Some(id) => {
                let destination = find(id)?;
                let reachable = stop_resolver::downstream_destinations(&route.stops, &origin.id);
                if !reachable.iter().any(|s| s.id == destination.id) {
                    return Err(PaymentError::InvalidInput(format!(
                        "stop {} is not downstream of {}",
                        destination.id, origin.id
                    )));
                }
                Some(destination)
            }
            None => None,
        };
        Ok((origin, destination, claim.provenance))
    }

    /// The merchant paid by a committed transaction. A retry may arrive
    /// through another merchant's device; the receipt still names the
    /// original payee.
    async fn committed_merchant(
        &self,
        tx: &Transaction,
        record: &DeviceRecord,
    ) -> Result<MerchantSummary> {
        if tx.merchant_id == record.merchant.merchant_id {
            return Ok(merchant_summary(&record.merchant));
        }
        let merchant = self
            .directory
            .merchant(&tx.merchant_id)
            .await?
            .ok_or_else(|| {
                PaymentError::Internal(format!(
                    "merchant {} of transaction {} no longer exists",
                    tx.merchant_id, tx.transaction_id
                ))
            })?;
        Ok(merchant_summary(&merchant))
    }

    async fn device_route(&self, record: &DeviceRecord) -> Result<Route> {
        let route_id = record.device.route_id.as_deref().ok_or_else(|| {
            PaymentError::InvalidInput(format!(
                "device {} is not assigned to a route",
                record.device.device_id
            ))
        })?;
        bounded(self.timeout, self.routes.route(route_id))
            .await?
            .ok_or_else(|| PaymentError::RouteNotFound(route_id.to_string()))
    }

    /// Detects the boarding stop from GPS and lists the priced destinations
    /// reachable from it.
    ///
    /// The payer's own fix is used when given, otherwise the vehicle's fix,
    /// which must be fresh.
    #[instrument(skip(self, payer_fix))]
    pub async fn trip_options(
        &self,
        device_token: &str,
        payer_fix: Option<Coordinates>,
    ) -> Result<TripOptions> {
        let now = Utc::now();
        let record = self.directory.resolve(device_token).await?;
        let route = self.device_route(&record).await?;

        let fix = match payer_fix {
            Some(fix) => fix,
            None => record
                .device
                .last_known_gps
                .and_then(|gps| gps.fresh_position(now, self.max_freshness_secs))
                .ok_or_else(|| {
                    PaymentError::GpsUnavailable("vehicle has no fresh GPS fix".to_string())
                })?,
        };

        let origin = stop_resolver::nearest_stop(fix, &route.stops).ok_or_else(|| {
            PaymentError::GpsUnavailable(format!(
                "route {} has no geocoded stops",
                route.route_id
            ))
        })?;

        let rules = bounded(
            self.timeout,
            self.routes.fare_rules(&route.route_id, &origin.stop.id),
        )
        .await?;
        let downstream = stop_resolver::downstream_destinations(&route.stops, &origin.stop.id);
        let destinations = stop_resolver::attach_fares(downstream, &rules, now);

        Ok(TripOptions {
            confidence: confidence_level(origin.distance_meters, self.confidence_threshold_meters),
            route_id: route.route_id,
            route_name: route.name,
            merchant: merchant_summary(&record.merchant),
            origin,
            destinations,
        })
    }
}

fn merchant_summary(merchant: &Merchant) -> MerchantSummary {
    MerchantSummary {
        merchant_id: merchant.merchant_id.clone(),
        name: merchant.name.clone(),
    }
}

/// Builds the receipt from the stored transaction only, so a replay yields
/// the same receipt as the original request.
fn receipt(tx: &Transaction, merchant: MerchantSummary) -> PaymentReceipt {
    let origin = tx.trip.origin_stop.as_ref().map(|stop_id| OriginSummary {
        stop_id: stop_id.clone(),
        provenance: tx.trip.provenance.unwrap_or(OriginProvenance::UserSelected),
        distance_meters: tx.trip.nearest_stop_distance_meters,
    });

    PaymentReceipt {
        transaction_id: tx.transaction_id,
        status: tx.status,
        reference_code: tx.reference_code.clone(),
        amount: tx.amount,
        commission: tx.commission,
        net_amount: tx.net_amount,
        currency: tx.currency.clone(),
        balance_before: tx.balance_before,
        balance_after: tx.balance_after,
        merchant,
        origin,
        destination_stop_id: tx.trip.destination_stop.clone(),
        gps: tx.trip.gps_boarding_coordinates,
        created_at: tx.created_at,
    }
}
