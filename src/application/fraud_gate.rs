use super::bounded;
use crate::config::Settings;
use crate::domain::device::DeviceGps;
use crate::domain::fraud::{FraudAlert, OriginMismatchDetails};
use crate::domain::geo::{Confidence, Coordinates, confidence_level, distance_meters};
use crate::domain::ports::FraudAlertStoreRef;
use crate::domain::route::Stop;
use crate::domain::transaction::OriginProvenance;
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FraudGateConfig {
    pub max_distance_meters: u32,
    pub confidence_threshold_meters: u32,
    pub max_freshness_secs: i64,
}

impl From<&Settings> for FraudGateConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            max_distance_meters: settings.gps_max_distance_meters,
            confidence_threshold_meters: settings.gps_confidence_threshold_meters,
            max_freshness_secs: settings.gps_max_freshness_secs,
        }
    }
}

/// What the payer claims about where they boarded.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginClaim {
    pub stop: Stop,
    pub provenance: OriginProvenance,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GateInput {
    pub user_id: String,
    pub claim: Option<OriginClaim>,
    pub payer_fix: Option<Coordinates>,
    pub vehicle_gps: Option<DeviceGps>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Nothing was claimed, so there is nothing to check.
    NoClaim,
    /// An origin was claimed but no usable fix exists to check it against.
    Unverified,
    /// The claimed stop was never geocoded.
    Unknowable { stop_id: String },
    Accepted {
        fix: Coordinates,
        distance_meters: u32,
        confidence: Confidence,
    },
    Rejected(OriginMismatchDetails),
}

/// Evidence carried forward onto the transaction when the gate passes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GateClearance {
    pub fix: Option<Coordinates>,
    pub distance_meters: Option<u32>,
    pub confidence: Option<Confidence>,
}

/// Checks a claimed boarding stop against the payer's or the vehicle's GPS.
#[derive(Clone)]
pub struct FraudGate {
    config: FraudGateConfig,
    alerts: FraudAlertStoreRef,
    timeout: Duration,
}

impl FraudGate {
    pub fn new(config: FraudGateConfig, alerts: FraudAlertStoreRef, timeout: Duration) -> Self {
        Self {
            config,
            alerts,
            timeout,
        }
    }

    /// Pure decision step. Fails only when GPS origin detection was
    /// requested and the vehicle has no fresh fix.
    pub fn assess(&self, input: &GateInput, now: DateTime<Utc>) -> Result<Verdict> {
        let vehicle_fix = input
            .vehicle_gps
            .and_then(|gps| gps.fresh_position(now, self.config.max_freshness_secs));

        let Some(claim) = &input.claim else {
            return Ok(Verdict::NoClaim);
        };

        if claim.provenance == OriginProvenance::GpsAuto && vehicle_fix.is_none() {
            let reason = match input.vehicle_gps {
                None => "vehicle has never reported a position".to_string(),
                Some(gps) if !gps.enabled => "vehicle GPS is disabled".to_string(),
                Some(gps) => format!("vehicle fix is {}s old", gps.age_secs(now)),
            };
            return Err(PaymentError::GpsUnavailable(reason));
        }

        let Some(stop_position) = claim.stop.position else {
            return Ok(Verdict::Unknowable {
                stop_id: claim.stop.id.clone(),
            });
        };

        let Some(fix) = input.payer_fix.or(vehicle_fix) else {
            return Ok(Verdict::Unverified);
        };

        let distance = distance_meters(fix, stop_position);
        if distance <= self.config.max_distance_meters {
            Ok(Verdict::Accepted {
                fix,
                distance_meters: distance,
                confidence: confidence_level(distance, self.config.confidence_threshold_meters),
            })
        } else {
            Ok(Verdict::Rejected(OriginMismatchDetails {
                claimed_stop_id: claim.stop.id.clone(),
                claimed_stop_name: claim.stop.name.clone(),
                claimed_position: stop_position,
                fix,
                distance_meters: distance,
                max_distance_meters: self.config.max_distance_meters,
            }))
        }
    }

    /// Runs [`FraudGate::assess`] and acts on the verdict. A rejection
    /// records a `suspicious_origin` alert before failing with
    /// `OriginMismatch`; if the alert cannot be written the payment still
    /// fails the same way.
    pub async fn check(&self, input: &GateInput, now: DateTime<Utc>) -> Result<GateClearance> {
        match self.assess(input, now)? {
            Verdict::NoClaim => Ok(GateClearance {
                fix: input.payer_fix,
                ..Default::default()
            }),
            Verdict::Unverified => {
                info!(user_id = %input.user_id, "origin accepted without a GPS fix");
                Ok(GateClearance::default())
            }
            Verdict::Unknowable { stop_id } => {
                warn!(
                    user_id = %input.user_id,
                    stop_id = %stop_id,
                    "claimed origin has no coordinates; accepted unchecked"
                );
                Ok(GateClearance {
                    fix: input.payer_fix,
                    ..Default::default()
                })
            }
            Verdict::Accepted {
                fix,
                distance_meters,
                confidence,
            } => Ok(GateClearance {
                fix: Some(fix),
                distance_meters: Some(distance_meters),
                confidence: Some(confidence),
            }),
            Verdict::Rejected(details) => {
                let distance_meters = details.distance_meters;
                let max_meters = details.max_distance_meters;
                warn!(
                    user_id = %input.user_id,
                    stop_id = %details.claimed_stop_id,
                    distance_meters,
                    max_meters,
                    "origin mismatch"
                );
                let alert = FraudAlert::suspicious_origin(input.user_id.clone(), details);
                if let Err(e) = bounded(self.timeout, self.alerts.append(alert)).await {
                    error!(user_id = %input.user_id, error = %e, "failed to record fraud alert");
                }
                Err(PaymentError::OriginMismatch {
                    distance_meters,
                    max_meters,
                })
            }
        }
    }
}
