#![allow(dead_code)]

use chrono::{Duration, Utc};
use farepay::application::orchestrator::{PaymentOrchestrator, PaymentRequest, TripClaim};
use farepay::bootstrap::{Backend, build_orchestrator};
use farepay::config::Settings;
use farepay::domain::account::Account;
use farepay::domain::device::{
    DeviceGps, DeviceStatus, Merchant, MerchantDevice, MerchantStatus,
};
use farepay::domain::geo::Coordinates;
use farepay::domain::money::{Amount, Balance, CommissionRate};
use farepay::domain::ports::PinVerifier;
use farepay::domain::route::{FareRule, Route, Stop};
use farepay::domain::transaction::OriginProvenance;
use farepay::infrastructure::in_memory::InMemoryNotificationSink;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

pub const USER: &str = "u1";
pub const PIN: &str = "1234";
pub const DEVICE_TOKEN: &str = "tok-1";
pub const IDLE_DEVICE_TOKEN: &str = "tok-idle";

/// Kencom, the first stop on the test route.
pub fn kencom() -> Coordinates {
    Coordinates::new(-1.2864, 36.8172).unwrap()
}

/// Stored hashes are the PIN itself, keeping tests free of argon2 cost.
pub struct PlainPins;

impl PinVerifier for PlainPins {
    fn verify(&self, pin: &str, pin_hash: &str) -> bool {
        pin == pin_hash
    }
}

pub struct Fixture {
    pub backend: Backend,
    pub orchestrator: PaymentOrchestrator,
    pub notifications: InMemoryNotificationSink,
}

impl Fixture {
    pub async fn balance(&self, user_id: &str) -> Decimal {
        self.backend
            .accounts
            .get(user_id)
            .await
            .unwrap()
            .unwrap()
            .balance
            .0
    }
}

fn stop(id: &str, name: &str, lat: f64, lon: f64) -> Stop {
    Stop {
        id: id.into(),
        name: name.into(),
        position: Some(Coordinates::new(lat, lon).unwrap()),
    }
}

/// Backend with one 1000 KES account, a 5% merchant and a three-stop route.
///
/// `tok-1` sits at Kencom with a fresh fix; `tok-idle` has a fix that is an
/// hour old.
pub async fn fixture_with(settings: Settings) -> Fixture {
    let backend = Backend::in_memory();
    let now = Utc::now();

    let mut account = Account::new(USER, "KES", PIN.to_string());
    account.balance = Balance::new(dec!(1000.00));
    backend.accounts.insert(account).await.unwrap();

    backend
        .devices
        .put_merchant(Merchant {
            merchant_id: "m1".into(),
            name: "City Hoppa".into(),
            commission_rate: CommissionRate::new(dec!(0.05)).unwrap(),
            status: MerchantStatus::Active,
        })
        .await
        .unwrap();

    for (token, device_id, age) in [
        (DEVICE_TOKEN, "d1", Duration::seconds(30)),
        (IDLE_DEVICE_TOKEN, "d2", Duration::hours(1)),
    ] {
        backend
            .devices
            .put_device(MerchantDevice {
                device_id: device_id.into(),
                device_token: token.into(),
                merchant_id: "m1".into(),
                route_id: Some("r1".into()),
                status: DeviceStatus::Active,
                last_known_gps: Some(DeviceGps {
                    position: kencom(),
                    updated_at: now - age,
                    enabled: true,
                }),
            })
            .await
            .unwrap();
    }

    backend
        .routes
        .put_route(Route {
            route_id: "r1".into(),
            name: "CBD - Westlands".into(),
            stops: vec![
                stop("s1", "Kencom", -1.2864, 36.8172),
                stop("s2", "Museum Hill", -1.2740, 36.8140),
                stop("s3", "Westlands", -1.2676, 36.8108),
            ],
        })
        .await
        .unwrap();

    for (destination, fare) in [("s2", dec!(30)), ("s3", dec!(50))] {
        backend
            .routes
            .add_fare_rule(FareRule {
                route_id: "r1".into(),
                origin_stop_id: "s1".into(),
                destination_stop_id: destination.into(),
                fare_amount: Amount::new(fare).unwrap(),
                valid_from: now - Duration::days(30),
                valid_until: None,
            })
            .await
            .unwrap();
    }

    let notifications = InMemoryNotificationSink::new();
    let orchestrator = build_orchestrator(
        &settings,
        &backend,
        Arc::new(PlainPins),
        Arc::new(notifications.clone()),
    );

    Fixture {
        backend,
        orchestrator,
        notifications,
    }
}

pub async fn fixture() -> Fixture {
    fixture_with(Settings::default()).await
}

pub fn payment(reference: &str, amount: Decimal) -> PaymentRequest {
    PaymentRequest {
        user_id: USER.into(),
        device_token: DEVICE_TOKEN.into(),
        amount: Amount::new(amount).unwrap(),
        pin: PIN.into(),
        reference_code: reference.into(),
        trip: None,
        payer_fix: None,
    }
}

pub fn boarding_at(origin: &str, destination: Option<&str>, provenance: OriginProvenance) -> TripClaim {
    TripClaim {
        origin_stop_id: origin.into(),
        destination_stop_id: destination.map(str::to_string),
        provenance,
    }
}
