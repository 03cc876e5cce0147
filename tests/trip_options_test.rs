mod common;

use common::{DEVICE_TOKEN, IDLE_DEVICE_TOKEN, fixture};
use farepay::domain::geo::{Confidence, Coordinates};
use farepay::error::PaymentError;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_options_from_vehicle_fix() {
    let fx = fixture().await;

    let options = fx.orchestrator.trip_options(DEVICE_TOKEN, None).await.unwrap();

    assert_eq!(options.route_id, "r1");
    assert_eq!(options.merchant.name, "City Hoppa");
    assert_eq!(options.origin.stop.id, "s1");
    assert_eq!(options.origin.distance_meters, 0);
    assert_eq!(options.confidence, Confidence::High);

    let priced: Vec<_> = options
        .destinations
        .iter()
        .map(|d| (d.stop.id.as_str(), d.fare.map(|f| f.value())))
        .collect();
    assert_eq!(priced, vec![("s2", Some(dec!(30))), ("s3", Some(dec!(50)))]);
}

#[tokio::test]
async fn test_payer_fix_overrides_stale_vehicle() {
    let fx = fixture().await;

    let err = fx
        .orchestrator
        .trip_options(IDLE_DEVICE_TOKEN, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::GpsUnavailable(_)));

    // Just short of Westlands, the last stop: nothing further to ride to.
    let near_westlands = Coordinates::new(-1.2680, 36.8108).unwrap();
    let options = fx
        .orchestrator
        .trip_options(IDLE_DEVICE_TOKEN, Some(near_westlands))
        .await
        .unwrap();
    assert_eq!(options.origin.stop.id, "s3");
    assert!(options.destinations.is_empty());
}

#[tokio::test]
async fn test_far_fix_has_low_confidence() {
    let fx = fixture().await;

    // Between Kencom and Museum Hill, several hundred metres from either.
    let midway = Coordinates::new(-1.2805, 36.8156).unwrap();
    let options = fx
        .orchestrator
        .trip_options(DEVICE_TOKEN, Some(midway))
        .await
        .unwrap();
    assert_ne!(options.confidence, Confidence::High);
}

#[tokio::test]
async fn test_unknown_device() {
    let fx = fixture().await;
    let err = fx.orchestrator.trip_options("nope", None).await.unwrap_err();
    assert!(matches!(err, PaymentError::InvalidDevice));
}
