use crate::domain::geo::{Coordinates, distance_meters};
use crate::domain::money::Amount;
use crate::domain::route::{FareRule, Stop, active_fare};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearestStop {
    pub stop: Stop,
    pub distance_meters: u32,
}

/// A reachable stop and the fare currently charged to get there, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Destination {
    pub stop: Stop,
    pub fare: Option<Amount>,
}

/// Closest geocoded stop to `fix`. Ties go to the stop that comes first on
/// the route.
pub fn nearest_stop(fix: Coordinates, stops: &[Stop]) -> Option<NearestStop> {
    let mut best: Option<NearestStop> = None;
    for stop in stops {
        let Some(position) = stop.position else {
            continue;
        };
        let distance = distance_meters(fix, position);
        if best.as_ref().is_none_or(|b| distance < b.distance_meters) {
            best = Some(NearestStop {
                stop: stop.clone(),
                distance_meters: distance,
            });
        }
    }
    best
}

/// Stops strictly after `origin_stop_id`. An origin that is not on the route
/// has no reachable destinations.
pub fn downstream_destinations(stops: &[Stop], origin_stop_id: &str) -> Vec<Stop> {
    match stops.iter().position(|s| s.id == origin_stop_id) {
        Some(index) => stops[index + 1..].to_vec(),
        None => Vec::new(),
    }
}

pub fn attach_fares(
    destinations: Vec<Stop>,
    fare_rules: &[FareRule],
    now: DateTime<Utc>,
) -> Vec<Destination> {
    destinations
        .into_iter()
        .map(|stop| {
            let fare = active_fare(fare_rules, &stop.id, now).map(|r| r.fare_amount);
            Destination { stop, fare }
        })
        .collect()
}
