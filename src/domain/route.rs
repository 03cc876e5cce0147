use super::geo::Coordinates;
use super::money::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: String,
    pub name: String,
    /// Stops that were never geocoded carry no position.
    #[serde(default)]
    pub position: Option<Coordinates>,
}

/// A route and its stops in travel order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub route_id: String,
    pub name: String,
    pub stops: Vec<Stop>,
}

impl Route {
    pub fn stop(&self, stop_id: &str) -> Option<&Stop> {
        self.stops.iter().find(|s| s.id == stop_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareRule {
    pub route_id: String,
    pub origin_stop_id: String,
    pub destination_stop_id: String,
    pub fare_amount: Amount,
    pub valid_from: DateTime<Utc>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
}

impl FareRule {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && self.valid_until.is_none_or(|until| until > now)
    }
}

/// Picks the rule in force at `now` for the given destination. When
/// several overlap, the most recently started one wins.
pub fn active_fare<'a>(
    rules: &'a [FareRule],
    destination_stop_id: &str,
    now: DateTime<Utc>,
) -> Option<&'a FareRule> {
    rules
        .iter()
        .filter(|r| r.destination_stop_id == destination_stop_id && r.is_active_at(now))
        .max_by_key(|r| r.valid_from)
}
