//! Merging primary-schedule and travel-feed departures.

use serde::Serialize;

use super::builder::GtfsDeparture;
use super::travel::TravelDeparture;

/// A departure from either feed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "dep_type", rename_all = "snake_case")]
pub enum Departure {
    Gtfs(GtfsDeparture),
    Travel(TravelDeparture),
}

impl Departure {
    /// Seconds until departure, rounded to the minute.
    pub fn departs_in_secs(&self) -> Option<i64> {
        match self {
            Departure::Gtfs(d) => d.departs_in_secs,
            Departure::Travel(d) => d.departs_in_secs,
        }
    }

    /// Whether the departure is shown to riders without extra details.
    ///
    /// Travel-feed departures are always shown.
    pub fn is_visible(&self, extra_details: bool) -> bool {
        match self {
            Departure::Gtfs(d) => extra_details || d.is_public(),
            Departure::Travel(_) => true,
        }
    }

    /// Whether the departure is in `(0, horizon_secs]` from now.
    pub fn within_horizon(&self, horizon_secs: i64) -> bool {
        self.departs_in_secs()
            .is_some_and(|s| s > 0 && s <= horizon_secs)
    }
}

/// Sort key: known non-negative times ascending, everything else last.
fn sort_key(departure: &Departure) -> (bool, i64) {
    match departure.departs_in_secs() {
        Some(secs) if secs >= 0 => (false, secs),
        _ => (true, 0),
    }
}

/// Concatenate both feeds' departures and order them by time until
/// departure. Ties keep input order, primary schedule first.
pub fn merge(gtfs: Vec<GtfsDeparture>, travel: Vec<TravelDeparture>) -> Vec<Departure> {
    let mut merged: Vec<Departure> = gtfs
        .into_iter()
        .map(Departure::Gtfs)
        .chain(travel.into_iter().map(Departure::Travel))
        .collect();
    merged.sort_by_key(sort_key);
    merged
}
