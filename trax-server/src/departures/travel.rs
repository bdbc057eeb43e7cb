//! Departures from the long-distance travel feed.
//!
//! Older generations of the feed only name their stops by place, so stops
//! are matched to the primary schedule either by a shared stop id or by a
//! fuzzy comparison of place names. One strategy is chosen per feed.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::delay::{Delay, classify, format_departs_in, round_to_minutes};
use crate::domain::{Stop, TravelStop, TravelTrip};

/// Place names of the feed that differ structurally from the station name.
const PLACE_ALIASES: &[(&str, &str)] = &[("brisbane", "roma street")];

/// How travel-feed stops are matched to a primary-schedule stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMatcher {
    /// The feed carries primary-schedule stop ids.
    ById,
    /// Only place names are available.
    ByPlaceName,
}

impl StopMatcher {
    /// Pick the strategy for a feed: by id as soon as any stop carries one.
    pub fn for_feed(trips: &[Arc<TravelTrip>]) -> Self {
        let has_ids = trips
            .iter()
            .flat_map(|t| t.all_stops())
            .any(|s| s.gtfs_stop_id.is_some());
        if has_ids {
            StopMatcher::ById
        } else {
            StopMatcher::ByPlaceName
        }
    }

    pub fn matches(&self, travel_stop: &TravelStop, target: &Stop) -> bool {
        match self {
            StopMatcher::ById => travel_stop
                .gtfs_stop_id
                .as_ref()
                .is_some_and(|id| *id == target.stop_id),
            StopMatcher::ByPlaceName => {
                let place = normalize_place(&travel_stop.place_name);
                let station = normalize_place(target.place_key.as_deref().unwrap_or(&target.name));
                !place.is_empty()
                    && !station.is_empty()
                    && (place.starts_with(&station) || station.starts_with(&place))
            }
        }
    }
}

/// Canonical form of a place or station name for fuzzy matching.
///
/// Lowercased and trimmed, with the word "station" removed and aliases
/// applied.
pub fn normalize_place(name: &str) -> String {
    let lower = name.to_lowercase();
    let words: Vec<&str> = lower
        .split_whitespace()
        .filter(|w| *w != "station")
        .collect();
    let joined = words.join(" ");
    PLACE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == joined)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(joined)
}

/// A travel-feed service calling at (or passing) a stop.
#[derive(Debug, Clone, Serialize)]
pub struct TravelDeparture {
    pub service_id: String,
    pub run: Option<String>,
    pub service: Arc<TravelTrip>,

    /// The matched stop of the service.
    pub stop: TravelStop,

    pub passing: bool,

    /// Seconds until the service is here, rounded to the minute.
    pub departs_in_secs: Option<i64>,

    /// Formatted time until departure, `"-"` when unknown.
    pub departure_string: String,

    #[serde(flatten)]
    pub delay: Delay,
}

/// Travel-feed departures touching `target`, timed relative to `now`
/// (network local time).
///
/// Every matching service is returned; callers filter by horizon.
pub fn travel_departures(
    trips: &[Arc<TravelTrip>],
    target: &Stop,
    now: NaiveDateTime,
) -> Vec<TravelDeparture> {
    let matcher = StopMatcher::for_feed(trips);
    trips
        .iter()
        .filter_map(|trip| {
            let stop = trip.all_stops().find(|s| matcher.matches(s, target))?;
            let departs_in_secs = stop
                .event_time()
                .map(|at| round_to_minutes((at - now).num_seconds()) * 60);
            Some(TravelDeparture {
                service_id: trip.service_id.clone(),
                run: trip.run.clone(),
                service: Arc::clone(trip),
                stop: stop.clone(),
                passing: !stop.is_stop,
                departs_in_secs,
                departure_string: departs_in_secs
                    .map(format_departs_in)
                    .unwrap_or_else(|| "-".to_string()),
                delay: classify(stop.delay_secs()),
            })
        })
        .collect()
}
