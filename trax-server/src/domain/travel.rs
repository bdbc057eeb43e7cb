//! Long-distance travel feed records.
//!
//! The travel feed describes interstate and long-distance services. Its
//! stops are keyed by place name and an external station code rather than
//! by the primary schedule's stop ids, and its times are local timestamps
//! rather than service-day offsets.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::stop::StopId;
use super::time::deserialize_optional_datetime;

fn default_true() -> bool {
    true
}

/// One stop of a travel-feed service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelStop {
    pub place_name: String,

    /// Primary-schedule stop id, present in later feed generations.
    #[serde(default)]
    pub gtfs_stop_id: Option<StopId>,

    /// External station code.
    #[serde(default)]
    pub station_code: Option<String>,

    /// `false` when the service passes without stopping.
    #[serde(default = "default_true")]
    pub is_stop: bool,

    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub planned_arrival: Option<NaiveDateTime>,

    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub planned_departure: Option<NaiveDateTime>,

    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub actual_arrival: Option<NaiveDateTime>,

    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub actual_departure: Option<NaiveDateTime>,

    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub estimated_passing_time: Option<NaiveDateTime>,
}

impl TravelStop {
    pub fn new(place_name: impl Into<String>) -> Self {
        Self {
            place_name: place_name.into(),
            gtfs_stop_id: None,
            station_code: None,
            is_stop: true,
            planned_arrival: None,
            planned_departure: None,
            actual_arrival: None,
            actual_departure: None,
            estimated_passing_time: None,
        }
    }

    /// When the service is expected here: actual departure, actual
    /// arrival, estimated passing time, then the planned times.
    pub fn event_time(&self) -> Option<NaiveDateTime> {
        self.actual_departure
            .or(self.actual_arrival)
            .or(self.estimated_passing_time)
            .or(self.planned_departure)
            .or(self.planned_arrival)
    }

    /// Signed delay in seconds, or `None` without real-time data.
    pub fn delay_secs(&self) -> Option<i64> {
        let diff = |actual: Option<NaiveDateTime>, planned: Option<NaiveDateTime>| {
            Some((actual? - planned?).num_seconds())
        };
        diff(self.actual_departure, self.planned_departure)
            .or_else(|| diff(self.actual_arrival, self.planned_arrival))
    }
}

/// A travel-feed service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelTrip {
    pub service_id: String,

    #[serde(default)]
    pub run: Option<String>,

    #[serde(default)]
    pub service_name: Option<String>,

    #[serde(default)]
    pub direction: Option<String>,

    /// Stops where the service calls.
    pub stops: Vec<TravelStop>,

    /// All stops including those passed without stopping, when the feed
    /// provides them.
    #[serde(default)]
    pub stops_with_passing: Option<Vec<TravelStop>>,
}

impl TravelTrip {
    /// Every stop record, passing-inclusive list first.
    pub fn all_stops(&self) -> impl Iterator<Item = &TravelStop> {
        self.stops_with_passing
            .iter()
            .flatten()
            .chain(self.stops.iter())
    }

    /// First departure of the service, for ordering service lists.
    pub fn first_departure(&self) -> Option<NaiveDateTime> {
        self.stops.first().and_then(TravelStop::event_time)
    }

    /// A copy with passing stops removed from the passing-inclusive list.
    pub fn without_passing(&self) -> Self {
        let mut trip = self.clone();
        if let Some(stops) = trip.stops_with_passing.as_mut() {
            stops.retain(|s| s.is_stop);
        }
        trip
    }
}
