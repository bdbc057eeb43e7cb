//! Trip instances and their stop-times.
//!
//! A `TripInstance` is one concrete run of a scheduled trip with the
//! real-time overlay already applied by the data provider. Each visit to a
//! stop is a `StopTime` carrying both the scheduled and the actual
//! (possibly substituted) stop and times.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::route::RouteCode;
use super::stop::StopId;
use super::time::{ServiceDate, ServiceTime, deserialize_optional_time};

/// Real-time status of a single stop-time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleRelationship {
    Scheduled,
    Skipped,
    NoData,
    Unscheduled,
}

/// Real-time information attached to a stop-time by the overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeInfo {
    pub schedule_relationship: ScheduleRelationship,

    /// Delay reported by the feed, used when the overlay produced no times.
    #[serde(default)]
    pub delay_secs: Option<i64>,
}

/// One visit of a trip instance to a stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopTime {
    pub stop_sequence: u32,

    #[serde(default)]
    pub scheduled_stop_id: Option<StopId>,

    #[serde(default)]
    pub scheduled_parent_station_id: Option<StopId>,

    /// Stop actually served, which may differ from the scheduled one
    /// (platform changes).
    #[serde(default)]
    pub actual_stop_id: Option<StopId>,

    #[serde(default)]
    pub actual_parent_station_id: Option<StopId>,

    #[serde(default, deserialize_with = "deserialize_optional_time")]
    pub scheduled_arrival_time: Option<ServiceTime>,

    #[serde(default, deserialize_with = "deserialize_optional_time")]
    pub scheduled_departure_time: Option<ServiceTime>,

    #[serde(default, deserialize_with = "deserialize_optional_time")]
    pub actual_arrival_time: Option<ServiceTime>,

    #[serde(default, deserialize_with = "deserialize_optional_time")]
    pub actual_departure_time: Option<ServiceTime>,

    /// Provider estimate for stops the vehicle passes without stopping.
    #[serde(default, deserialize_with = "deserialize_optional_time")]
    pub estimated_passing_time: Option<ServiceTime>,

    /// The vehicle passes this stop without boarding or alighting.
    #[serde(default)]
    pub passing: bool,

    #[serde(default)]
    pub realtime: Option<RealtimeInfo>,
}

impl StopTime {
    /// Create a stop-time at `stop_id` with no times set.
    pub fn new(stop_sequence: u32, stop_id: impl Into<String>) -> Self {
        let stop_id = StopId::new(stop_id);
        Self {
            stop_sequence,
            scheduled_stop_id: Some(stop_id.clone()),
            scheduled_parent_station_id: None,
            actual_stop_id: Some(stop_id),
            actual_parent_station_id: None,
            scheduled_arrival_time: None,
            scheduled_departure_time: None,
            actual_arrival_time: None,
            actual_departure_time: None,
            estimated_passing_time: None,
            passing: false,
            realtime: None,
        }
    }

    /// Set the parent station for both the scheduled and actual stop.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        let parent = StopId::new(parent);
        self.scheduled_parent_station_id = Some(parent.clone());
        self.actual_parent_station_id = Some(parent);
        self
    }

    /// The time this visit is expected to happen, rounded down to the minute.
    ///
    /// First present of: actual departure, actual arrival, scheduled
    /// departure, scheduled arrival, estimated passing time.
    pub fn effective_time(&self) -> Option<ServiceTime> {
        self.actual_departure_time
            .or(self.actual_arrival_time)
            .or(self.scheduled_departure_time)
            .or(self.scheduled_arrival_time)
            .or(self.estimated_passing_time)
            .map(ServiceTime::floor_minute)
    }

    /// Scheduled departure, falling back to scheduled arrival.
    pub fn scheduled_time(&self) -> Option<ServiceTime> {
        self.scheduled_departure_time.or(self.scheduled_arrival_time)
    }

    /// Actual departure, falling back to actual arrival.
    pub fn actual_time(&self) -> Option<ServiceTime> {
        self.actual_departure_time.or(self.actual_arrival_time)
    }

    /// Signed delay in seconds, or `None` when nothing says how late the
    /// visit is.
    ///
    /// Departure times are compared when both are present, then arrival
    /// times, then the feed's own delay value.
    pub fn delay_secs(&self) -> Option<i64> {
        let diff = |actual: Option<ServiceTime>, scheduled: Option<ServiceTime>| {
            Some(i64::from(actual?.secs()) - i64::from(scheduled?.secs()))
        };
        diff(self.actual_departure_time, self.scheduled_departure_time)
            .or_else(|| diff(self.actual_arrival_time, self.scheduled_arrival_time))
            .or_else(|| self.realtime.as_ref().and_then(|r| r.delay_secs))
    }

    pub fn has_realtime(&self) -> bool {
        self.realtime.is_some()
    }

    pub fn is_skipped(&self) -> bool {
        self.realtime
            .as_ref()
            .is_some_and(|r| r.schedule_relationship == ScheduleRelationship::Skipped)
    }

    /// Whether the scheduled stop or its parent station is `stop_id`.
    pub fn serves_scheduled(&self, stop_id: &str) -> bool {
        self.scheduled_stop_id.as_ref().is_some_and(|s| s.as_str() == stop_id)
            || self
                .scheduled_parent_station_id
                .as_ref()
                .is_some_and(|s| s.as_str() == stop_id)
    }

    /// Every stop id this visit touches, scheduled and actual.
    pub fn touched_stop_ids(&self) -> impl Iterator<Item = &StopId> {
        [
            self.scheduled_stop_id.as_ref(),
            self.scheduled_parent_station_id.as_ref(),
            self.actual_stop_id.as_ref(),
            self.actual_parent_station_id.as_ref(),
        ]
        .into_iter()
        .flatten()
    }
}

/// Kind of a stretch of a trip's stopping pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// Stops at every station between `from` and `to`.
    Local,
    /// Runs express between `from` and `to`, passing `skipped`.
    Express,
    /// The stopping pattern could not be determined.
    Unknown,
}

/// One stretch of a trip's stopping pattern, derived by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressSegment {
    pub kind: SegmentKind,
    pub from: StopId,
    pub to: StopId,
    #[serde(default)]
    pub skipped: Vec<StopId>,
}

/// One dated run of a scheduled trip, with the real-time overlay applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripInstance {
    pub instance_id: String,

    pub trip_id: String,

    pub route_id: String,

    #[serde(default)]
    pub shape_id: Option<String>,

    /// Rider-facing train number, e.g. `"1A23"`.
    pub run: String,

    pub stop_times: Vec<StopTime>,

    /// Dates the trip is scheduled to run, after real-time additions and
    /// cancellations are taken into account by the provider.
    #[serde(default)]
    pub scheduled_dates: BTreeSet<ServiceDate>,

    /// Dates the trip actually ran according to real-time data.
    #[serde(default)]
    pub actual_dates: BTreeSet<ServiceDate>,

    /// Dates from the static calendar alone. Empty when the provider
    /// does not derive them.
    #[serde(default)]
    pub calendar_dates: BTreeSet<ServiceDate>,

    #[serde(default)]
    pub express_info: Vec<ExpressSegment>,

    /// Run series this instance belongs to, named after its canonical run.
    #[serde(default)]
    pub run_series: Option<String>,
}

impl TripInstance {
    pub fn first_stop_time(&self) -> Option<&StopTime> {
        self.stop_times.first()
    }

    pub fn last_stop_time(&self) -> Option<&StopTime> {
        self.stop_times.last()
    }

    /// The 4-character route family code of this instance.
    pub fn route_code(&self) -> RouteCode<'_> {
        RouteCode::of(&self.route_id)
    }

    /// Where the instance actually terminates.
    ///
    /// Walks the stop-times from the end, preferring the actual parent
    /// station over the actual stop.
    pub fn final_stop_id(&self) -> Option<&StopId> {
        self.stop_times.iter().rev().find_map(|st| {
            st.actual_parent_station_id
                .as_ref()
                .or(st.actual_stop_id.as_ref())
        })
    }

    /// Whether this instance leads its run series.
    ///
    /// A run series is named after its canonical run, so the leader is the
    /// instance whose run is the series name. An instance outside any
    /// series is trivially its own leader.
    pub fn is_leader(&self) -> bool {
        match &self.run_series {
            Some(series) => series.trim().eq_ignore_ascii_case(self.run.trim()),
            None => true,
        }
    }

    /// Whether the instance runs on `date`, by schedule or by real-time data.
    pub fn runs_on(&self, date: ServiceDate) -> bool {
        self.scheduled_dates.contains(&date) || self.actual_dates.contains(&date)
    }
}
