//! Departures of primary-schedule trips at a stop.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::trace;

use crate::cache::BoardCache;
use crate::delay::{Delay, classify, format_departs_in, round_to_minutes};
use crate::domain::{
    ScheduleRelationship, ServiceDate, ServiceTime, Stop, StopId, StopTime, TimeWindow,
    format_time,
};
use crate::express::{express_string, stop_display_name};
use crate::provider::{DataProvider, StopVisit};

/// A departure of a trip instance from a stop.
#[derive(Debug, Clone, Serialize)]
pub struct GtfsDeparture {
    pub instance_id: String,
    pub trip_id: String,
    pub route_id: String,
    pub run: String,
    pub service_date: ServiceDate,
    pub stop_time: StopTime,

    /// The vehicle passes without stopping.
    pub passing: bool,

    /// Real-time data exists for this stop-time.
    pub realtime: bool,

    pub schedule_relationship: Option<ScheduleRelationship>,

    /// Where the instance actually terminates.
    pub last_stop_id: Option<StopId>,

    /// Skip-stop description from this stop onwards.
    pub express_string: String,

    /// Effective time of the visit, floored to the minute.
    pub actual_time: Option<ServiceTime>,

    pub scheduled_departure_timestr: String,
    pub actual_departure_timestr: String,

    /// Formatted time until departure, `"-"` when unknown.
    pub departs_in: String,

    /// Seconds until departure, rounded to the minute.
    pub departs_in_secs: Option<i64>,

    #[serde(flatten)]
    pub delay: Delay,
}

impl GtfsDeparture {
    /// Whether riders without extra details see this departure.
    ///
    /// Passing visits are hidden, as are skipped visits. A visit only
    /// counts as skipped when real-time data says so.
    pub fn is_public(&self) -> bool {
        !self.passing && self.schedule_relationship != Some(ScheduleRelationship::Skipped)
    }
}

/// Builds [`GtfsDeparture`]s for a stop and its child stops.
pub struct DepartureBuilder<'a> {
    provider: &'a dyn DataProvider,
    cache: Option<(&'a BoardCache, u64)>,
}

impl<'a> DepartureBuilder<'a> {
    pub fn new(provider: &'a dyn DataProvider) -> Self {
        Self {
            provider,
            cache: None,
        }
    }

    /// Memoise visit enumerations in `cache` under data generation
    /// `generation`.
    pub fn with_cache(mut self, cache: &'a BoardCache, generation: u64) -> Self {
        self.cache = Some((cache, generation));
        self
    }

    /// Every visit to `stop` or its children on `date` whose effective time
    /// lies in `window`, ordered by that time.
    pub fn visits(&self, stop: &Stop, date: ServiceDate, window: TimeWindow) -> Arc<Vec<StopVisit>> {
        match self.cache {
            Some((cache, generation)) => {
                let key = BoardCache::key(&stop.stop_id, date, window, generation);
                cache.get_or_insert_with(key, || self.enumerate(stop, date, window))
            }
            None => Arc::new(self.enumerate(stop, date, window)),
        }
    }

    fn enumerate(&self, stop: &Stop, date: ServiceDate, window: TimeWindow) -> Vec<StopVisit> {
        let mut stop_ids = vec![stop.stop_id.clone()];
        stop_ids.extend(
            self.provider
                .child_stops(stop.stop_id.as_str())
                .iter()
                .map(|c| c.stop_id.clone()),
        );

        let mut seen = HashSet::new();
        let mut visits = Vec::new();
        for stop_id in &stop_ids {
            for visit in self.provider.stop_visits(stop_id.as_str(), date, window) {
                let in_window = visit
                    .stop_time()
                    .effective_time()
                    .is_some_and(|t| window.contains(t));
                if in_window && seen.insert(visit.key()) {
                    visits.push(visit);
                }
            }
        }

        visits.sort_by(|a, b| {
            a.stop_time()
                .effective_time()
                .cmp(&b.stop_time().effective_time())
                .then_with(|| a.instance.instance_id.cmp(&b.instance.instance_id))
        });
        trace!(stop = %stop.stop_id, count = visits.len(), "enumerated stop visits");
        visits
    }

    /// Departures from `stop` in `window` on `date`, timed relative to
    /// `now_secs`, the current time in seconds since the start of `date`'s
    /// service day. It is negative while that day has not begun.
    ///
    /// Returns the full window; horizon and visibility filtering are left
    /// to the caller.
    pub fn departures(
        &self,
        stop: &Stop,
        date: ServiceDate,
        window: TimeWindow,
        now_secs: i64,
    ) -> Vec<GtfsDeparture> {
        self.visits(stop, date, window)
            .iter()
            .map(|visit| self.departure(visit, now_secs))
            .collect()
    }

    /// Convert one visit; `now_secs` is on the visit's service-day clock.
    pub fn departure(&self, visit: &StopVisit, now_secs: i64) -> GtfsDeparture {
        let instance = &visit.instance;
        let stop_time = visit.stop_time();

        let actual_time = stop_time.effective_time();
        let departs_in_secs = actual_time
            .map(|t| round_to_minutes(i64::from(t.secs()) - now_secs) * 60);

        let here = stop_time
            .actual_stop_id
            .as_ref()
            .or(stop_time.scheduled_stop_id.as_ref());
        let express = express_string(&instance.express_info, here, |id| {
            stop_display_name(self.provider, id)
        });

        GtfsDeparture {
            instance_id: instance.instance_id.clone(),
            trip_id: instance.trip_id.clone(),
            route_id: instance.route_id.clone(),
            run: instance.run.clone(),
            service_date: visit.service_date,
            stop_time: stop_time.clone(),
            passing: stop_time.passing,
            realtime: stop_time.has_realtime(),
            schedule_relationship: stop_time.realtime.as_ref().map(|r| r.schedule_relationship),
            last_stop_id: instance.final_stop_id().cloned(),
            express_string: express,
            actual_time,
            scheduled_departure_timestr: format_time(stop_time.scheduled_time()),
            actual_departure_timestr: format_time(actual_time),
            departs_in: departs_in_secs
                .map(format_departs_in)
                .unwrap_or_else(|| "-".to_string()),
            departs_in_secs,
            delay: classify(stop_time.delay_secs()),
        }
    }
}
