//! Upcoming departures at a stop.
//!
//! [`DepartureBuilder`] turns primary-schedule stop-times into departures,
//! [`travel_departures`] does the same for the long-distance travel feed,
//! and [`merge`] orders both by time until departure. [`stop_board`]
//! composes them into the rider-facing view.

mod builder;
mod merge;
mod travel;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::debug;

use crate::cache::BoardCache;
use crate::domain::{Route, SECS_PER_DAY, ServiceDate, ServiceTime, Stop, TimeWindow, TripInstance};
use crate::error::CoreError;
use crate::provider::DataProvider;

pub use builder::{DepartureBuilder, GtfsDeparture};
pub use merge::{Departure, merge};
pub use travel::{StopMatcher, TravelDeparture, normalize_place, travel_departures};

/// Parameters of a stop board.
#[derive(Debug, Clone)]
pub struct BoardRequest<'a> {
    pub stop_id: &'a str,
    /// Current network-local time.
    pub now: NaiveDateTime,
    pub horizon_hours: u32,
    pub extra_details: bool,
}

/// The departures view of a stop.
#[derive(Debug, Clone, Serialize)]
pub struct StopBoard {
    pub stop: Arc<Stop>,
    pub departures: Vec<Departure>,
    /// Trip instances of the listed departures, by instance id.
    pub instances: BTreeMap<String, Arc<TripInstance>>,
    /// Routes of those instances, by route id.
    pub routes: BTreeMap<String, Arc<Route>>,
    pub extra_details: bool,
}

/// A service day a board can reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ServiceDay {
    date: ServiceDate,
    /// The current time on this day's clock; negative before it begins.
    now_secs: i64,
    window: TimeWindow,
}

/// The service days whose stop-times can fall within the board window.
///
/// Stop-times past 24:00 belong to the previous date's service, so the
/// previous date is read with its clock a day ahead. The next date is read
/// once the window crosses midnight.
fn service_days(now: NaiveDateTime, horizon_hours: u32) -> Vec<ServiceDay> {
    let today = ServiceDate::new(now.date());
    let now_secs = i64::from(ServiceTime::of_datetime(now).secs());
    let start = now_secs - now_secs % 60;
    let end = start + i64::from(horizon_hours) * 3600;
    let day = i64::from(SECS_PER_DAY);

    [(today.pred(), day), (today, 0), (today.succ(), -day)]
        .into_iter()
        .filter_map(|(date, shift)| {
            let from = u32::try_from((start + shift).max(0)).ok()?;
            let to = u32::try_from(end + shift).ok()?;
            (from < to).then(|| ServiceDay {
                date,
                now_secs: now_secs + shift,
                window: TimeWindow::new(ServiceTime::from_secs(from), ServiceTime::from_secs(to)),
            })
        })
        .collect()
}

/// Compose the departure board of a stop.
///
/// Departures leaving within `(now, now + horizon]` from both feeds are
/// merged in departure order; passing and skipped visits are hidden
/// unless `extra_details` is set. Trips of the previous and next service
/// dates are included when their times reach into the window.
pub fn stop_board(
    provider: &dyn DataProvider,
    cache: Option<(&BoardCache, u64)>,
    request: &BoardRequest<'_>,
) -> Result<StopBoard, CoreError> {
    let stop = provider
        .stop(request.stop_id)
        .ok_or_else(|| CoreError::not_found("stop", request.stop_id))?;

    let mut builder = DepartureBuilder::new(provider);
    if let Some((cache, generation)) = cache {
        builder = builder.with_cache(cache, generation);
    }
    let mut gtfs = Vec::new();
    for day in service_days(request.now, request.horizon_hours) {
        gtfs.extend(builder.departures(&stop, day.date, day.window, day.now_secs));
    }
    let travel = travel_departures(&provider.travel_trips(), &stop, request.now);

    let horizon_secs = i64::from(request.horizon_hours) * 3600;
    let departures: Vec<Departure> = merge(gtfs, travel)
        .into_iter()
        .filter(|d| d.within_horizon(horizon_secs) && d.is_visible(request.extra_details))
        .collect();

    let mut instances = BTreeMap::new();
    let mut routes = BTreeMap::new();
    for departure in &departures {
        let Departure::Gtfs(d) = departure else {
            continue;
        };
        if let Some(instance) = provider.trip_instance(&d.instance_id) {
            if !routes.contains_key(&instance.route_id) {
                if let Some(route) = provider.route(&instance.route_id) {
                    routes.insert(instance.route_id.clone(), route);
                }
            }
            instances.insert(instance.instance_id.clone(), instance);
        }
    }

    debug!(
        stop = %stop.stop_id,
        departures = departures.len(),
        "built stop board"
    );
    Ok(StopBoard {
        stop,
        departures,
        instances,
        routes,
        extra_details: request.extra_details,
    })
}
