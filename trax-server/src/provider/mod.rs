//! The data provider seam.
//!
//! The engine never parses feeds or diffs real-time messages itself. It
//! reads already-augmented records through [`DataProvider`], and observes
//! the provider's refresh lifecycle through [`ProviderEvent`]s.

mod error;
mod snapshot;

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::domain::{
    Route, RunSeries, ServiceDate, ShapePoint, Stop, StopTime, TimeWindow, TravelTrip,
    TripInstance, VehiclePosition,
};

pub use error::ProviderError;
pub use snapshot::{RealtimeSnapshot, SnapshotProvider, StaticSnapshot};

/// Which part of the data set a refresh replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshKind {
    /// Full reload of the static schedule and everything derived from it.
    Static,
    /// Re-application of the real-time overlay.
    Realtime,
}

impl fmt::Display for RefreshKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshKind::Static => f.write_str("static"),
            RefreshKind::Realtime => f.write_str("realtime"),
        }
    }
}

/// Refresh lifecycle notifications emitted by a provider.
///
/// Providers deliver these synchronously, in order, from inside the
/// refresh itself: `Finished` or `Failed` is delivered before the refresh
/// future resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    Started(RefreshKind),
    Finished(RefreshKind),
    Failed(RefreshKind, String),
}

/// Callback receiving provider events.
pub type EventListener = Arc<dyn Fn(&ProviderEvent) + Send + Sync>;

/// Sizes of the loaded data set, for the status page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DataCounts {
    pub routes: usize,
    pub trips: usize,
    pub stops: usize,
    pub shapes: usize,
    pub trip_updates: usize,
    pub stop_time_updates: usize,
    pub vehicle_positions: usize,
}

/// One visit of a trip instance to a stop on a given service date.
#[derive(Debug, Clone)]
pub struct StopVisit {
    pub instance: Arc<TripInstance>,
    /// Index into `instance.stop_times`.
    pub index: usize,
    pub service_date: ServiceDate,
}

impl StopVisit {
    pub fn stop_time(&self) -> &StopTime {
        &self.instance.stop_times[self.index]
    }

    /// Identity of the visit, for de-duplication.
    pub fn key(&self) -> (String, usize) {
        (self.instance.instance_id.clone(), self.index)
    }
}

/// Read interface onto the loaded schedule and real-time overlay.
///
/// Reads return shared handles into the provider's current snapshot;
/// refreshes replace that snapshot wholesale, so a handle obtained during
/// a request stays consistent for the request's lifetime.
pub trait DataProvider: Send + Sync {
    fn stop(&self, stop_id: &str) -> Option<Arc<Stop>>;

    /// Platforms and other stops whose parent is `stop_id`.
    fn child_stops(&self, stop_id: &str) -> Vec<Arc<Stop>>;

    /// Top-level stations.
    fn stations(&self) -> Vec<Arc<Stop>>;

    fn trip_instance(&self, instance_id: &str) -> Option<Arc<TripInstance>>;

    fn trip_instances_for_trip(&self, trip_id: &str) -> Vec<Arc<TripInstance>>;

    /// Every trip instance, for search.
    fn trip_instances(&self) -> Arc<Vec<Arc<TripInstance>>>;

    /// Visits to `stop_id` itself (not its children) on `date` whose
    /// effective time falls in `window`. May be coarser than the window.
    fn stop_visits(&self, stop_id: &str, date: ServiceDate, window: TimeWindow) -> Vec<StopVisit>;

    fn route(&self, route_id: &str) -> Option<Arc<Route>>;

    /// Every route, ordered by id.
    fn routes(&self) -> Vec<Arc<Route>>;

    /// Points of a shape in sequence order.
    fn shape(&self, shape_id: &str) -> Option<Arc<Vec<ShapePoint>>>;

    /// Latest vehicle position reports.
    fn vehicle_positions(&self) -> Arc<Vec<VehiclePosition>>;

    /// Services from the long-distance travel feed.
    fn travel_trips(&self) -> Arc<Vec<Arc<TravelTrip>>>;

    fn run_series(&self, date: ServiceDate, series: &str) -> Option<RunSeries>;

    /// Data-set sizes; all zero when nothing is loaded.
    fn counts(&self) -> DataCounts;

    /// Load the static schedule and the real-time overlay from scratch.
    fn load_static(&self) -> BoxFuture<'_, Result<(), ProviderError>>;

    /// Re-apply the real-time overlay to the loaded schedule.
    fn refresh_realtime(&self) -> BoxFuture<'_, Result<(), ProviderError>>;

    /// Register a listener for refresh lifecycle events.
    fn subscribe(&self, listener: EventListener);
}
