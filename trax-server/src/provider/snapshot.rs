//! Snapshot-backed data provider.
//!
//! Serves an already-augmented data set from two JSON files in a data
//! directory: `static.json` (stops, routes, shapes, run series) and
//! `realtime.json` (trip instances with the overlay applied, the travel
//! feed, vehicle positions). The loaded data is indexed once and then
//! replaced wholesale on every successful refresh, so readers holding an
//! `Arc` into the previous snapshot are never disturbed.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{
    Route, RunSeries, ServiceDate, ShapePoint, Stop, StopId, TimeWindow, TravelTrip, TripInstance,
    VehiclePosition,
};

use super::error::ProviderError;
use super::{DataCounts, DataProvider, EventListener, ProviderEvent, RefreshKind, StopVisit};

/// Static part of the snapshot.
pub const STATIC_FILE: &str = "static.json";

/// Real-time part of the snapshot.
pub const REALTIME_FILE: &str = "realtime.json";

/// Contents of `static.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticSnapshot {
    pub stops: Vec<Stop>,

    #[serde(default)]
    pub routes: Vec<Route>,

    #[serde(default)]
    pub run_series: Vec<RunSeries>,

    /// Shape points of every shape, in any order.
    #[serde(default)]
    pub shapes: Vec<ShapePoint>,
}

/// Contents of `realtime.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealtimeSnapshot {
    #[serde(default)]
    pub trip_instances: Vec<TripInstance>,

    #[serde(default)]
    pub travel_trips: Vec<TravelTrip>,

    #[serde(default)]
    pub vehicle_positions: Vec<VehiclePosition>,
}

/// Where snapshot data comes from.
enum Source {
    Directory(PathBuf),
    Memory {
        static_data: StaticSnapshot,
        realtime: RealtimeSnapshot,
    },
}

/// Indexed static data.
struct StaticIndex {
    stops: HashMap<StopId, Arc<Stop>>,
    children: HashMap<StopId, Vec<Arc<Stop>>>,
    stations: Vec<Arc<Stop>>,
    routes: HashMap<String, Arc<Route>>,
    run_series: HashMap<(ServiceDate, String), RunSeries>,
    /// Shape id -> points ordered by sequence.
    shapes: HashMap<String, Arc<Vec<ShapePoint>>>,
}

impl StaticIndex {
    fn build(data: StaticSnapshot) -> Self {
        let mut stops = HashMap::new();
        let mut children: HashMap<StopId, Vec<Arc<Stop>>> = HashMap::new();
        let mut stations = Vec::new();

        for stop in data.stops {
            let stop = Arc::new(stop);
            if let Some(parent) = &stop.parent_station {
                children.entry(parent.clone()).or_default().push(stop.clone());
            }
            if stop.is_station() {
                stations.push(stop.clone());
            }
            stops.insert(stop.stop_id.clone(), stop);
        }
        stations.sort_by(|a, b| a.name.cmp(&b.name));

        let routes = data
            .routes
            .into_iter()
            .map(|r| (r.route_id.clone(), Arc::new(r)))
            .collect();

        let run_series = data
            .run_series
            .into_iter()
            .map(|rs| ((rs.date, rs.series.to_ascii_uppercase()), rs))
            .collect();

        let mut grouped: HashMap<String, Vec<ShapePoint>> = HashMap::new();
        for point in data.shapes {
            grouped.entry(point.shape_id.clone()).or_default().push(point);
        }
        let shapes = grouped
            .into_iter()
            .map(|(id, mut points)| {
                points.sort_by_key(|p| p.sequence);
                (id, Arc::new(points))
            })
            .collect();

        Self {
            stops,
            children,
            stations,
            routes,
            run_series,
            shapes,
        }
    }
}

/// Indexed real-time data.
struct LiveIndex {
    instances: Arc<Vec<Arc<TripInstance>>>,
    by_id: HashMap<String, Arc<TripInstance>>,
    by_trip: HashMap<String, Vec<Arc<TripInstance>>>,
    /// Stop id -> (instance, stop-time index), by scheduled and actual stop.
    visits: HashMap<StopId, Vec<(Arc<TripInstance>, usize)>>,
    travel: Arc<Vec<Arc<TravelTrip>>>,
    trip_updates: usize,
    stop_time_updates: usize,
    vehicle_positions: Arc<Vec<VehiclePosition>>,
}

impl LiveIndex {
    fn build(data: RealtimeSnapshot) -> Self {
        let mut by_id = HashMap::new();
        let mut by_trip: HashMap<String, Vec<Arc<TripInstance>>> = HashMap::new();
        let mut visits: HashMap<StopId, Vec<(Arc<TripInstance>, usize)>> = HashMap::new();
        let mut trip_updates = 0;
        let mut stop_time_updates = 0;

        let instances: Vec<Arc<TripInstance>> =
            data.trip_instances.into_iter().map(Arc::new).collect();

        for inst in &instances {
            by_id.insert(inst.instance_id.clone(), inst.clone());
            by_trip
                .entry(inst.trip_id.clone())
                .or_default()
                .push(inst.clone());

            let updates = inst.stop_times.iter().filter(|st| st.has_realtime()).count();
            if updates > 0 {
                trip_updates += 1;
            }
            stop_time_updates += updates;

            for (idx, st) in inst.stop_times.iter().enumerate() {
                let mut seen = HashSet::new();
                for stop_id in [st.scheduled_stop_id.as_ref(), st.actual_stop_id.as_ref()]
                    .into_iter()
                    .flatten()
                {
                    if seen.insert(stop_id) {
                        visits
                            .entry(stop_id.clone())
                            .or_default()
                            .push((inst.clone(), idx));
                    }
                }
            }
        }

        Self {
            instances: Arc::new(instances),
            by_id,
            by_trip,
            visits,
            travel: Arc::new(data.travel_trips.into_iter().map(Arc::new).collect()),
            trip_updates,
            stop_time_updates,
            vehicle_positions: Arc::new(data.vehicle_positions),
        }
    }
}

struct Snapshot {
    statics: Arc<StaticIndex>,
    live: Arc<LiveIndex>,
}

/// Data provider serving JSON snapshots.
pub struct SnapshotProvider {
    source: Source,
    current: RwLock<Option<Arc<Snapshot>>>,
    listeners: Mutex<Vec<EventListener>>,
}

impl SnapshotProvider {
    /// Provider reading `static.json` and `realtime.json` from `data_dir`.
    ///
    /// Nothing is read until [`DataProvider::load_static`] is called.
    pub fn from_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::with_source(Source::Directory(data_dir.as_ref().to_path_buf()))
    }

    /// Provider serving in-memory data, for tests and demos.
    ///
    /// Like [`SnapshotProvider::from_dir`], the data is only visible after
    /// a load.
    pub fn from_memory(static_data: StaticSnapshot, realtime: RealtimeSnapshot) -> Self {
        Self::with_source(Source::Memory {
            static_data,
            realtime,
        })
    }

    fn with_source(source: Source) -> Self {
        Self {
            source,
            current: RwLock::new(None),
            listeners: Mutex::new(Vec::new()),
        }
    }

    fn snapshot(&self) -> Option<Arc<Snapshot>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace(&self, snapshot: Snapshot) {
        let snapshot = Some(Arc::new(snapshot));
        match self.current.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    fn emit(&self, event: ProviderEvent) {
        let listeners = match self.listeners.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for listener in listeners {
            listener(&event);
        }
    }

    async fn read_static(&self) -> Result<StaticSnapshot, ProviderError> {
        match &self.source {
            Source::Directory(dir) => read_json(dir.join(STATIC_FILE)).await,
            Source::Memory { static_data, .. } => Ok(static_data.clone()),
        }
    }

    async fn read_realtime(&self) -> Result<RealtimeSnapshot, ProviderError> {
        match &self.source {
            Source::Directory(dir) => read_json(dir.join(REALTIME_FILE)).await,
            Source::Memory { realtime, .. } => Ok(realtime.clone()),
        }
    }

    /// Run a refresh, bracketing it with lifecycle events.
    async fn run_refresh<F>(&self, kind: RefreshKind, refresh: F) -> Result<(), ProviderError>
    where
        F: Future<Output = Result<Snapshot, ProviderError>>,
    {
        self.emit(ProviderEvent::Started(kind));
        match refresh.await {
            Ok(snapshot) => {
                let counts = counts_of(&snapshot);
                self.replace(snapshot);
                info!(
                    %kind,
                    trips = counts.trips,
                    stops = counts.stops,
                    "snapshot refreshed"
                );
                self.emit(ProviderEvent::Finished(kind));
                Ok(())
            }
            Err(e) => {
                self.emit(ProviderEvent::Failed(kind, e.to_string()));
                Err(e)
            }
        }
    }
}

async fn read_json<T: DeserializeOwned>(path: PathBuf) -> Result<T, ProviderError> {
    debug!(?path, "reading snapshot file");
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|source| ProviderError::Io {
            path: path.clone(),
            source,
        })?;
    serde_json::from_slice(&bytes).map_err(|source| ProviderError::Json { path, source })
}

fn counts_of(snapshot: &Snapshot) -> DataCounts {
    DataCounts {
        routes: snapshot.statics.routes.len(),
        trips: snapshot.live.instances.len(),
        stops: snapshot.statics.stops.len(),
        shapes: snapshot.statics.shapes.len(),
        trip_updates: snapshot.live.trip_updates,
        stop_time_updates: snapshot.live.stop_time_updates,
        vehicle_positions: snapshot.live.vehicle_positions.len(),
    }
}

impl DataProvider for SnapshotProvider {
    fn stop(&self, stop_id: &str) -> Option<Arc<Stop>> {
        self.snapshot()?.statics.stops.get(stop_id).cloned()
    }

    fn child_stops(&self, stop_id: &str) -> Vec<Arc<Stop>> {
        self.snapshot()
            .and_then(|s| s.statics.children.get(stop_id).cloned())
            .unwrap_or_default()
    }

    fn stations(&self) -> Vec<Arc<Stop>> {
        self.snapshot()
            .map(|s| s.statics.stations.clone())
            .unwrap_or_default()
    }

    fn trip_instance(&self, instance_id: &str) -> Option<Arc<TripInstance>> {
        self.snapshot()?.live.by_id.get(instance_id).cloned()
    }

    fn trip_instances_for_trip(&self, trip_id: &str) -> Vec<Arc<TripInstance>> {
        self.snapshot()
            .and_then(|s| s.live.by_trip.get(trip_id).cloned())
            .unwrap_or_default()
    }

    fn trip_instances(&self) -> Arc<Vec<Arc<TripInstance>>> {
        self.snapshot()
            .map(|s| s.live.instances.clone())
            .unwrap_or_default()
    }

    fn stop_visits(&self, stop_id: &str, date: ServiceDate, window: TimeWindow) -> Vec<StopVisit> {
        let Some(snapshot) = self.snapshot() else {
            return Vec::new();
        };
        let Some(visits) = snapshot.live.visits.get(stop_id) else {
            return Vec::new();
        };

        visits
            .iter()
            .filter(|(inst, idx)| {
                inst.runs_on(date)
                    && inst.stop_times[*idx]
                        .effective_time()
                        .is_some_and(|t| window.contains(t))
            })
            .map(|(inst, idx)| StopVisit {
                instance: inst.clone(),
                index: *idx,
                service_date: date,
            })
            .collect()
    }

    fn route(&self, route_id: &str) -> Option<Arc<Route>> {
        self.snapshot()?.statics.routes.get(route_id).cloned()
    }

    fn routes(&self) -> Vec<Arc<Route>> {
        let Some(snapshot) = self.snapshot() else {
            return Vec::new();
        };
        let mut routes: Vec<Arc<Route>> = snapshot.statics.routes.values().cloned().collect();
        routes.sort_by(|a, b| a.route_id.cmp(&b.route_id));
        routes
    }

    fn shape(&self, shape_id: &str) -> Option<Arc<Vec<ShapePoint>>> {
        self.snapshot()?.statics.shapes.get(shape_id).cloned()
    }

    fn vehicle_positions(&self) -> Arc<Vec<VehiclePosition>> {
        self.snapshot()
            .map(|s| s.live.vehicle_positions.clone())
            .unwrap_or_default()
    }

    fn travel_trips(&self) -> Arc<Vec<Arc<TravelTrip>>> {
        self.snapshot()
            .map(|s| s.live.travel.clone())
            .unwrap_or_default()
    }

    fn run_series(&self, date: ServiceDate, series: &str) -> Option<RunSeries> {
        self.snapshot()?
            .statics
            .run_series
            .get(&(date, series.trim().to_ascii_uppercase()))
            .cloned()
    }

    fn counts(&self) -> DataCounts {
        self.snapshot()
            .map(|s| counts_of(&s))
            .unwrap_or_default()
    }

    fn load_static(&self) -> BoxFuture<'_, Result<(), ProviderError>> {
        Box::pin(self.run_refresh(RefreshKind::Static, async {
            let static_data = self.read_static().await?;
            let realtime = self.read_realtime().await?;
            Ok(Snapshot {
                statics: Arc::new(StaticIndex::build(static_data)),
                live: Arc::new(LiveIndex::build(realtime)),
            })
        }))
    }

    fn refresh_realtime(&self) -> BoxFuture<'_, Result<(), ProviderError>> {
        Box::pin(self.run_refresh(RefreshKind::Realtime, async {
            let statics = self
                .snapshot()
                .map(|s| s.statics.clone())
                .ok_or(ProviderError::NotLoaded)?;
            let realtime = self.read_realtime().await?;
            Ok(Snapshot {
                statics,
                live: Arc::new(LiveIndex::build(realtime)),
            })
        }))
    }

    fn subscribe(&self, listener: EventListener) {
        match self.listeners.lock() {
            Ok(mut guard) => guard.push(listener),
            Err(poisoned) => poisoned.into_inner().push(listener),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ServiceTime, StopTime};
    use std::collections::BTreeSet;

    fn date() -> ServiceDate {
        ServiceDate::parse("20240315").unwrap()
    }

    fn instance(id: &str, trip_id: &str, stops: &[(&str, u32)]) -> TripInstance {
        TripInstance {
            instance_id: id.into(),
            trip_id: trip_id.into(),
            route_id: "BNBR".into(),
            shape_id: None,
            run: "1A23".into(),
            stop_times: stops
                .iter()
                .enumerate()
                .map(|(i, (stop, mins))| {
                    let mut st = StopTime::new(i as u32 + 1, *stop);
                    st.scheduled_departure_time = Some(ServiceTime::from_secs(mins * 60));
                    st
                })
                .collect(),
            scheduled_dates: BTreeSet::from([date()]),
            actual_dates: BTreeSet::new(),
            calendar_dates: BTreeSet::new(),
            express_info: Vec::new(),
            run_series: None,
        }
    }

    fn static_data() -> StaticSnapshot {
        let mut platform = Stop::new("600029", "Central platform 1");
        platform.parent_station = Some(StopId::new("place_centr"));
        StaticSnapshot {
            stops: vec![
                Stop::new("place_centr", "Central station"),
                platform,
                Stop::new("place_bowen", "Bowen Hills station"),
            ],
            routes: vec![Route {
                route_id: "BNBR".into(),
                short_name: Some("BNBR".into()),
                long_name: None,
                color: None,
                text_color: None,
                route_type: Some(2),
            }],
            ..StaticSnapshot::default()
        }
    }

    fn realtime_data() -> RealtimeSnapshot {
        RealtimeSnapshot {
            trip_instances: vec![
                instance("i1", "t1", &[("600029", 600), ("place_bowen", 605)]),
                instance("i2", "t1", &[("600029", 700), ("place_bowen", 705)]),
            ],
            travel_trips: Vec::new(),
            vehicle_positions: Vec::new(),
        }
    }

    #[tokio::test]
    async fn nothing_visible_before_load() {
        let provider = SnapshotProvider::from_memory(static_data(), realtime_data());
        assert!(provider.stop("place_centr").is_none());
        assert_eq!(provider.counts(), DataCounts::default());
        assert!(provider.trip_instances().is_empty());
    }

    #[tokio::test]
    async fn load_indexes_stops_and_instances() {
        let provider = SnapshotProvider::from_memory(static_data(), realtime_data());
        provider.load_static().await.unwrap();

        assert_eq!(provider.stop("place_centr").unwrap().name, "Central station");
        let children = provider.child_stops("place_centr");
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].stop_id.as_str(), "600029");
        assert_eq!(provider.stations().len(), 2);
        assert_eq!(provider.trip_instances_for_trip("t1").len(), 2);
        assert!(provider.trip_instance("i2").is_some());
        assert!(provider.route("BNBR").is_some());

        let counts = provider.counts();
        assert_eq!(counts.trips, 2);
        assert_eq!(counts.stops, 3);
        assert_eq!(counts.routes, 1);
    }

    #[tokio::test]
    async fn shapes_routes_and_positions() {
        let point = |shape_id: &str, sequence| ShapePoint {
            shape_id: shape_id.into(),
            lat: -27.0,
            lon: 153.0,
            sequence,
            dist_traveled: None,
        };
        let mut statics = static_data();
        statics.shapes = vec![point("s1", 3), point("s2", 1), point("s1", 1), point("s1", 2)];
        statics.routes.insert(0, Route {
            route_id: "SHCA".into(),
            ..statics.routes[0].clone()
        });
        let mut realtime = realtime_data();
        realtime.vehicle_positions = vec![VehiclePosition {
            vehicle_id: "IMU100".into(),
            trip_id: Some("t1".into()),
            start_date: None,
            lat: None,
            lon: None,
            bearing: None,
        }];
        let provider = SnapshotProvider::from_memory(statics, realtime);
        assert!(provider.shape("s1").is_none());
        provider.load_static().await.unwrap();

        let s1 = provider.shape("s1").unwrap();
        assert_eq!(s1.iter().map(|p| p.sequence).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(provider.shape("s3").is_none());
        assert_eq!(
            provider.routes().iter().map(|r| r.route_id.as_str()).collect::<Vec<_>>(),
            vec!["BNBR", "SHCA"]
        );
        assert_eq!(provider.vehicle_positions().len(), 1);

        let counts = provider.counts();
        assert_eq!(counts.shapes, 2);
        assert_eq!(counts.vehicle_positions, 1);
    }

    #[tokio::test]
    async fn stop_visits_filter_by_date_and_window() {
        let provider = SnapshotProvider::from_memory(static_data(), realtime_data());
        provider.load_static().await.unwrap();

        let window = TimeWindow::new(ServiceTime::from_secs(600 * 60), ServiceTime::from_secs(650 * 60));
        let visits = provider.stop_visits("600029", date(), window);
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].instance.instance_id, "i1");
        assert_eq!(visits[0].index, 0);

        let other_day = date().succ();
        assert!(provider.stop_visits("600029", other_day, window).is_empty());
    }

    #[tokio::test]
    async fn realtime_refresh_requires_static_load() {
        let provider = SnapshotProvider::from_memory(static_data(), realtime_data());
        let err = provider.refresh_realtime().await.unwrap_err();
        assert!(matches!(err, ProviderError::NotLoaded));
    }

    #[tokio::test]
    async fn events_bracket_each_refresh() {
        let provider = SnapshotProvider::from_memory(static_data(), realtime_data());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        provider.subscribe(Arc::new(move |e: &ProviderEvent| {
            sink.lock().unwrap().push(e.clone());
        }));

        provider.refresh_realtime().await.unwrap_err();
        provider.load_static().await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                ProviderEvent::Started(RefreshKind::Realtime),
                ProviderEvent::Failed(RefreshKind::Realtime, "static data has not been loaded".into()),
                ProviderEvent::Started(RefreshKind::Static),
                ProviderEvent::Finished(RefreshKind::Static),
            ]
        );
    }

    #[tokio::test]
    async fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(STATIC_FILE),
            serde_json::to_vec(&static_data()).unwrap(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join(REALTIME_FILE),
            serde_json::to_vec(&realtime_data()).unwrap(),
        )
        .unwrap();

        let provider = SnapshotProvider::from_dir(dir.path());
        provider.load_static().await.unwrap();
        assert_eq!(provider.counts().trips, 2);
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(STATIC_FILE),
            serde_json::to_vec(&static_data()).unwrap(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join(REALTIME_FILE),
            serde_json::to_vec(&realtime_data()).unwrap(),
        )
        .unwrap();

        let provider = SnapshotProvider::from_dir(dir.path());
        provider.load_static().await.unwrap();

        std::fs::write(dir.path().join(REALTIME_FILE), b"{not json").unwrap();
        let err = provider.refresh_realtime().await.unwrap_err();
        assert!(matches!(err, ProviderError::Json { .. }));
        assert_eq!(provider.counts().trips, 2);
    }

    #[tokio::test]
    async fn missing_directory_fails_with_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = SnapshotProvider::from_dir(dir.path().join("absent"));
        let err = provider.load_static().await.unwrap_err();
        assert!(matches!(err, ProviderError::Io { .. }));
        assert!(provider.stop("place_centr").is_none());
    }
}
