//! The engine facade: every caller-facing operation, gated on load state.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::cache::{BoardCache, CacheConfig};
use crate::config::EngineConfig;
use crate::departures::{BoardRequest, StopBoard, stop_board};
use crate::domain::{
    Route, RunSeries, ServiceDate, ShapePoint, Stop, StopId, TravelTrip, TripInstance,
};
use crate::error::CoreError;
use crate::express::{express_string, stop_display_name};
use crate::load::{LoadPhase, LoadStateMachine, RefreshDriver};
use crate::map::{VehicleMap, vehicle_map};
use crate::provider::{DataCounts, DataProvider, ProviderEvent, RefreshKind};
use crate::search::{SearchOptions, SearchQuery, SearchResults, search_options, search_trips};

/// Longest departure look-ahead a caller may ask for.
pub const MAX_HORIZON_HOURS: u32 = 24;

/// A trip instance with what is needed to display it.
#[derive(Debug, Clone, Serialize)]
pub struct TripDetails {
    pub instance: TripInstance,
    pub route: Option<Arc<Route>>,
    /// Stops the instance touches, by stop id.
    pub stops: BTreeMap<String, Arc<Stop>>,
    pub express_string: String,
    pub is_leader: bool,
}

/// A run series with its trips' stopping patterns and routes.
#[derive(Debug, Clone, Serialize)]
pub struct RunSeriesDetails {
    pub series: RunSeries,
    /// By trip id.
    pub express_strings: BTreeMap<String, String>,
    /// By route id.
    pub routes: BTreeMap<String, Arc<Route>>,
}

/// Health of the engine. Available in every load phase.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub phase: LoadPhase,
    pub generation: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
    pub last_static_refresh: Option<DateTime<Utc>>,
    pub last_realtime_refresh: Option<DateTime<Utc>>,
    pub last_failure: Option<String>,
    pub counts: DataCounts,
    pub board_cache_entries: u64,
}

/// Departure aggregation and trip search over a data provider.
pub struct TraxEngine {
    provider: Arc<dyn DataProvider>,
    driver: RefreshDriver,
    cache: Arc<BoardCache>,
    config: EngineConfig,
}

impl TraxEngine {
    pub fn new(provider: Arc<dyn DataProvider>, config: EngineConfig) -> Self {
        let driver = RefreshDriver::new(
            Arc::new(LoadStateMachine::new()),
            Arc::clone(&provider),
            config.realtime_interval,
            config.static_interval,
        );
        let cache = Arc::new(BoardCache::new(&CacheConfig {
            ttl: config.board_cache_ttl,
            max_capacity: config.board_cache_capacity,
        }));

        // A static reload replaces everything; drop old entries at once
        let listener_cache = Arc::clone(&cache);
        provider.subscribe(Arc::new(move |event: &ProviderEvent| {
            if *event == ProviderEvent::Finished(RefreshKind::Static) {
                listener_cache.invalidate_all();
            }
        }));

        Self {
            provider,
            driver,
            cache,
            config,
        }
    }

    pub fn driver(&self) -> &RefreshDriver {
        &self.driver
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current time on the network's local clock.
    pub fn local_now(&self) -> NaiveDateTime {
        Utc::now()
            .with_timezone(&self.config.utc_offset())
            .naive_local()
    }

    /// The service date of today on the network's local clock.
    pub fn today(&self) -> ServiceDate {
        ServiceDate::new(self.local_now().date())
    }

    /// Departures from `stop_id` over the next `hours` (the configured
    /// horizon when `None`).
    pub fn departures_for_stop(
        &self,
        stop_id: &str,
        hours: Option<u32>,
        extra_details: bool,
    ) -> Result<StopBoard, CoreError> {
        self.departures_at(stop_id, self.local_now(), hours, extra_details)
    }

    /// As [`Self::departures_for_stop`], at a given local time.
    pub fn departures_at(
        &self,
        stop_id: &str,
        now: NaiveDateTime,
        hours: Option<u32>,
        extra_details: bool,
    ) -> Result<StopBoard, CoreError> {
        self.driver.ensure_ready()?;
        let horizon_hours = hours
            .unwrap_or(self.config.horizon_hours)
            .min(MAX_HORIZON_HOURS);
        let generation = self.driver.machine().generation();
        stop_board(
            self.provider.as_ref(),
            Some((self.cache.as_ref(), generation)),
            &BoardRequest {
                stop_id,
                now,
                horizon_hours,
                extra_details,
            },
        )
    }

    pub fn search_trips(&self, query: &SearchQuery) -> Result<SearchResults, CoreError> {
        self.driver.ensure_ready()?;
        search_trips(self.provider.as_ref(), query)
    }

    /// Stations, dates and route names for the search form.
    pub fn search_options(&self) -> Result<SearchOptions, CoreError> {
        self.driver.ensure_ready()?;
        Ok(search_options(self.provider.as_ref(), self.today()))
    }

    /// Points of a shape in sequence order. An empty shape is not found.
    pub fn shape(&self, shape_id: &str) -> Result<Arc<Vec<ShapePoint>>, CoreError> {
        self.driver.ensure_ready()?;
        self.provider
            .shape(shape_id)
            .filter(|points| !points.is_empty())
            .ok_or_else(|| CoreError::not_found("shape", shape_id))
    }

    /// Vehicles running now, joined to their trips.
    pub fn vehicle_map(&self) -> Result<VehicleMap, CoreError> {
        self.driver.ensure_ready()?;
        Ok(vehicle_map(self.provider.as_ref(), self.today()))
    }

    /// One trip instance. Passing visits are dropped unless `extra_details`.
    pub fn trip_instance(
        &self,
        instance_id: &str,
        extra_details: bool,
    ) -> Result<TripDetails, CoreError> {
        self.driver.ensure_ready()?;
        let shared = self
            .provider
            .trip_instance(instance_id)
            .ok_or_else(|| CoreError::not_found("trip instance", instance_id))?;

        let provider = self.provider.as_ref();
        let mut stops = BTreeMap::new();
        for stop_id in shared.stop_times.iter().flat_map(|st| st.touched_stop_ids()) {
            if let Some(stop) = provider.stop(stop_id.as_str()) {
                stops.entry(stop_id.to_string()).or_insert(stop);
            }
        }
        let express = express_string(&shared.express_info, None, |id| {
            stop_display_name(provider, id)
        });

        let mut instance = TripInstance::clone(&shared);
        if !extra_details {
            instance.stop_times.retain(|st| !st.passing);
        }
        Ok(TripDetails {
            route: provider.route(&instance.route_id),
            stops,
            express_string: express,
            is_leader: instance.is_leader(),
            instance,
        })
    }

    /// Every dated instance of a scheduled trip.
    pub fn trip_instances_for_trip(
        &self,
        trip_id: &str,
    ) -> Result<Vec<Arc<TripInstance>>, CoreError> {
        self.driver.ensure_ready()?;
        let instances = self.provider.trip_instances_for_trip(trip_id);
        if instances.is_empty() {
            return Err(CoreError::not_found("trip", trip_id));
        }
        Ok(instances)
    }

    /// A travel-feed service. Passed stops are hidden unless `extra_details`.
    pub fn travel_service(
        &self,
        service_id: &str,
        extra_details: bool,
    ) -> Result<TravelTrip, CoreError> {
        self.driver.ensure_ready()?;
        let trips = self.provider.travel_trips();
        let trip = trips
            .iter()
            .find(|t| t.service_id == service_id)
            .ok_or_else(|| CoreError::not_found("travel service", service_id))?;
        Ok(if extra_details {
            TravelTrip::clone(trip)
        } else {
            trip.without_passing()
        })
    }

    /// A run series. Vehicle sightings are cleared unless `extra_details`.
    pub fn run_series(
        &self,
        date: ServiceDate,
        series: &str,
        extra_details: bool,
    ) -> Result<RunSeriesDetails, CoreError> {
        self.driver.ensure_ready()?;
        let provider = self.provider.as_ref();
        let mut series_data = provider
            .run_series(date, series)
            .ok_or_else(|| CoreError::not_found("run series", format!("{date}/{series}")))?;
        if !extra_details {
            series_data.vehicle_sightings.clear();
        }

        let mut express_strings = BTreeMap::new();
        let mut routes = BTreeMap::new();
        for trip in &series_data.trips {
            let instance = trip
                .instance_id
                .as_deref()
                .and_then(|id| provider.trip_instance(id))
                .or_else(|| provider.trip_instances_for_trip(&trip.trip_id).into_iter().next());
            let Some(instance) = instance else {
                continue;
            };
            express_strings.insert(
                trip.trip_id.clone(),
                express_string(&instance.express_info, None, |id: &StopId| {
                    stop_display_name(provider, id)
                }),
            );
            if let Some(route) = provider.route(&instance.route_id) {
                routes.insert(instance.route_id.clone(), route);
            }
        }

        Ok(RunSeriesDetails {
            series: series_data,
            express_strings,
            routes,
        })
    }

    pub fn system_status(&self) -> SystemStatus {
        let machine = self.driver.machine();
        let status = machine.status();
        let started_at = machine.started_at();
        SystemStatus {
            phase: status.phase,
            generation: status.generation,
            started_at,
            uptime_secs: (Utc::now() - started_at).num_seconds(),
            last_static_refresh: status.last_static_refresh,
            last_realtime_refresh: status.last_realtime_refresh,
            last_failure: status.last_failure,
            counts: self.provider.counts(),
            board_cache_entries: self.cache.entry_count(),
        }
    }
}
