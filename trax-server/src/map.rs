//! The live vehicle map.
//!
//! Vehicle position reports are joined to the trip instances they run,
//! then summarised: the routes they touch, those routes' shapes coloured
//! for drawing, and the station most of the running trips call at.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::domain::{Route, ServiceDate, ShapePoint, Stop, StopId, TripInstance, VehiclePosition};
use crate::provider::DataProvider;

/// Colour of a shape whose route has none.
pub const DEFAULT_SHAPE_COLOR: &str = "#0000FF";

/// A vehicle with the trip instance it is running, when known.
#[derive(Debug, Clone, Serialize)]
pub struct MappedVehicle {
    #[serde(flatten)]
    pub position: VehiclePosition,
    pub trip_instance: Option<Arc<TripInstance>>,
}

/// A shape point with the colour to draw it in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColoredPoint {
    #[serde(flatten)]
    pub point: ShapePoint,
    /// `#RRGGBB`.
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VehicleMap {
    pub vehicles: Vec<MappedVehicle>,
    /// By shape id.
    pub shapes: BTreeMap<String, Vec<ColoredPoint>>,
    /// The station called at by the most running trip instances.
    pub busiest_station: Option<Arc<Stop>>,
    pub stations: Vec<Arc<Stop>>,
    /// Routes of the running instances, by route id.
    pub routes: BTreeMap<String, Arc<Route>>,
}

/// The instance a vehicle is running: its trip's instance on the reported
/// service date (or `today` when none is reported), else any instance of
/// the trip.
pub fn vehicle_instance(
    provider: &dyn DataProvider,
    position: &VehiclePosition,
    today: ServiceDate,
) -> Option<Arc<TripInstance>> {
    let trip_id = position.trip_id.as_deref()?;
    let instances = provider.trip_instances_for_trip(trip_id);
    let date = position.start_date.unwrap_or(today);
    instances
        .iter()
        .find(|i| i.runs_on(date))
        .or_else(|| instances.first())
        .cloned()
}

/// Hex colour of a route for drawing, with the leading `#`.
pub fn route_color(route: Option<&Route>) -> String {
    route
        .and_then(|r| r.color.as_deref())
        .filter(|c| !c.is_empty())
        .map_or_else(|| DEFAULT_SHAPE_COLOR.to_string(), |c| format!("#{c}"))
}

/// Build the vehicle map from the provider's latest position reports.
///
/// Reports without a trip, or whose trip is not in the schedule, are left
/// off the map.
pub fn vehicle_map(provider: &dyn DataProvider, today: ServiceDate) -> VehicleMap {
    let vehicles: Vec<MappedVehicle> = provider
        .vehicle_positions()
        .iter()
        .filter(|vp| {
            vp.trip_id
                .as_deref()
                .is_some_and(|id| !provider.trip_instances_for_trip(id).is_empty())
        })
        .map(|vp| MappedVehicle {
            position: vp.clone(),
            trip_instance: vehicle_instance(provider, vp, today),
        })
        .collect();

    let running = || vehicles.iter().filter_map(|v| v.trip_instance.as_deref());

    let mut station_counts: HashMap<&StopId, usize> = HashMap::new();
    for stop_time in running().flat_map(|i| i.stop_times.iter()) {
        for id in [&stop_time.actual_stop_id, &stop_time.actual_parent_station_id]
            .into_iter()
            .flatten()
        {
            *station_counts.entry(id).or_default() += 1;
        }
    }
    // Ties go to the lowest stop id
    let busiest_station = station_counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .and_then(|(id, _)| provider.stop(id.as_str()));

    let mut routes = BTreeMap::new();
    let mut shape_routes: BTreeMap<&str, &str> = BTreeMap::new();
    for instance in running() {
        if !routes.contains_key(&instance.route_id) {
            if let Some(route) = provider.route(&instance.route_id) {
                routes.insert(instance.route_id.clone(), route);
            }
        }
        if let Some(shape_id) = instance.shape_id.as_deref() {
            shape_routes.entry(shape_id).or_insert(&instance.route_id);
        }
    }

    let mut shapes = BTreeMap::new();
    for (shape_id, route_id) in shape_routes {
        let Some(points) = provider.shape(shape_id) else {
            continue;
        };
        let color = route_color(routes.get(route_id).map(Arc::as_ref));
        let colored = points
            .iter()
            .map(|point| ColoredPoint {
                point: point.clone(),
                color: color.clone(),
            })
            .collect();
        shapes.insert(shape_id.to_string(), colored);
    }

    debug!(
        vehicles = vehicles.len(),
        shapes = shapes.len(),
        routes = routes.len(),
        "built vehicle map"
    );
    VehicleMap {
        vehicles,
        shapes,
        busiest_station,
        stations: provider.stations(),
        routes,
    }
}
