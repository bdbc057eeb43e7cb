//! Choices offered by the search form.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;

use crate::domain::{RouteCode, ServiceDate, Stop};
use crate::provider::DataProvider;

/// Route type of rail services.
pub const RAIL_ROUTE_TYPE: u16 = 2;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchOptions {
    /// Top-level stations, by name.
    pub stations: Vec<Arc<Stop>>,
    /// Scheduled service dates from today on, ascending.
    pub dates: Vec<ServiceDate>,
    /// Route half (`"BN"`) to the line name at that end.
    pub routes: BTreeMap<String, String>,
    /// Route code (`"BNBR"`) to the route's full name.
    pub route_pairs: BTreeMap<String, String>,
}

/// Gather the search form's choices.
///
/// Route names come from rail routes only. A long name reads
/// `"<from line> - <to line>"`; each side names the matching half of the
/// short name.
pub fn search_options(provider: &dyn DataProvider, today: ServiceDate) -> SearchOptions {
    let dates: BTreeSet<ServiceDate> = provider
        .trip_instances()
        .iter()
        .flat_map(|i| i.scheduled_dates.iter().copied())
        .filter(|d| *d >= today)
        .collect();

    let mut routes = BTreeMap::new();
    let mut route_pairs = BTreeMap::new();
    for route in provider.routes() {
        if route.route_type != Some(RAIL_ROUTE_TYPE) {
            continue;
        }
        let (Some(short), Some(long)) = (route.short_name.as_deref(), route.long_name.as_deref())
        else {
            continue;
        };
        if short.is_empty() || long.is_empty() {
            continue;
        }

        let code = RouteCode::of(short);
        let names = long.split('-').map(str::trim);
        for (half, name) in [code.from_half(), code.to_half()].into_iter().zip(names) {
            if !half.is_empty() && !name.is_empty() {
                routes.insert(half.to_string(), name.to_string());
            }
        }
        route_pairs.insert(short.to_string(), long.to_string());
    }

    SearchOptions {
        stations: provider.stations(),
        dates: dates.into_iter().collect(),
        routes,
        route_pairs,
    }
}
