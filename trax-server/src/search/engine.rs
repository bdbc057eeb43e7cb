//! Filtering, date expansion, ordering and paging of trip instances.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::domain::{Route, ServiceDate, Stop, TripInstance};
use crate::error::CoreError;
use crate::express::{express_string, stop_display_name};
use crate::provider::DataProvider;

use super::query::{DateMode, PAGE_SIZE, SearchQuery};

/// One result row: an instance, or one date of it when dates are expanded.
#[derive(Debug, Clone)]
pub struct SearchRow {
    pub instance: Arc<TripInstance>,
    /// The single date of an expanded row.
    pub service_date: Option<ServiceDate>,
}

impl SearchRow {
    /// Earliest date of the row under `mode`.
    fn first_date(&self, mode: DateMode) -> Option<ServiceDate> {
        self.service_date
            .or_else(|| mode.dates(&self.instance).first().copied())
    }

    /// The instance as returned to the caller: date sets narrowed to the
    /// row's date, and passing visits dropped unless `extra_details`.
    fn materialize(&self, extra_details: bool) -> TripInstance {
        let mut instance = TripInstance::clone(&self.instance);
        if let Some(date) = self.service_date {
            instance.scheduled_dates.retain(|d| *d == date);
            instance.actual_dates.retain(|d| *d == date);
            instance.calendar_dates.retain(|d| *d == date);
        }
        if !extra_details {
            instance.stop_times.retain(|st| !st.passing);
        }
        instance
    }
}

/// A returned result row.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub instance: TripInstance,
    pub service_date: Option<ServiceDate>,
    pub is_leader: bool,
}

/// One page of search results.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub trips: Vec<SearchHit>,
    /// Rows matching the query, after date expansion, before paging.
    pub total_count: usize,
    pub total_pages: usize,
    pub page: usize,
    pub per_page: usize,
    /// More than one page of results.
    pub concatenated: bool,
    /// Stops touched by the returned rows, by stop id.
    pub stations: BTreeMap<String, Arc<Stop>>,
    /// Stopping-pattern descriptions of the returned rows, by instance id.
    pub express_strings: BTreeMap<String, String>,
    /// Routes of the returned rows, by route id.
    pub routes: BTreeMap<String, Arc<Route>>,
}

fn first_char_matches(s: &str, index: usize, wanted: char) -> bool {
    s.trim()
        .chars()
        .nth(index)
        .is_some_and(|c| c.to_lowercase().eq(wanted.to_lowercase()))
}

/// Whether `instance` satisfies every non-empty field of `query`.
pub fn matches(query: &SearchQuery, instance: &TripInstance) -> bool {
    if let Some(start) = &query.start_station {
        if !instance
            .first_stop_time()
            .is_some_and(|st| st.serves_scheduled(start))
        {
            return false;
        }
    }
    if let Some(end) = &query.end_station {
        if !instance
            .last_stop_time()
            .is_some_and(|st| st.serves_scheduled(end))
        {
            return false;
        }
    }
    let calls_at = |station: &String| {
        instance
            .stop_times
            .iter()
            .any(|st| !st.passing && st.serves_scheduled(station))
    };
    if !query.intermediate_stations.iter().all(calls_at) {
        return false;
    }

    let code = instance.route_code();
    if let Some(pair) = &query.route_pair {
        if !code.matches_pair(pair, query.route_pair_reversible) {
            return false;
        }
    }
    if query.route.as_deref().is_some_and(|r| !code.contains(r))
        || query.route_start.as_deref().is_some_and(|r| code.from_half() != r)
        || query.route_end.as_deref().is_some_and(|r| code.to_half() != r)
    {
        return false;
    }

    let dates = query.date_mode.dates(instance);
    if !query.service_dates.iter().all(|d| dates.contains(d)) {
        return false;
    }

    if query
        .train_number_type
        .is_some_and(|c| !first_char_matches(&instance.run, 0, c))
        || query
            .train_number_destination
            .is_some_and(|c| !first_char_matches(&instance.run, 1, c))
    {
        return false;
    }
    if query
        .train_number
        .is_some_and(|p| !p.matches(&instance.run))
    {
        return false;
    }

    query.leader.admits(instance.is_leader())
}

/// Filter, expand and sort `instances` into result rows.
pub fn matching_rows(instances: &[Arc<TripInstance>], query: &SearchQuery) -> Vec<SearchRow> {
    let matched = instances.iter().filter(|inst| matches(query, inst));

    let mut rows: Vec<SearchRow> = if query.expand_dates {
        matched
            .flat_map(|inst| {
                query.date_mode.dates(inst).iter().map(|date| SearchRow {
                    instance: Arc::clone(inst),
                    service_date: Some(*date),
                })
            })
            .filter(|row| {
                query.service_dates.is_empty()
                    || row
                        .service_date
                        .is_some_and(|d| query.service_dates.contains(&d))
            })
            .collect()
    } else {
        matched
            .map(|inst| SearchRow {
                instance: Arc::clone(inst),
                service_date: None,
            })
            .collect()
    };

    let mode = query.date_mode;
    rows.sort_by(|a, b| {
        let departure = |row: &SearchRow| {
            row.instance
                .first_stop_time()
                .and_then(|st| st.scheduled_departure_time)
                .map_or(0, |t| t.secs())
        };
        a.first_date(mode)
            .cmp(&b.first_date(mode))
            .then_with(|| departure(a).cmp(&departure(b)))
            .then_with(|| a.instance.run.cmp(&b.instance.run))
    });
    rows
}

/// Run a search over every trip instance of `provider`.
pub fn search_trips(
    provider: &dyn DataProvider,
    query: &SearchQuery,
) -> Result<SearchResults, CoreError> {
    if query.page == 0 {
        return Err(CoreError::invalid("page", "must be a positive integer"));
    }

    let rows = matching_rows(&provider.trip_instances(), query);
    let total_count = rows.len();
    let total_pages = total_count.div_ceil(PAGE_SIZE);
    let page_rows: Vec<&SearchRow> = rows
        .iter()
        .skip((query.page - 1).saturating_mul(PAGE_SIZE))
        .take(PAGE_SIZE)
        .collect();

    let mut stations: BTreeMap<String, Arc<Stop>> = BTreeMap::new();
    let mut express_strings: BTreeMap<String, String> = BTreeMap::new();
    let mut routes: BTreeMap<String, Arc<Route>> = BTreeMap::new();
    for row in &page_rows {
        let inst = &row.instance;
        for stop_id in inst.stop_times.iter().flat_map(|st| st.touched_stop_ids()) {
            if !stations.contains_key(stop_id.as_str()) {
                if let Some(stop) = provider.stop(stop_id.as_str()) {
                    stations.insert(stop_id.to_string(), stop);
                }
            }
        }
        express_strings
            .entry(inst.instance_id.clone())
            .or_insert_with(|| {
                express_string(&inst.express_info, None, |id| stop_display_name(provider, id))
            });
        if !routes.contains_key(&inst.route_id) {
            if let Some(route) = provider.route(&inst.route_id) {
                routes.insert(inst.route_id.clone(), route);
            }
        }
    }

    let trips = page_rows
        .iter()
        .map(|row| SearchHit {
            instance: row.materialize(query.extra_details),
            service_date: row.service_date,
            is_leader: row.instance.is_leader(),
        })
        .collect();

    debug!(total_count, page = query.page, "trip search");
    Ok(SearchResults {
        trips,
        total_count,
        total_pages,
        page: query.page,
        per_page: PAGE_SIZE,
        concatenated: total_count > PAGE_SIZE,
        stations,
        express_strings,
        routes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ServiceTime, StopTime, TrainNumberPattern};
    use crate::provider::{RealtimeSnapshot, SnapshotProvider, StaticSnapshot};
    use crate::search::query::{LeaderFilter, SearchParams};
    use std::collections::BTreeSet;

    fn date(s: &str) -> ServiceDate {
        ServiceDate::parse(s).unwrap()
    }

    struct Builder(TripInstance);

    impl Builder {
        fn new(id: &str, route_id: &str, run: &str, stops: &[&str]) -> Self {
            Self(TripInstance {
                instance_id: id.into(),
                trip_id: format!("trip-{id}"),
                route_id: route_id.into(),
                shape_id: None,
                run: run.into(),
                stop_times: stops
                    .iter()
                    .enumerate()
                    .map(|(i, s)| StopTime::new(i as u32 + 1, format!("{s}-1")).with_parent(*s))
                    .collect(),
                scheduled_dates: BTreeSet::from([date("20240315")]),
                actual_dates: BTreeSet::new(),
                calendar_dates: BTreeSet::new(),
                express_info: Vec::new(),
                run_series: None,
            })
        }

        fn departs(mut self, secs: u32) -> Self {
            self.0.stop_times[0].scheduled_departure_time = Some(ServiceTime::from_secs(secs));
            self
        }

        fn scheduled(mut self, dates: &[&str]) -> Self {
            self.0.scheduled_dates = dates.iter().map(|d| date(d)).collect();
            self
        }

        fn actual(mut self, dates: &[&str]) -> Self {
            self.0.actual_dates = dates.iter().map(|d| date(d)).collect();
            self
        }

        fn series(mut self, series: &str) -> Self {
            self.0.run_series = Some(series.into());
            self
        }

        fn build(self) -> Arc<TripInstance> {
            Arc::new(self.0)
        }
    }

    fn query(pairs: &[(&str, &str)]) -> SearchQuery {
        SearchQuery::parse(&SearchParams::from_pairs(pairs.iter().copied())).unwrap()
    }

    fn ids(rows: &[SearchRow]) -> Vec<&str> {
        rows.iter().map(|r| r.instance.instance_id.as_str()).collect()
    }

    #[test]
    fn empty_query_matches_everything() {
        let instances = vec![
            Builder::new("a", "BNBR", "1A23", &["A", "B"]).build(),
            Builder::new("b", "CAIP", "2B45", &["C", "D"]).build(),
        ];
        assert_eq!(matching_rows(&instances, &SearchQuery::default()).len(), 2);
    }

    #[test]
    fn station_filters_use_scheduled_stop_or_parent() {
        let instances = vec![
            Builder::new("ab", "BNBR", "1A23", &["A", "X", "B"]).build(),
            Builder::new("ba", "BRBN", "1A24", &["B", "X", "A"]).build(),
        ];
        assert_eq!(ids(&matching_rows(&instances, &query(&[("start-station", "A")]))), vec!["ab"]);
        assert_eq!(ids(&matching_rows(&instances, &query(&[("start-station", "A-1")]))), vec!["ab"]);
        assert_eq!(ids(&matching_rows(&instances, &query(&[("end-station", "A")]))), vec!["ba"]);
        assert_eq!(matching_rows(&instances, &query(&[("intermediate-station", "X")])).len(), 2);
    }

    #[test]
    fn intermediate_station_must_be_served() {
        let mut passing = Builder::new("passes", "BNBR", "1A23", &["A", "X", "B"]);
        passing.0.stop_times[1].passing = true;
        let instances = vec![
            passing.build(),
            Builder::new("stops", "BNBR", "1A24", &["A", "X", "B"]).build(),
        ];
        let q = query(&[("intermediate-station-1", "X"), ("intermediate-station-2", "B")]);
        assert_eq!(ids(&matching_rows(&instances, &q)), vec!["stops"]);
    }

    #[test]
    fn route_filters_are_all_applied() {
        let instances = vec![
            Builder::new("abcd", "ABCD-1", "1A23", &["A"]).build(),
            Builder::new("cdab", "CDAB-1", "1A24", &["A"]).build(),
            Builder::new("abef", "ABEF-1", "1A25", &["A"]).build(),
        ];
        let pair = |reversible: &str| query(&[("route-pair", "ABCD"), ("route-pair-reversible", reversible)]);
        assert_eq!(ids(&matching_rows(&instances, &pair("off"))), vec!["abcd"]);
        assert_eq!(ids(&matching_rows(&instances, &pair("on"))), vec!["abcd", "cdab"]);

        assert_eq!(ids(&matching_rows(&instances, &query(&[("route", "BC")]))), vec!["abcd"]);
        assert_eq!(ids(&matching_rows(&instances, &query(&[("route-start", "AB")]))), vec!["abcd", "abef"]);
        assert_eq!(ids(&matching_rows(&instances, &query(&[("route-end", "AB")]))), vec!["cdab"]);

        // A matching pair does not bypass the other route predicates
        let q = query(&[
            ("route-pair", "ABCD"),
            ("route-pair-reversible", "on"),
            ("route-start", "CD"),
        ]);
        assert_eq!(ids(&matching_rows(&instances, &q)), vec!["cdab"]);
    }

    #[test]
    fn train_number_filters() {
        let instances = vec![
            Builder::new("a", "BNBR", "1234", &["A"]).build(),
            Builder::new("b", "BNBR", "1299", &["A"]).build(),
            Builder::new("c", "BNBR", "A234", &["A"]).build(),
            Builder::new("d", "BNBR", "123", &["A"]).build(),
        ];
        assert_eq!(ids(&matching_rows(&instances, &query(&[("train-number", "12..")]))), vec!["a", "b"]);
        assert_eq!(ids(&matching_rows(&instances, &query(&[("train-number-type", "a")]))), vec!["c"]);
        assert_eq!(
            ids(&matching_rows(&instances, &query(&[("train-number-destination", "2")]))),
            vec!["d", "a", "b", "c"]
        );
    }

    #[test]
    fn date_modes() {
        let instances = vec![
            Builder::new("sch", "BNBR", "1A23", &["A"]).scheduled(&["20240315"]).build(),
            Builder::new("rt", "BNBR", "1A24", &["A"])
                .scheduled(&["20240316"])
                .actual(&["20240315"])
                .build(),
        ];
        let on_15th = |mode: &str| query(&[("service-date", "20240315"), ("date-mode", mode)]);
        assert_eq!(ids(&matching_rows(&instances, &on_15th("actual_sch"))), vec!["sch"]);
        assert_eq!(ids(&matching_rows(&instances, &on_15th("actual_rt"))), vec!["rt"]);
        // No calendar dates: static mode falls back to scheduled dates
        assert_eq!(ids(&matching_rows(&instances, &on_15th("static"))), vec!["sch"]);
    }

    #[test]
    fn leader_filter() {
        let instances = vec![
            Builder::new("lead", "BNBR", "1A23", &["A"]).series("1A23").build(),
            Builder::new("follow", "BNBR", "1A24", &["A"]).series("1A23").build(),
            Builder::new("alone", "BNBR", "1A25", &["A"]).build(),
        ];
        let q = |v: &str| SearchQuery {
            leader: LeaderFilter::parse(v).unwrap(),
            ..SearchQuery::default()
        };
        assert_eq!(ids(&matching_rows(&instances, &q("only"))), vec!["lead", "alone"]);
        assert_eq!(ids(&matching_rows(&instances, &q("exclude"))), vec!["follow"]);
    }

    #[test]
    fn sort_by_date_then_departure_then_run() {
        let instances = vec![
            Builder::new("late-day", "BNBR", "1A00", &["A"]).scheduled(&["20240316"]).departs(100).build(),
            Builder::new("late-time", "BNBR", "1A00", &["A"]).departs(2000).build(),
            Builder::new("run-b", "BNBR", "1B00", &["A"]).departs(1000).build(),
            Builder::new("run-a", "BNBR", "1A00", &["A"]).departs(1000).build(),
            Builder::new("no-time", "BNBR", "9Z99", &["A"]).build(),
        ];
        assert_eq!(
            ids(&matching_rows(&instances, &SearchQuery::default())),
            vec!["no-time", "run-a", "run-b", "late-time", "late-day"]
        );
    }

    #[test]
    fn expansion_yields_one_row_per_date() {
        let instances = vec![
            Builder::new("three", "BNBR", "1A23", &["A"])
                .scheduled(&["20240315", "20240316", "20240317"])
                .build(),
            Builder::new("one", "BNBR", "1A24", &["A"]).scheduled(&["20240316"]).build(),
        ];

        let rows = matching_rows(&instances, &query(&[("expand-dates", "on")]));
        let dates: Vec<(String, String)> = rows
            .iter()
            .map(|r| (r.instance.instance_id.clone(), r.service_date.unwrap().to_string()))
            .collect();
        assert_eq!(
            dates,
            vec![
                ("three".to_string(), "20240315".to_string()),
                ("three".to_string(), "20240316".to_string()),
                ("one".to_string(), "20240316".to_string()),
                ("three".to_string(), "20240317".to_string()),
            ]
        );

        let narrowed = rows[0].materialize(true);
        assert_eq!(narrowed.scheduled_dates, BTreeSet::from([date("20240315")]));

        let rows = matching_rows(
            &instances,
            &query(&[("expand-dates", "on"), ("service-date", "20240316")]),
        );
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.service_date == Some(date("20240316"))));
    }

    async fn provider(instances: Vec<Arc<TripInstance>>) -> SnapshotProvider {
        let provider = SnapshotProvider::from_memory(
            StaticSnapshot {
                stops: vec![Stop::new("A", "Alpha station"), Stop::new("B", "Beta station")],
                routes: vec![Route {
                    route_id: "ABCD-1".into(),
                    short_name: None,
                    long_name: Some("Alpha - Beta".into()),
                    color: None,
                    text_color: None,
                    route_type: Some(2),
                }],
                ..StaticSnapshot::default()
            },
            RealtimeSnapshot {
                trip_instances: instances.iter().map(|i| TripInstance::clone(i)).collect(),
                ..RealtimeSnapshot::default()
            },
        );
        provider.load_static().await.unwrap();
        provider
    }

    #[tokio::test]
    async fn second_page_of_forty_five() {
        // Interleave non-matching instances and shuffle departure order
        let mut instances = Vec::new();
        for i in 0..45u32 {
            let secs = (i * 37 % 45) * 60;
            instances.push(
                Builder::new(&format!("m{i:02}"), "ABCD-1", &format!("1A{i:02}"), &["A", "B"])
                    .departs(secs)
                    .build(),
            );
            instances.push(Builder::new(&format!("x{i:02}"), "CDAB-1", "1A00", &["A", "B"]).build());
        }
        let provider = provider(instances.clone()).await;

        let q = query(&[
            ("start-station", "A"),
            ("end-station", "B"),
            ("route-pair", "ABCD"),
            ("page", "2"),
        ]);
        let results = search_trips(&provider, &q).unwrap();
        assert_eq!(results.total_count, 45);
        assert_eq!(results.total_pages, 3);
        assert_eq!(results.page, 2);
        assert_eq!(results.per_page, 20);
        assert!(results.concatenated);
        assert_eq!(results.trips.len(), 20);

        let all = matching_rows(&instances, &q);
        let expected: Vec<&str> = ids(&all)[20..40].to_vec();
        let got: Vec<&str> = results.trips.iter().map(|h| h.instance.instance_id.as_str()).collect();
        assert_eq!(got, expected);

        // Rows 21-40 depart at minutes 20-39
        let first = results.trips[0].instance.stop_times[0].scheduled_departure_time.unwrap();
        assert_eq!(first.secs(), 20 * 60);

        assert!(results.routes.contains_key("ABCD-1"));
        assert!(results.stations.contains_key("A"));
        assert!(results.stations.contains_key("B"));
        assert_eq!(results.express_strings.len(), 20);
    }

    #[tokio::test]
    async fn past_the_end_page_is_empty() {
        let provider = provider(vec![Builder::new("a", "ABCD-1", "1A23", &["A"]).build()]).await;
        let results = search_trips(&provider, &query(&[("page", "7")])).unwrap();
        assert_eq!(results.total_count, 1);
        assert_eq!(results.total_pages, 1);
        assert!(results.trips.is_empty());
        assert!(!results.concatenated);
    }

    #[tokio::test]
    async fn page_zero_is_rejected() {
        let provider = provider(Vec::new()).await;
        let q = SearchQuery {
            page: 0,
            ..SearchQuery::default()
        };
        assert!(matches!(
            search_trips(&provider, &q),
            Err(CoreError::InvalidQuery { field: "page", .. })
        ));
    }

    #[tokio::test]
    async fn passing_visits_hidden_without_extra_details() {
        let mut inst = Builder::new("a", "ABCD-1", "1A23", &["A", "X", "B"]);
        inst.0.stop_times[1].passing = true;
        let provider = provider(vec![inst.build()]).await;

        let results = search_trips(&provider, &SearchQuery::default()).unwrap();
        assert_eq!(results.trips[0].instance.stop_times.len(), 2);

        let q = SearchQuery {
            extra_details: true,
            ..SearchQuery::default()
        };
        let results = search_trips(&provider, &q).unwrap();
        assert_eq!(results.trips[0].instance.stop_times.len(), 3);
    }

    #[test]
    fn exact_train_number() {
        let instances = vec![
            Builder::new("a", "BNBR", "1a23", &["A"]).build(),
            Builder::new("b", "BNBR", "1A24", &["A"]).build(),
        ];
        let q = SearchQuery {
            train_number: TrainNumberPattern::parse("1A23").unwrap(),
            ..SearchQuery::default()
        };
        assert_eq!(ids(&matching_rows(&instances, &q)), vec!["a"]);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::{ServiceTime, StopTime};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn instance(i: usize, secs: u32, day: u32, route: &str) -> Arc<TripInstance> {
        let mut st = StopTime::new(1, "A");
        st.scheduled_departure_time = Some(ServiceTime::from_secs(secs));
        Arc::new(TripInstance {
            instance_id: format!("i{i}"),
            trip_id: format!("t{i}"),
            route_id: route.to_string(),
            shape_id: None,
            run: format!("{:04}", i % 10_000),
            stop_times: vec![st],
            scheduled_dates: BTreeSet::from([ServiceDate::parse(&format!("202403{:02}", day)).unwrap()]),
            actual_dates: BTreeSet::new(),
            calendar_dates: BTreeSet::new(),
            express_info: Vec::new(),
            run_series: None,
        })
    }

    proptest! {
        /// Count equals the number of instances satisfying the predicate,
        /// and rows come out in (date, departure, run) order
        #[test]
        fn count_and_order(
            specs in proptest::collection::vec((0u32..86_400, 1u32..28, prop::bool::ANY), 0..60)
        ) {
            let instances: Vec<Arc<TripInstance>> = specs
                .iter()
                .enumerate()
                .map(|(i, (secs, day, ab))| instance(i, *secs, *day, if *ab { "ABCD" } else { "EFGH" }))
                .collect();
            let query = SearchQuery {
                route_start: Some("AB".into()),
                ..SearchQuery::default()
            };

            let rows = matching_rows(&instances, &query);
            prop_assert_eq!(rows.len(), specs.iter().filter(|(_, _, ab)| *ab).count());

            let keys: Vec<_> = rows
                .iter()
                .map(|r| {
                    (
                        r.first_date(DateMode::ActualSch),
                        r.instance.stop_times[0].scheduled_departure_time,
                        r.instance.run.clone(),
                    )
                })
                .collect();
            prop_assert!(keys.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
