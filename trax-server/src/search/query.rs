//! Search form parameters and their validated query.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::{ServiceDate, TrainNumberPattern, TripInstance};
use crate::error::CoreError;

/// Results per page.
pub const PAGE_SIZE: usize = 20;

/// Which of an instance's date sets the date filter and sort use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateMode {
    /// Dates the trip is scheduled to run.
    #[default]
    ActualSch,
    /// Dates the trip actually ran according to real-time data.
    ActualRt,
    /// Dates from the static calendar alone.
    Static,
}

impl DateMode {
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s.trim() {
            "" | "actual_sch" => Ok(DateMode::ActualSch),
            "actual_rt" => Ok(DateMode::ActualRt),
            "static" => Ok(DateMode::Static),
            other => Err(CoreError::invalid(
                "date-mode",
                format!("unknown mode {other:?}, expected actual_sch, actual_rt or static"),
            )),
        }
    }

    /// The active date set of `instance` under this mode.
    ///
    /// Instances without calendar dates fall back to their scheduled dates
    /// in static mode.
    pub fn dates<'a>(&self, instance: &'a TripInstance) -> &'a BTreeSet<ServiceDate> {
        match self {
            DateMode::ActualSch => &instance.scheduled_dates,
            DateMode::ActualRt => &instance.actual_dates,
            DateMode::Static if instance.calendar_dates.is_empty() => &instance.scheduled_dates,
            DateMode::Static => &instance.calendar_dates,
        }
    }
}

/// Run-series leadership filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderFilter {
    #[default]
    Any,
    Only,
    Exclude,
}

impl LeaderFilter {
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s.trim() {
            "" | "any" => Ok(LeaderFilter::Any),
            "only" => Ok(LeaderFilter::Only),
            "exclude" => Ok(LeaderFilter::Exclude),
            other => Err(CoreError::invalid(
                "leader",
                format!("unknown filter {other:?}, expected any, only or exclude"),
            )),
        }
    }

    pub fn admits(&self, is_leader: bool) -> bool {
        match self {
            LeaderFilter::Any => true,
            LeaderFilter::Only => is_leader,
            LeaderFilter::Exclude => !is_leader,
        }
    }
}

/// Raw search form fields, as submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    pub start_station: String,
    pub end_station: String,
    /// Every non-empty `intermediate-station*` field, in order.
    pub intermediate_stations: Vec<String>,
    /// Every non-empty `service-date*` field, in order.
    pub service_dates: Vec<String>,
    pub train_number_type: String,
    pub train_number_destination: String,
    pub train_number: String,
    pub route: String,
    pub route_start: String,
    pub route_end: String,
    pub route_pair: String,
    pub route_pair_reversible: bool,
    pub date_mode: String,
    pub leader: String,
    pub expand_dates: bool,
    pub extra_details: bool,
    pub page: String,
}

impl SearchParams {
    /// Collect fields from query-string pairs.
    ///
    /// Checkboxes count as set when their value is `on`. Repeated station
    /// and date fields are collected by key prefix; for other keys the
    /// last value wins. Unknown keys are ignored.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            let text = value.to_string();
            match key {
                "start-station" => params.start_station = text,
                "end-station" => params.end_station = text,
                "train-number-type" => params.train_number_type = text,
                "train-number-destination" => params.train_number_destination = text,
                "train-number" => params.train_number = text,
                "route" => params.route = text,
                "route-start" => params.route_start = text,
                "route-end" => params.route_end = text,
                "route-pair" => params.route_pair = text,
                "route-pair-reversible" => params.route_pair_reversible = value == "on",
                "date-mode" => params.date_mode = text,
                "leader" => params.leader = text,
                "expand-dates" => params.expand_dates = value == "on",
                "extra-details" => params.extra_details = value == "on",
                "page" => params.page = text,
                k if k.starts_with("intermediate-station") => {
                    if !value.is_empty() {
                        params.intermediate_stations.push(text);
                    }
                }
                k if k.starts_with("service-date") => {
                    if !value.is_empty() {
                        params.service_dates.push(text);
                    }
                }
                _ => {}
            }
        }
        params
    }
}

/// A validated trip search.
///
/// Empty fields impose no constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub start_station: Option<String>,
    pub end_station: Option<String>,
    pub intermediate_stations: Vec<String>,
    pub service_dates: Vec<ServiceDate>,
    pub date_mode: DateMode,
    pub train_number: Option<TrainNumberPattern>,
    /// Required first character of the run, compared case-insensitively.
    pub train_number_type: Option<char>,
    /// Required second character of the run, compared case-insensitively.
    pub train_number_destination: Option<char>,
    pub route: Option<String>,
    pub route_start: Option<String>,
    pub route_end: Option<String>,
    pub route_pair: Option<String>,
    pub route_pair_reversible: bool,
    pub leader: LeaderFilter,
    /// One result row per active date instead of one per instance.
    pub expand_dates: bool,
    pub extra_details: bool,
    /// 1-based page number.
    pub page: usize,
}

impl Default for SearchQuery {
    /// The empty query: matches everything, first page.
    fn default() -> Self {
        Self {
            start_station: None,
            end_station: None,
            intermediate_stations: Vec::new(),
            service_dates: Vec::new(),
            date_mode: DateMode::default(),
            train_number: None,
            train_number_type: None,
            train_number_destination: None,
            route: None,
            route_start: None,
            route_end: None,
            route_pair: None,
            route_pair_reversible: false,
            leader: LeaderFilter::default(),
            expand_dates: false,
            extra_details: false,
            page: 1,
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn single_char(field: &'static str, s: &str) -> Result<Option<char>, CoreError> {
    let mut chars = s.trim().chars();
    match (chars.next(), chars.next()) {
        (None, _) => Ok(None),
        (Some(c), None) => Ok(Some(c)),
        _ => Err(CoreError::invalid(field, "must be a single character")),
    }
}

impl SearchQuery {
    /// Validate raw form fields.
    pub fn parse(params: &SearchParams) -> Result<Self, CoreError> {
        let train_number = TrainNumberPattern::parse(&params.train_number)
            .map_err(|e| CoreError::invalid("train-number", e.to_string()))?;

        let service_dates = params
            .service_dates
            .iter()
            .map(|d| {
                ServiceDate::parse(d).map_err(|e| CoreError::invalid("service-date", e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let route_pair = non_empty(&params.route_pair);
        if let Some(pair) = &route_pair {
            if pair.chars().count() != 4 {
                return Err(CoreError::invalid(
                    "route-pair",
                    "must be exactly 4 characters long",
                ));
            }
        }

        let page = match params.page.trim() {
            "" => 1,
            raw => match raw.parse::<usize>() {
                Ok(0) | Err(_) => {
                    return Err(CoreError::invalid("page", "must be a positive integer"));
                }
                Ok(n) => n,
            },
        };

        Ok(Self {
            start_station: non_empty(&params.start_station),
            end_station: non_empty(&params.end_station),
            intermediate_stations: params
                .intermediate_stations
                .iter()
                .filter_map(|s| non_empty(s))
                .collect(),
            service_dates,
            date_mode: DateMode::parse(&params.date_mode)?,
            train_number,
            train_number_type: single_char("train-number-type", &params.train_number_type)?,
            train_number_destination: single_char(
                "train-number-destination",
                &params.train_number_destination,
            )?,
            route: non_empty(&params.route),
            route_start: non_empty(&params.route_start),
            route_end: non_empty(&params.route_end),
            route_pair,
            route_pair_reversible: params.route_pair_reversible,
            leader: LeaderFilter::parse(&params.leader)?,
            expand_dates: params.expand_dates,
            extra_details: params.extra_details,
            page,
        })
    }
}
