//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tracing::{debug, warn};

use crate::departures::StopBoard;
use crate::domain::{ServiceDate, ShapePoint, TravelTrip};
use crate::engine::{RunSeriesDetails, SystemStatus, TripDetails};
use crate::error::CoreError;
use crate::load::ReloadOutcome;
use crate::map::VehicleMap;
use crate::search::{SearchOptions, SearchParams, SearchQuery, SearchResults};

use super::dto::*;
use super::state::AppState;

/// Seconds a client should wait before retrying while data loads.
const RETRY_AFTER_SECS: u32 = 30;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/api/loading", get(loading))
        .route("/api/reload", post(reload))
        .route("/api/stop/:stop_id", get(stop_departures))
        .route("/api/trip/:instance_id", get(trip_instance))
        .route("/api/travel/:service_id", get(travel_service))
        .route("/api/run-series/:date/:series", get(run_series))
        .route("/api/search", get(search))
        .route("/api/search/options", get(search_options))
        .route("/api/shape/:shape_id", get(shape))
        .route("/api/map", get(vehicle_map))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

async fn status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(state.engine.system_status())
}

/// Polled by clients waiting for the data to load.
async fn loading(State(state): State<AppState>) -> Json<LoadingResponse> {
    let driver = state.engine.driver();
    Json(LoadingResponse {
        loading: driver.loading_status(),
        phase: driver.machine().phase(),
    })
}

/// Manual refresh trigger.
async fn reload(State(state): State<AppState>) -> (StatusCode, Json<ReloadOutcome>) {
    let outcome = state.engine.driver().reload();
    let status = match outcome {
        ReloadOutcome::Started(_) => StatusCode::ACCEPTED,
        ReloadOutcome::AlreadyInProgress => StatusCode::CONFLICT,
    };
    (status, Json(outcome))
}

async fn stop_departures(
    State(state): State<AppState>,
    Path(stop_id): Path<String>,
    Query(params): Query<DetailsParams>,
) -> Result<Json<StopBoard>, AppError> {
    let board =
        state
            .engine
            .departures_for_stop(&stop_id, params.hours, params.extra_details())?;
    Ok(Json(board))
}

async fn trip_instance(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
    Query(params): Query<DetailsParams>,
) -> Result<Json<TripDetails>, AppError> {
    Ok(Json(
        state
            .engine
            .trip_instance(&instance_id, params.extra_details())?,
    ))
}

async fn travel_service(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
    Query(params): Query<DetailsParams>,
) -> Result<Json<TravelTrip>, AppError> {
    Ok(Json(
        state
            .engine
            .travel_service(&service_id, params.extra_details())?,
    ))
}

async fn run_series(
    State(state): State<AppState>,
    Path((date, series)): Path<(String, String)>,
    Query(params): Query<DetailsParams>,
) -> Result<Json<RunSeriesDetails>, AppError> {
    let date = ServiceDate::parse(&date).map_err(|e| CoreError::invalid("date", e.to_string()))?;
    Ok(Json(
        state
            .engine
            .run_series(date, &series, params.extra_details())?,
    ))
}

/// Trip search; takes the raw form fields so repeated keys survive.
async fn search(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<SearchResults>, AppError> {
    let query = SearchQuery::parse(&SearchParams::from_pairs(pairs))?;
    debug!(page = query.page, "search request");
    Ok(Json(state.engine.search_trips(&query)?))
}

async fn search_options(State(state): State<AppState>) -> Result<Json<SearchOptions>, AppError> {
    Ok(Json(state.engine.search_options()?))
}

async fn shape(
    State(state): State<AppState>,
    Path(shape_id): Path<String>,
) -> Result<Json<Vec<ShapePoint>>, AppError> {
    let points = state.engine.shape(&shape_id)?;
    Ok(Json(points.as_ref().clone()))
}

async fn vehicle_map(State(state): State<AppState>) -> Result<Json<VehicleMap>, AppError> {
    Ok(Json(state.engine.vehicle_map()?))
}

/// Application error type.
#[derive(Debug)]
pub struct AppError(CoreError);

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        AppError(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, field) = match &self.0 {
            CoreError::NotReady => (StatusCode::SERVICE_UNAVAILABLE, None),
            CoreError::NotFound { .. } => (StatusCode::NOT_FOUND, None),
            CoreError::InvalidQuery { field, .. } => (StatusCode::BAD_REQUEST, Some(*field)),
        };
        let message = self.0.to_string();
        warn!(%status, "{message}");

        let body = Json(ErrorResponse {
            error: message,
            field,
            retryable: self.0.is_retryable(),
        });
        let mut response = (status, body).into_response();
        if self.0.is_retryable() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
        }
        response
    }
}
