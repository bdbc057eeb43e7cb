//! Domain types for the departure and trip search engine.
//!
//! These are the already-augmented records the data provider hands out:
//! stops, routes and their shapes, trip instances with the real-time
//! overlay applied, vehicle positions, and the long-distance travel feed.
//! The engine only reads them.

mod geo;
mod route;
mod run;
mod stop;
mod time;
mod travel;
mod trip;

pub use geo::{ShapePoint, VehiclePosition};
pub use route::{Route, RouteCode};
pub use run::{InvalidTrainNumber, RunSeries, RunSeriesTrip, TrainNumberPattern, VehicleSighting};
pub use stop::{Stop, StopId};
pub use time::{
    ABSENT_TIMESTAMP, InvalidServiceDate, SECS_PER_DAY, ServiceDate, ServiceTime, TimeError,
    TimeWindow, format_time,
};
pub use travel::{TravelStop, TravelTrip};
pub use trip::{
    ExpressSegment, RealtimeInfo, ScheduleRelationship, SegmentKind, StopTime, TripInstance,
};
