//! Trip search over every known trip instance.

mod engine;
mod options;
mod query;

pub use engine::{SearchHit, SearchResults, SearchRow, matches, matching_rows, search_trips};
pub use options::{RAIL_ROUTE_TYPE, SearchOptions, search_options};
pub use query::{DateMode, LeaderFilter, PAGE_SIZE, SearchParams, SearchQuery};
