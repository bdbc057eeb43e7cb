//! TRAX departure aggregation and trip search server.
//!
//! Answers two questions over an already-augmented transit data set:
//! "what leaves this stop soon?" and "which trips match this search?",
//! and maps the vehicles running right now, while the data underneath is
//! loaded and refreshed in the background.

pub mod cache;
pub mod config;
pub mod delay;
pub mod departures;
pub mod domain;
pub mod engine;
pub mod error;
pub mod express;
pub mod load;
pub mod map;
pub mod provider;
pub mod search;
pub mod web;
