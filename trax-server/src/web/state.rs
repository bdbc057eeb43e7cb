//! Application state for the web layer.

use std::sync::Arc;

use crate::engine::TraxEngine;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TraxEngine>,
}

impl AppState {
    pub fn new(engine: Arc<TraxEngine>) -> Self {
        Self { engine }
    }
}
