//! Data transfer objects for web requests and responses.

use serde::{Deserialize, Serialize};

use crate::load::LoadPhase;

/// Query flags shared by the detail endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct DetailsParams {
    /// Show passing and skipped stops (`on`, `true` or `1`)
    pub extra_details: Option<String>,

    /// Departure look-ahead in hours (stop boards only)
    pub hours: Option<u32>,
}

impl DetailsParams {
    pub fn extra_details(&self) -> bool {
        self.extra_details
            .as_deref()
            .is_some_and(|v| matches!(v.trim(), "on" | "true" | "1"))
    }
}

/// Response of the loading poll.
#[derive(Debug, Serialize)]
pub struct LoadingResponse {
    /// Keep polling while this is set
    pub loading: bool,

    pub phase: LoadPhase,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,

    /// The offending query field, for validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,

    /// Whether the same request may succeed later
    pub retryable: bool,
}
