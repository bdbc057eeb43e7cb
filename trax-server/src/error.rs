//! Errors surfaced to callers of the engine.
//!
//! Refresh failures never appear here: the load state machine absorbs
//! them and logs them.

/// Errors returned by engine operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Data not loaded yet, or a static reload is in progress. Retryable.
    #[error("transit data is loading, please retry in a few minutes")]
    NotReady,

    /// A requested entity does not exist.
    #[error("{what} {id:?} not found")]
    NotFound { what: &'static str, id: String },

    /// A query field failed validation.
    #[error("invalid {field}: {message}")]
    InvalidQuery { field: &'static str, message: String },
}

impl CoreError {
    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            what,
            id: id.into(),
        }
    }

    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        CoreError::InvalidQuery {
            field,
            message: message.into(),
        }
    }

    /// Whether the caller should retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::NotReady)
    }
}
