//! Data provider error types.

use std::path::PathBuf;

/// Errors from loading or refreshing provider data.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Reading a snapshot file failed
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A snapshot file is not valid JSON for its schema
    #[error("failed to parse {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A real-time refresh was attempted before any static load
    #[error("static data has not been loaded")]
    NotLoaded,
}
