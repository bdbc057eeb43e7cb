//! Engine and server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use tracing::warn;

/// Tunables of the departure and search engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Look-ahead window for stop departures (hours).
    pub horizon_hours: u32,

    /// How often the real-time overlay is refreshed.
    pub realtime_interval: Duration,

    /// How often the static schedule is reloaded.
    pub static_interval: Duration,

    /// Fixed UTC offset of the network's local time (hours).
    pub utc_offset_hours: i32,

    /// TTL for memoised stop-visit enumerations.
    pub board_cache_ttl: Duration,

    /// Maximum number of memoised stop-visit enumerations.
    pub board_cache_capacity: u64,
}

impl EngineConfig {
    /// The network's local offset. Out-of-range hours fall back to UTC.
    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            horizon_hours: 4,
            realtime_interval: Duration::from_secs(60),
            static_interval: Duration::from_secs(24 * 60 * 60),
            utc_offset_hours: 10, // Brisbane, no daylight saving
            board_cache_ttl: Duration::from_secs(30),
            board_cache_capacity: 2000,
        }
    }
}

/// Process configuration for the HTTP server binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory holding `static.json` and `realtime.json`.
    pub data_dir: PathBuf,

    pub bind_addr: SocketAddr,

    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`.
    ///
    /// Recognised keys are `TRAX_DATA_DIR`, `TRAX_BIND_ADDR`,
    /// `TRAX_UTC_OFFSET` and `TRAX_REALTIME_INTERVAL_SECS`. Values that do not
    /// parse are logged and replaced by the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = lookup("TRAX_DATA_DIR").filter(|d| !d.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir.trim());
        }
        if let Some(addr) = parse_var(&lookup, "TRAX_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(offset) = parse_var::<i32>(&lookup, "TRAX_UTC_OFFSET") {
            if (-23..=23).contains(&offset) {
                config.engine.utc_offset_hours = offset;
            } else {
                warn!(offset, "TRAX_UTC_OFFSET out of range, using default");
            }
        }
        match parse_var::<u64>(&lookup, "TRAX_REALTIME_INTERVAL_SECS") {
            Some(0) => warn!("TRAX_REALTIME_INTERVAL_SECS must be positive, using default"),
            Some(secs) => config.engine.realtime_interval = Duration::from_secs(secs),
            None => {}
        }

        config
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable configuration value");
            None
        }
    }
}
