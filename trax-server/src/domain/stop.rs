//! Stop identifiers and stop records.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a stop or parent station in the primary schedule.
///
/// Stop ids are opaque strings assigned by the schedule publisher
/// (e.g. `"place_centr"` for a parent station, `"600029"` for a platform).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StopId(String);

impl StopId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for StopId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StopId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StopId({})", self.0)
    }
}

impl fmt::Display for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stop or station, as provided by the data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub stop_id: StopId,

    pub name: String,

    /// Parent station, for platforms and other child stops.
    #[serde(default)]
    pub parent_station: Option<StopId>,

    #[serde(default)]
    pub lat: Option<f64>,

    #[serde(default)]
    pub lon: Option<f64>,

    /// Canonical key for matching this stop against place names in other
    /// feeds. Derived by the provider; `None` means "use the name".
    #[serde(default)]
    pub place_key: Option<String>,
}

impl Stop {
    pub fn new(stop_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            stop_id: StopId::new(stop_id),
            name: name.into(),
            parent_station: None,
            lat: None,
            lon: None,
            place_key: None,
        }
    }

    /// Whether this stop is a top-level station (has no parent).
    pub fn is_station(&self) -> bool {
        self.parent_station.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_id_display_and_debug() {
        let id = StopId::new("place_centr");
        assert_eq!(id.to_string(), "place_centr");
        assert_eq!(format!("{:?}", id), "StopId(place_centr)");
    }

    #[test]
    fn stop_id_serializes_as_plain_string() {
        let id = StopId::new("600029");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"600029\"");
    }

    #[test]
    fn stop_deserializes_with_defaults() {
        let stop: Stop =
            serde_json::from_str(r#"{"stop_id": "place_centr", "name": "Central station"}"#)
                .unwrap();
        assert_eq!(stop.stop_id.as_str(), "place_centr");
        assert!(stop.is_station());
        assert!(stop.place_key.is_none());
    }
}
