//! Train numbers (runs) and run series.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::stop::StopId;
use super::time::ServiceDate;

/// Error returned when a train-number search pattern is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidTrainNumber {
    #[error("train number must be exactly 4 characters long")]
    WrongLength,

    #[error("train number must be alphanumeric or '.' wildcard")]
    InvalidCharacter,
}

/// A validated train-number search pattern.
///
/// Exactly four characters, each an uppercase letter, a digit, or the
/// `.` wildcard which matches any single character in that position.
///
/// # Examples
///
/// ```
/// use trax_server::domain::TrainNumberPattern;
///
/// let p = TrainNumberPattern::parse("12..").unwrap().unwrap();
/// assert!(p.matches("1234"));
/// assert!(p.matches("1299"));
/// assert!(!p.matches("123"));
/// assert!(!p.matches("A234"));
///
/// // An empty pattern means "no filter"
/// assert!(TrainNumberPattern::parse("  ").unwrap().is_none());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrainNumberPattern([u8; 4]);

impl TrainNumberPattern {
    /// Parse a pattern, trimming whitespace and uppercasing letters.
    ///
    /// Returns `Ok(None)` for an empty pattern.
    pub fn parse(s: &str) -> Result<Option<Self>, InvalidTrainNumber> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(None);
        }

        if !s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'.') {
            return Err(InvalidTrainNumber::InvalidCharacter);
        }

        let bytes = s.as_bytes();
        if bytes.len() != 4 {
            return Err(InvalidTrainNumber::WrongLength);
        }

        let mut code = [0u8; 4];
        for (slot, b) in code.iter_mut().zip(bytes) {
            *slot = b.to_ascii_uppercase();
        }
        Ok(Some(Self(code)))
    }

    /// Whether `run` matches, position by position, ignoring case and
    /// surrounding whitespace.
    pub fn matches(&self, run: &str) -> bool {
        let run = run.trim().as_bytes();
        run.len() == 4
            && self
                .0
                .iter()
                .zip(run)
                .all(|(&p, &r)| p == b'.' || p == r.to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        // Only ASCII is stored
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Debug for TrainNumberPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrainNumberPattern({})", self.as_str())
    }
}

impl fmt::Display for TrainNumberPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One trip within a run series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSeriesTrip {
    pub trip_id: String,

    #[serde(default)]
    pub instance_id: Option<String>,

    pub run: String,
}

/// A sighting of a physical vehicle operating the series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSighting {
    pub vehicle_id: String,

    #[serde(default)]
    pub stop_id: Option<StopId>,

    #[serde(default)]
    pub observed_at: Option<NaiveDateTime>,
}

/// Instances operated by the same physical consist across several trip
/// numbers on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSeries {
    pub date: ServiceDate,

    /// Series name, which is the canonical (leading) run.
    pub series: String,

    pub trips: Vec<RunSeriesTrip>,

    #[serde(default)]
    pub vehicle_sightings: Vec<VehicleSighting>,
}
