//! Service-day times and dates.
//!
//! Schedule times are seconds since midnight of the service day. They may
//! exceed 24 hours for trips that run past midnight but belong to the
//! previous day's service. Service dates are calendar dates written as
//! `YYYYMMDD` in the data feed.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Seconds in one service day.
pub const SECS_PER_DAY: u32 = 24 * 60 * 60;

/// Sentinel the upstream feeds use for "no time".
pub const ABSENT_TIMESTAMP: &str = "0001-01-01T00:00:00";

/// Error returned when parsing an invalid time string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// Error returned when parsing an invalid service date.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid service date {input:?}: expected YYYYMMDD or YYYY-MM-DD")]
pub struct InvalidServiceDate {
    input: String,
}

/// A time of day on the service day, in seconds since midnight.
///
/// # Examples
///
/// ```
/// use trax_server::domain::ServiceTime;
///
/// let t = ServiceTime::parse("25:10:30").unwrap();
/// assert_eq!(t.secs(), 25 * 3600 + 10 * 60 + 30);
/// assert_eq!(t.to_string(), "25:10");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceTime(u32);

impl ServiceTime {
    /// Create from seconds since midnight.
    pub fn from_secs(secs: u32) -> Self {
        Self(secs)
    }

    /// Create from hours, minutes and seconds. Hours may exceed 23.
    pub fn from_hms(hours: u32, minutes: u32, seconds: u32) -> Self {
        Self(hours * 3600 + minutes * 60 + seconds)
    }

    /// Time of day of a local datetime.
    pub fn of_datetime(dt: NaiveDateTime) -> Self {
        Self(dt.time().num_seconds_from_midnight())
    }

    /// Parse `HH:MM:SS` or `HH:MM`. Hours are not capped at 23.
    pub fn parse(s: &str) -> Result<Self, TimeError> {
        let mut parts = s.trim().split(':');
        let hours = parse_field(parts.next(), "missing hours")?;
        let minutes = parse_field(parts.next(), "missing minutes")?;
        let seconds = match parts.next() {
            Some(p) => parse_field(Some(p), "invalid seconds")?,
            None => 0,
        };
        if parts.next().is_some() {
            return Err(TimeError::new("too many fields"));
        }
        if minutes > 59 || seconds > 59 {
            return Err(TimeError::new("minutes and seconds must be 0-59"));
        }
        hours
            .checked_mul(3600)
            .and_then(|h| h.checked_add(minutes * 60 + seconds))
            .map(Self)
            .ok_or_else(|| TimeError::new("time out of range"))
    }

    /// Seconds since midnight.
    pub fn secs(self) -> u32 {
        self.0
    }

    /// This time rounded down to the whole minute.
    pub fn floor_minute(self) -> Self {
        Self(self.0 - self.0 % 60)
    }

    /// Add a number of seconds.
    pub fn plus_secs(self, secs: u32) -> Self {
        Self(self.0.saturating_add(secs))
    }
}

fn parse_field(part: Option<&str>, reason: &'static str) -> Result<u32, TimeError> {
    let part = part.ok_or_else(|| TimeError::new(reason))?;
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TimeError::new(reason));
    }
    part.parse().map_err(|_| TimeError::new(reason))
}

impl fmt::Debug for ServiceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ServiceTime({:02}:{:02}:{:02})",
            self.0 / 3600,
            (self.0 % 3600) / 60,
            self.0 % 60
        )
    }
}

impl fmt::Display for ServiceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 3600, (self.0 % 3600) / 60)
    }
}

/// Format an optional time as `HH:MM`, or `--:--` when absent.
pub fn format_time(time: Option<ServiceTime>) -> String {
    match time {
        Some(t) => t.to_string(),
        None => "--:--".to_string(),
    }
}

/// A half-open window `[start, end)` of service-day times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    pub start: ServiceTime,
    pub end: ServiceTime,
}

impl TimeWindow {
    pub fn new(start: ServiceTime, end: ServiceTime) -> Self {
        Self { start, end }
    }

    /// Window starting at `start` and lasting `hours`.
    pub fn hours_from(start: ServiceTime, hours: u32) -> Self {
        Self {
            start,
            end: start.plus_secs(hours * 3600),
        }
    }

    pub fn contains(&self, time: ServiceTime) -> bool {
        self.start <= time && time < self.end
    }
}

/// A calendar date on which a trip runs.
///
/// Serialized as `YYYYMMDD`, the form the feed and the search form use.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceDate(NaiveDate);

impl ServiceDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Parse `YYYYMMDD` or `YYYY-MM-DD`.
    ///
    /// ```
    /// use trax_server::domain::ServiceDate;
    ///
    /// let a = ServiceDate::parse("20240315").unwrap();
    /// let b = ServiceDate::parse("2024-03-15").unwrap();
    /// assert_eq!(a, b);
    /// assert_eq!(a.to_string(), "20240315");
    /// assert!(ServiceDate::parse("15/03/2024").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, InvalidServiceDate> {
        let s = s.trim();
        let parsed = if s.len() == 8 {
            NaiveDate::parse_from_str(s, "%Y%m%d")
        } else {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
        };
        parsed.map(Self).map_err(|_| InvalidServiceDate {
            input: s.to_string(),
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The following calendar date.
    pub fn succ(&self) -> Self {
        Self(self.0.succ_opt().unwrap_or(self.0))
    }

    /// The preceding calendar date.
    pub fn pred(&self) -> Self {
        Self(self.0.pred_opt().unwrap_or(self.0))
    }
}

impl fmt::Debug for ServiceDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceDate({})", self.0.format("%Y%m%d"))
    }
}

impl fmt::Display for ServiceDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y%m%d"))
    }
}

impl Serialize for ServiceDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ServiceDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ServiceDate::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Deserialize an optional schedule time, mapping the "zero" sentinel to `None`.
///
/// Accepts `null`, seconds since midnight (where `0` means absent), an
/// `HH:MM:SS` string, or the [`ABSENT_TIMESTAMP`] sentinel.
pub(crate) fn deserialize_optional_time<'de, D>(
    deserializer: D,
) -> Result<Option<ServiceTime>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTime {
        Secs(u32),
        Text(String),
    }

    match Option::<RawTime>::deserialize(deserializer)? {
        None | Some(RawTime::Secs(0)) => Ok(None),
        Some(RawTime::Secs(secs)) => Ok(Some(ServiceTime::from_secs(secs))),
        Some(RawTime::Text(text)) => {
            let text = text.trim();
            if text.is_empty() || text == ABSENT_TIMESTAMP {
                return Ok(None);
            }
            let time = ServiceTime::parse(text).map_err(serde::de::Error::custom)?;
            Ok((time.secs() != 0).then_some(time))
        }
    }
}

/// Deserialize an optional local timestamp (`YYYY-MM-DDTHH:MM:SS`),
/// mapping the [`ABSENT_TIMESTAMP`] sentinel to `None`.
pub(crate) fn deserialize_optional_datetime<'de, D>(
    deserializer: D,
) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(text) => {
            let text = text.trim();
            if text.is_empty() || text == ABSENT_TIMESTAMP {
                return Ok(None);
            }
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
                .map(Some)
                .map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_service_times() {
        assert_eq!(ServiceTime::parse("00:00:00").unwrap().secs(), 0);
        assert_eq!(ServiceTime::parse("10:05").unwrap().secs(), 36300);
        assert_eq!(ServiceTime::parse("26:30:15").unwrap().secs(), 95415);
    }

    #[test]
    fn reject_malformed_times() {
        assert!(ServiceTime::parse("").is_err());
        assert!(ServiceTime::parse("10").is_err());
        assert!(ServiceTime::parse("10:60").is_err());
        assert!(ServiceTime::parse("10:00:00:00").is_err());
        assert!(ServiceTime::parse("1a:00").is_err());
    }

    #[test]
    fn reject_out_of_range_hours() {
        assert!(ServiceTime::parse("9999999:00").is_err());
        assert!(ServiceTime::parse("1193046:28:16").is_err());
        assert_eq!(ServiceTime::parse("1193046:28:15").unwrap().secs(), u32::MAX);
    }

    #[test]
    fn display_and_format() {
        assert_eq!(ServiceTime::from_hms(9, 5, 59).to_string(), "09:05");
        assert_eq!(format_time(None), "--:--");
        assert_eq!(format_time(Some(ServiceTime::from_hms(24, 10, 0))), "24:10");
    }

    #[test]
    fn floor_minute() {
        assert_eq!(
            ServiceTime::from_hms(10, 15, 59).floor_minute(),
            ServiceTime::from_hms(10, 15, 0)
        );
    }

    #[test]
    fn window_is_half_open() {
        let w = TimeWindow::hours_from(ServiceTime::from_hms(10, 0, 0), 4);
        assert!(w.contains(ServiceTime::from_hms(10, 0, 0)));
        assert!(w.contains(ServiceTime::from_hms(13, 59, 59)));
        assert!(!w.contains(ServiceTime::from_hms(14, 0, 0)));
        assert!(!w.contains(ServiceTime::from_hms(9, 59, 59)));
    }

    #[test]
    fn service_date_roundtrip_through_json() {
        let d = ServiceDate::parse("20240315").unwrap();
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, "\"20240315\"");
        let back: ServiceDate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn service_date_neighbours() {
        let d = ServiceDate::parse("20241231").unwrap();
        assert_eq!(d.succ().to_string(), "20250101");
        assert_eq!(d.succ().pred(), d);
        assert_eq!(ServiceDate::parse("20240301").unwrap().pred().to_string(), "20240229");
    }

    #[derive(Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "deserialize_optional_time")]
        t: Option<ServiceTime>,
    }

    #[test]
    fn zero_and_sentinel_times_are_absent() {
        let parse = |json: &str| serde_json::from_str::<Holder>(json).unwrap().t;
        assert_eq!(parse(r#"{"t": 0}"#), None);
        assert_eq!(parse(r#"{"t": null}"#), None);
        assert_eq!(parse(r#"{}"#), None);
        assert_eq!(parse(r#"{"t": "0001-01-01T00:00:00"}"#), None);
        assert_eq!(parse(r#"{"t": "00:00:00"}"#), None);
        assert_eq!(parse(r#"{"t": 600}"#), Some(ServiceTime::from_secs(600)));
        assert_eq!(
            parse(r#"{"t": "10:00:00"}"#),
            Some(ServiceTime::from_hms(10, 0, 0))
        );
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Formatting then parsing keeps hours and minutes
        #[test]
        fn parse_display_roundtrip(h in 0u32..48, m in 0u32..60) {
            let t = ServiceTime::from_hms(h, m, 0);
            prop_assert_eq!(ServiceTime::parse(&t.to_string()).unwrap(), t);
        }

        /// Flooring never moves a time forward or by a minute or more
        #[test]
        fn floor_minute_bounds(secs in 0u32..200_000) {
            let t = ServiceTime::from_secs(secs);
            let f = t.floor_minute();
            prop_assert!(f <= t);
            prop_assert!(t.secs() - f.secs() < 60);
            prop_assert_eq!(f.secs() % 60, 0);
        }
    }
}
