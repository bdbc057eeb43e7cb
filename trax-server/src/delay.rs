//! Delay classification and duration strings.
//!
//! Delays are judged on whole minutes: a vehicle 29 seconds late is on
//! time, one 31 seconds late is a minute late.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Minutes late beyond which a delay counts as very late.
pub const VERY_LATE_AFTER_MINS: i64 = 5;

/// Severity bucket of a delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DelayClass {
    VeryLate,
    Late,
    Early,
    OnTime,
    /// No real-time data is available.
    Scheduled,
}

impl DelayClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DelayClass::VeryLate => "very-late",
            DelayClass::Late => "late",
            DelayClass::Early => "early",
            DelayClass::OnTime => "on-time",
            DelayClass::Scheduled => "scheduled",
        }
    }
}

impl fmt::Display for DelayClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified delay: rider-facing string plus severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delay {
    pub delay_string: String,
    pub delay_class: DelayClass,
}

/// Round seconds to the nearest whole minute, halves away from zero.
pub fn round_to_minutes(secs: i64) -> i64 {
    let mins = secs.abs().saturating_add(30) / 60;
    if secs < 0 { -mins } else { mins }
}

/// Format whole minutes as `"{h}h {m}m"`, dropping a zero hour.
///
/// ```
/// use trax_server::delay::format_minutes;
///
/// assert_eq!(format_minutes(3), "3m");
/// assert_eq!(format_minutes(65), "1h 5m");
/// assert_eq!(format_minutes(-65), "-1h 5m");
/// ```
pub fn format_minutes(mins: i64) -> String {
    let sign = if mins < 0 { "-" } else { "" };
    let abs = mins.unsigned_abs();
    let (h, m) = (abs / 60, abs % 60);
    if h == 0 {
        format!("{sign}{m}m")
    } else {
        format!("{sign}{h}h {m}m")
    }
}

/// Format a departs-in duration in seconds, rounded to the minute.
pub fn format_departs_in(secs: i64) -> String {
    format_minutes(round_to_minutes(secs))
}

/// Classify a delay in seconds (actual minus scheduled).
///
/// `None` means no real-time data, which is distinct from zero delay.
///
/// ```
/// use trax_server::delay::{classify, DelayClass};
///
/// assert_eq!(classify(None).delay_class, DelayClass::Scheduled);
/// assert_eq!(classify(Some(0)).delay_string, "on time");
/// assert_eq!(classify(Some(180)).delay_string, "3m late");
/// assert_eq!(classify(Some(-120)).delay_class, DelayClass::Early);
/// ```
pub fn classify(delay_secs: Option<i64>) -> Delay {
    let Some(secs) = delay_secs else {
        return Delay {
            delay_string: "scheduled".to_string(),
            delay_class: DelayClass::Scheduled,
        };
    };

    let mins = round_to_minutes(secs);
    let (delay_string, delay_class) = match mins {
        0 => ("on time".to_string(), DelayClass::OnTime),
        m if m < 0 => (format!("{} early", format_minutes(-m)), DelayClass::Early),
        m if m <= VERY_LATE_AFTER_MINS => (format!("{} late", format_minutes(m)), DelayClass::Late),
        m => (format!("{} late", format_minutes(m)), DelayClass::VeryLate),
    };

    Delay {
        delay_string,
        delay_class,
    }
}
