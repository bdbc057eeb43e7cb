//! Rider-facing descriptions of skip-stop running.

use crate::domain::{ExpressSegment, SegmentKind, StopId};
use crate::provider::DataProvider;

/// Display name of a stop: its name without a trailing "station", or the
/// id itself when the stop is unknown.
pub fn stop_display_name(provider: &dyn DataProvider, stop_id: &StopId) -> String {
    match provider.stop(stop_id.as_str()) {
        Some(stop) => strip_station_suffix(&stop.name).to_string(),
        None => stop_id.to_string(),
    }
}

fn strip_station_suffix(name: &str) -> &str {
    let trimmed = name.trim();
    let lower = trimmed.to_ascii_lowercase();
    match lower.strip_suffix("station") {
        Some(rest) if !rest.trim().is_empty() => trimmed[..rest.len()].trim_end(),
        _ => trimmed,
    }
}

/// Segments still ahead of a vehicle standing at `stop`.
///
/// A segment is ahead if it starts at `stop` or passes through it. If
/// `stop` only ends a segment, the following segments are ahead. A stop
/// the segments never mention leaves the whole list.
fn remaining<'a>(segments: &'a [ExpressSegment], stop: &StopId) -> &'a [ExpressSegment] {
    if let Some(i) = segments
        .iter()
        .position(|s| &s.from == stop || s.skipped.contains(stop))
    {
        return &segments[i..];
    }
    if let Some(i) = segments.iter().position(|s| &s.to == stop) {
        return &segments[i + 1..];
    }
    segments
}

/// Describe a stopping pattern.
///
/// With `from_stop`, only running after that stop is described. Stop names
/// come from `name_of`.
///
/// ```
/// use trax_server::domain::{ExpressSegment, SegmentKind, StopId};
/// use trax_server::express::express_string;
///
/// let segments = vec![ExpressSegment {
///     kind: SegmentKind::Express,
///     from: StopId::new("A"),
///     to: StopId::new("C"),
///     skipped: vec![StopId::new("B")],
/// }];
/// assert_eq!(
///     express_string(&segments, None, |id| id.to_string()),
///     "Express from A to C, not stopping at B"
/// );
/// ```
pub fn express_string(
    segments: &[ExpressSegment],
    from_stop: Option<&StopId>,
    name_of: impl Fn(&StopId) -> String,
) -> String {
    let segments = match from_stop {
        Some(stop) => remaining(segments, stop),
        None => segments,
    };

    let express: Vec<String> = segments
        .iter()
        .filter(|s| s.kind == SegmentKind::Express)
        .map(|s| {
            let mut text = format!("Express from {} to {}", name_of(&s.from), name_of(&s.to));
            if !s.skipped.is_empty() {
                let skipped: Vec<String> = s.skipped.iter().map(&name_of).collect();
                text.push_str(", not stopping at ");
                text.push_str(&skipped.join(", "));
            }
            text
        })
        .collect();

    if !express.is_empty() {
        express.join("; ")
    } else if segments.iter().any(|s| s.kind == SegmentKind::Unknown) {
        "Stopping pattern unknown".to_string()
    } else if segments.is_empty() {
        String::new()
    } else {
        "All stops".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(kind: SegmentKind, from: &str, to: &str, skipped: &[&str]) -> ExpressSegment {
        ExpressSegment {
            kind,
            from: StopId::new(from),
            to: StopId::new(to),
            skipped: skipped.iter().map(|s| StopId::new(*s)).collect(),
        }
    }

    fn name(id: &StopId) -> String {
        id.as_str().to_uppercase()
    }

    fn pattern() -> Vec<ExpressSegment> {
        vec![
            seg(SegmentKind::Local, "a", "c", &[]),
            seg(SegmentKind::Express, "c", "f", &["d", "e"]),
            seg(SegmentKind::Local, "f", "h", &[]),
        ]
    }

    #[test]
    fn full_pattern() {
        assert_eq!(
            express_string(&pattern(), None, name),
            "Express from C to F, not stopping at D, E"
        );
    }

    #[test]
    fn after_express_section_is_all_stops() {
        let stop = StopId::new("f");
        assert_eq!(express_string(&pattern(), Some(&stop), name), "All stops");
    }

    #[test]
    fn from_segment_end_skips_that_segment() {
        let segments = vec![
            seg(SegmentKind::Express, "a", "c", &["b"]),
            seg(SegmentKind::Local, "c", "d", &[]),
        ];
        let stop = StopId::new("c");
        assert_eq!(express_string(&segments, Some(&stop), name), "All stops");
    }

    #[test]
    fn before_express_section_keeps_it() {
        let stop = StopId::new("a");
        assert!(express_string(&pattern(), Some(&stop), name).starts_with("Express from C"));
    }

    #[test]
    fn empty_and_unknown() {
        assert_eq!(express_string(&[], None, name), "");
        let segments = vec![seg(SegmentKind::Unknown, "a", "b", &[])];
        assert_eq!(express_string(&segments, None, name), "Stopping pattern unknown");
    }

    #[test]
    fn station_suffix_is_stripped() {
        assert_eq!(strip_station_suffix("Central station"), "Central");
        assert_eq!(strip_station_suffix("Roma Street Station "), "Roma Street");
        assert_eq!(strip_station_suffix("Station"), "Station");
        assert_eq!(strip_station_suffix("Bowen Hills"), "Bowen Hills");
    }
}
