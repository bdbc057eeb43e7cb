//! Routes and route family codes.

use serde::{Deserialize, Serialize};

/// A route record from the primary schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub route_id: String,

    #[serde(default)]
    pub short_name: Option<String>,

    #[serde(default)]
    pub long_name: Option<String>,

    /// Hex colour without the leading `#`.
    #[serde(default)]
    pub color: Option<String>,

    #[serde(default)]
    pub text_color: Option<String>,

    #[serde(default)]
    pub route_type: Option<u16>,
}

/// The route family code: the first four characters of a route id.
///
/// The first two characters name the line at the "from" end, the last two
/// the line at the "to" end, so `"BNBR"` runs from `BN` to `BR`.
///
/// # Examples
///
/// ```
/// use trax_server::domain::RouteCode;
///
/// let code = RouteCode::of("BNBR-4321");
/// assert_eq!(code.as_str(), "BNBR");
/// assert_eq!(code.from_half(), "BN");
/// assert_eq!(code.to_half(), "BR");
/// assert!(code.matches_pair("BRBN", true));
/// assert!(!code.matches_pair("BRBN", false));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteCode<'a>(&'a str);

impl<'a> RouteCode<'a> {
    /// Take the family code of a route id. Ids shorter than four
    /// characters are used whole.
    pub fn of(route_id: &'a str) -> Self {
        Self(split_chars(route_id, 4).0)
    }

    pub fn as_str(&self) -> &'a str {
        self.0
    }

    /// The "from" half (first two characters).
    pub fn from_half(&self) -> &'a str {
        split_chars(self.0, 2).0
    }

    /// The "to" half (characters three and four).
    pub fn to_half(&self) -> &'a str {
        split_chars(self.0, 2).1
    }

    /// Substring match on the full code.
    pub fn contains(&self, fragment: &str) -> bool {
        self.0.contains(fragment)
    }

    /// Exact match on the full code; with `reversible`, the code with its
    /// halves swapped also matches.
    pub fn matches_pair(&self, pair: &str, reversible: bool) -> bool {
        if self.0 == pair {
            return true;
        }
        if !reversible {
            return false;
        }
        let (from, to) = split_chars(pair, 2);
        !to.is_empty() && self.0.len() == pair.len() && self.from_half() == to && self.to_half() == from
    }
}

/// Split `s` after its first `n` characters.
fn split_chars(s: &str, n: usize) -> (&str, &str) {
    match s.char_indices().nth(n) {
        Some((at, _)) => s.split_at(at),
        None => (s, ""),
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// A code always matches its own swapped pair when reversible
        #[test]
        fn reversible_pair_is_symmetric(from in "[A-Z]{2}", to in "[A-Z]{2}") {
            let id = format!("{from}{to}");
            let swapped = format!("{to}{from}");
            prop_assert!(RouteCode::of(&id).matches_pair(&swapped, true));
            prop_assert!(RouteCode::of(&swapped).matches_pair(&id, true));
        }

        /// The halves always reassemble the code
        #[test]
        fn halves_reassemble(id in "[A-Z]{4}[A-Z0-9-]{0,6}") {
            let code = RouteCode::of(&id);
            prop_assert_eq!(format!("{}{}", code.from_half(), code.to_half()), code.as_str());
        }
    }
}
