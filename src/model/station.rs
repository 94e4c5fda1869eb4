//! Station classification (spec §4.2, component C2).

use super::{is_under_construction, mode_set, Mode};
use crate::diagnostics::Diagnostics;
use crate::element::{Element, ElementId, ElementKind};
use crate::geo::Point;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StationTag {
    Rail,
    Tram,
}

fn station_tag(el: &Element) -> Option<StationTag> {
    match el.tag("railway") {
        Some("station") | Some("halt") => Some(StationTag::Rail),
        Some("tram_stop") => Some(StationTag::Tram),
        _ => None,
    }
}

/// Whether `el` is tagged as *some* station/tram-stop regardless of mode set
/// — used by stop-area assembly to detect "another station" among a stop
/// area's members (spec §4.3), which the original checks independently of
/// the city's active modes.
pub fn is_any_station(el: &Element) -> bool {
    match station_tag(el) {
        Some(_) => !is_under_construction(el),
        None => false,
    }
}

/// Whether `el` qualifies as a transit station for a city with the given
/// active mode set (spec §4.2).
pub fn is_station(el: &Element, active_modes: &HashSet<Mode>) -> bool {
    let tag = match station_tag(el) {
        Some(t) => t,
        None => return false,
    };
    if tag == StationTag::Tram && !active_modes.contains(&Mode::Tram) {
        return false;
    }
    if is_under_construction(el) {
        return false;
    }
    let mut modes = mode_set(el);
    if tag == StationTag::Tram {
        modes.insert(Mode::Tram);
    }
    !modes.is_disjoint(active_modes)
}

/// A transit station (spec §3). Owned by exactly one city.
#[derive(Debug, Clone)]
pub struct Station {
    pub id: ElementId,
    pub modes: HashSet<Mode>,
    pub name: String,
    pub int_name: Option<String>,
    pub colour: Option<String>,
    pub center: Point,
}

impl Station {
    /// Builds a `Station` from an element already known to satisfy
    /// [`is_station`]. Returns `None` (with an error diagnostic) if the
    /// element has no resolvable centre — this should not happen for a
    /// node but can for a malformed snapshot.
    pub fn from_element(
        el: &Element,
        active_modes: &HashSet<Mode>,
        diagnostics: &mut Diagnostics,
    ) -> Option<Station> {
        debug_assert!(is_station(el, active_modes));

        if el.kind() != ElementKind::Node {
            diagnostics.warn("Station is not a node", Some(el));
        }

        let mut modes = mode_set(el);
        if station_tag(el) == Some(StationTag::Tram) {
            modes.insert(Mode::Tram);
        }

        let center = match el.center() {
            Some(c) => c,
            None => {
                diagnostics.error("Could not find center of station", Some(el));
                return None;
            }
        };

        let colour = match crate::colour::normalize_colour(el.tag("colour")) {
            Ok(c) => c,
            Err(e) => {
                diagnostics.warn(e.to_string(), Some(el));
                None
            }
        };

        Some(Station {
            id: el.id(),
            modes,
            name: el.tag("name").unwrap_or("?").to_string(),
            int_name: el
                .tag("int_name")
                .or_else(|| el.tag("name:en"))
                .map(str::to_string),
            colour,
            center,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Node, Tags};

    fn node(tags: &[(&str, &str)], point: Point) -> Element {
        let mut t = Tags::default();
        for (k, v) in tags {
            t.insert((*k).into(), (*v).into());
        }
        Element::Node(Node { id: 1, tags: t, point })
    }

    #[test]
    fn rejects_non_station() {
        let el = node(&[("railway", "platform")], Point::new(0.0, 0.0));
        let modes: HashSet<Mode> = [Mode::Subway].into_iter().collect();
        assert!(!is_station(&el, &modes));
    }

    #[test]
    fn accepts_subway_station_in_active_city() {
        let el = node(&[("railway", "station"), ("station", "subway")], Point::new(0.0, 0.0));
        let modes: HashSet<Mode> = [Mode::Subway].into_iter().collect();
        assert!(is_station(&el, &modes));
    }

    #[test]
    fn rejects_under_construction() {
        let el = node(
            &[("railway", "station"), ("station", "subway"), ("construction", "yes")],
            Point::new(0.0, 0.0),
        );
        let modes: HashSet<Mode> = [Mode::Subway].into_iter().collect();
        assert!(!is_station(&el, &modes));
    }

    #[test]
    fn tram_stop_requires_tram_active() {
        let el = node(&[("railway", "tram_stop")], Point::new(0.0, 0.0));
        let subway_only: HashSet<Mode> = [Mode::Subway].into_iter().collect();
        let with_tram: HashSet<Mode> = [Mode::Tram].into_iter().collect();
        assert!(!is_station(&el, &subway_only));
        assert!(is_station(&el, &with_tram));
    }

    #[test]
    fn rejects_disjoint_mode_set() {
        let el = node(&[("railway", "station"), ("station", "monorail")], Point::new(0.0, 0.0));
        let modes: HashSet<Mode> = [Mode::Subway].into_iter().collect();
        assert!(!is_station(&el, &modes));
    }
}
